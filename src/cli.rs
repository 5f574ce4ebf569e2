//! Command-line interface definition for CampusChat
//!
//! Defines the clap-based CLI surface. Endpoint credentials can be supplied
//! through flags, environment variables, or the configuration file; flags
//! win over the file.

use clap::{Parser, Subcommand};

/// Campus assistant chat client
#[derive(Parser, Debug)]
#[command(name = "campuschat", version, about = "Campus assistant chat client")]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// API key for the conversational endpoint
    #[arg(long, env = "CAMPUSCHAT_API_KEY", global = true)]
    pub api_key: Option<String>,

    /// Base URL of the conversational endpoint
    #[arg(long, env = "CAMPUSCHAT_API_URL", global = true)]
    pub api_url: Option<String>,

    /// User identifier sent with every chat turn
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Subcommand to run; defaults to interactive chat
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session
    Chat,

    /// Send a canned probe message and report the result
    Test,

    /// Probe the network and report its quality bucket
    Quality,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
