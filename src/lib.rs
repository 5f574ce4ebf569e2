//! CampusChat - campus assistant chat client library
//!
//! This library provides the resilient request pipeline behind the campus
//! assistant's chat panel: connectivity observation, a retrying HTTP
//! transport chain, and a chat session that keeps conversation continuity
//! across transient network failures.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `net::connectivity`: online/offline signal and latency-bucketed
//!   quality probing
//! - `net::transport`: the `Transport` trait and its middleware chain
//!   (logging, bounded retry, header injection) over reqwest
//! - `chat`: endpoint wire types, the API client, and the session state
//!   machine with optimistic history and connectivity-triggered replay
//! - `config`: configuration management and validation
//! - `error`: error types and result aliases
//! - `cli` / `commands`: command-line surface
//!
//! # Example
//!
//! ```no_run
//! use campuschat::cli::Cli;
//! use campuschat::Config;
//! use clap::Parser;
//!
//! # fn main() -> anyhow::Result<()> {
//! let cli = Cli::try_parse_from(["campuschat", "--api-key", "app-k"])?;
//! let config = Config::load("config/config.yaml", &cli)?;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod net;

// Re-export commonly used types
pub use chat::api::{ChatClient, ChatRequest, ChatResponse};
pub use chat::session::{ChatMessage, ChatSession};
pub use config::Config;
pub use error::{ApiError, CampusChatError, Result, TransportError};
pub use net::connectivity::{ConnectivityObserver, LinkState, NetworkQuality};
