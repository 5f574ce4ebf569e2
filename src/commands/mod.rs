/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes two top-level command modules:

- `chat` — Interactive chat loop
- `diag` — One-shot diagnostics (connection test, quality probe)

These handlers are intentionally small and wire together the library
components: the transport chain, the connectivity observer, and the chat
session.
*/

use std::sync::Arc;

use crate::chat::api::ChatClient;
use crate::chat::session::ChatSession;
use crate::config::Config;
use crate::error::Result;
use crate::net::connectivity::{ConnectivityObserver, ConnectivitySource, ProbeConnectivity};
use crate::net::transport::build_transport;

/// Assemble the full pipeline behind a session: probe-backed connectivity,
/// the composed transport chain, and the chat client.
fn build_session(config: &Config) -> Result<Arc<ChatSession>> {
    let source: Arc<dyn ConnectivitySource> = ProbeConnectivity::start(
        config.network.probe_addr.clone(),
        config.network.probe_timeout(),
        config.network.poll_interval(),
    );
    let observer = Arc::new(ConnectivityObserver::new(source));
    let transport = build_transport(&config.api, &config.network)?;
    let client = ChatClient::new(transport, &config.api)?;
    Ok(ChatSession::new(
        client,
        observer,
        config.session.clone(),
        config.network.clone(),
    ))
}

// Interactive chat handler
pub mod chat {
    //! Interactive chat loop.
    //!
    //! Runs a readline loop that submits user input to the session. A
    //! background task renders assistant messages as history snapshots
    //! change, so replies arriving from a connectivity replay show up
    //! without waiting for the next prompt.

    use super::*;
    use colored::Colorize;
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Errors
    ///
    /// Returns an error if the session pipeline or the readline editor
    /// cannot be constructed. Chat failures themselves never surface here;
    /// they land in the message history.
    pub async fn run_chat(config: Config) -> Result<()> {
        let session = build_session(&config)?;
        let mut rl = DefaultEditor::new()?;

        let printer = tokio::spawn({
            let mut messages = session.messages();
            async move {
                let mut printed = 0;
                loop {
                    {
                        let snapshot = messages.borrow_and_update().clone();
                        for message in snapshot[printed..].iter() {
                            if !message.is_from_user {
                                println!("{} {}", "assistant>".green().bold(), message.content);
                            }
                        }
                        printed = snapshot.len();
                    }
                    if messages.changed().await.is_err() {
                        return;
                    }
                }
            }
        });

        println!("Type a message, or /help for commands.\n");

        loop {
            match rl.readline(&format!("{} ", "you>".cyan().bold())) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;

                    match trimmed {
                        "/quit" | "/exit" => break,
                        "/help" => print_help(),
                        "/test" => {
                            if !session.test_connection().await {
                                println!("A request is already in flight, try again shortly.");
                            }
                        }
                        "/quality" => {
                            let quality = session.refresh_quality().await;
                            println!("network quality: {}", quality);
                        }
                        _ => {
                            if !session.send_message(trimmed).await {
                                println!("A request is already in flight, wait for the current reply.");
                            }
                        }
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(error) => {
                    tracing::error!(%error, "readline failed");
                    break;
                }
            }
        }

        session.shutdown();
        printer.abort();
        Ok(())
    }

    fn print_help() {
        println!("Commands:");
        println!("  /test     send a canned probe message through the pipeline");
        println!("  /quality  probe the network and print its quality bucket");
        println!("  /quit     leave the chat");
    }
}

// One-shot diagnostics handlers
pub mod diag {
    //! One-shot diagnostics: connection test and network quality probe.

    use super::*;
    use crate::net::connectivity::probe_quality;

    /// Send the canned probe message and print the outcome
    pub async fn run_test(config: Config) -> Result<()> {
        let session = build_session(&config)?;
        session.test_connection().await;
        // Skip the greeting; print what the probe appended.
        for message in session
            .snapshot()
            .iter()
            .skip(1)
            .filter(|m| !m.is_from_user)
        {
            println!("{}", message.content);
        }
        session.shutdown();
        Ok(())
    }

    /// Probe the network directly and print the quality bucket
    pub async fn run_quality(config: Config) -> Result<()> {
        let quality = probe_quality(
            &config.network.probe_addr,
            config.network.probe_timeout(),
        )
        .await;
        println!("network quality: {}", quality);
        Ok(())
    }
}
