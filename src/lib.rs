//! Library root for `roster-bot`.
//!
//! Roster-bot runs event registration out of a group chat:
//! - An organizer posts an event template and gets back a shareable link
//! - Attendees register through the link's web form
//! - Each registration is appended to a roster message in the chat
//! - The organizer marks attendance with toggles and finally locks the roster
//!
//! The roster message itself is the only state.  The bot integrates with Slack
//! for chat and serves the registration form over HTTP.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the roster-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with the chat client and workflow
/// - Runs the chat listener alongside the registration web server
pub async fn start(config: Config) -> Void {
    info!("Starting roster-bot ...");

    // Start the crypto provider.
    crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("A crypto provider is already installed."))?;

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
