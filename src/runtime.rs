//! Runtime services and shared state for the roster-bot.

use tracing::instrument;

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::registration::RegistrationWorkflow,
    service::{chat::ChatClient, web},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the chat client, the workflow built on it, and the
/// configuration.  It is designed to be trivially cloneable, allowing it to be
/// passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The chat client instance.
    pub chat: ChatClient,
    /// The registration workflow shared by the chat listener and the web server.
    pub workflow: RegistrationWorkflow,
}

impl Runtime {
    /// Create a new runtime instance backed by Slack.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the slack client.
        let chat = ChatClient::slack(&config).await?;

        Ok(Self::with_chat(config, chat))
    }

    /// Create a runtime around an existing chat client.
    pub fn with_chat(config: Config, chat: ChatClient) -> Self {
        let workflow = RegistrationWorkflow::new(config.clone(), chat.clone());

        Self { config, chat, workflow }
    }

    /// Runs the chat listener and the registration web server until either stops.
    pub async fn start(&self) -> Void {
        tokio::try_join!(self.chat.start(self.workflow.clone()), web::serve(self.workflow.clone()))?;

        Ok(())
    }
}
