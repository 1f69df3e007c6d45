//! Chat service integration for roster-bot.
//!
//! This module provides the transport the registration workflow talks to:
//! - Receiving messages, commands, and control presses
//! - Sending, editing, and deleting messages with an attached control grid
//! - Reading a message back, which is how roster state is loaded
//!
//! It defines the `GenericChatClient` trait that can be implemented for different
//! chat services, with a default implementation for Slack.

pub mod slack;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::{
    base::{
        grid::ControlGrid,
        types::{Res, Void},
    },
    interaction::registration::RegistrationWorkflow,
};

// Types.

/// Addresses one message: the chat it lives in and its id within that chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: String,
    pub message_id: String,
}

impl MessageRef {
    pub fn new(chat_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            message_id: message_id.into(),
        }
    }
}

/// A message as it currently exists at the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub reference: MessageRef,
    pub text: String,
    /// Controls rendered below the text.  Empty means no controls.
    pub grid: ControlGrid,
}

/// A message to be posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: String,
    /// Id of the message this one replies to, if any.
    pub reply_to: Option<String>,
    pub text: String,
    pub grid: ControlGrid,
}

impl OutgoingMessage {
    /// A top-level message.
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            reply_to: None,
            text: text.into(),
            grid: ControlGrid::default(),
        }
    }

    /// A reply threaded under `parent`.
    pub fn reply(parent: &MessageRef, text: impl Into<String>) -> Self {
        Self {
            reply_to: Some(parent.message_id.clone()),
            ..Self::new(parent.chat_id.clone(), text)
        }
    }

    pub fn with_grid(mut self, grid: ControlGrid) -> Self {
        self.grid = grid;
        self
    }
}

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// The chat transport is the only durable store the workflow has: a roster is
/// whatever its message currently says.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Get the bot user ID.
    ///
    /// Used to ignore the bot's own messages.
    fn bot_user_id(&self) -> &str;

    /// Start the chat client listener.
    ///
    /// Incoming messages, commands, and control presses are handed to the workflow.
    async fn start(&self, workflow: RegistrationWorkflow) -> Void;

    /// Post a message, optionally as a threaded reply, and return its reference.
    async fn send_message(&self, message: &OutgoingMessage) -> Res<MessageRef>;

    /// Replace the text and controls of an existing message.
    async fn edit_message(&self, message: &ChatMessage) -> Void;

    /// Delete a message.
    async fn delete_message(&self, reference: &MessageRef) -> Void;

    /// Read a message back, or `None` if it no longer exists.
    async fn get_message(&self, reference: &MessageRef) -> Res<Option<ChatMessage>>;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
