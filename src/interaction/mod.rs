//! Event handling and user interactions for roster-bot.
//!
//! This module provides functionality for handling chat and web events:
//! - Routing incoming messages, commands, and control presses
//! - Creating events, recording registrations, and tracking attendance
//! - Walking organizers through event drafts one field at a time

pub mod chat_event;
pub mod dialog;
pub mod registration;
