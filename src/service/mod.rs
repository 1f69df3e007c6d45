//! Service integrations for external APIs and clients.
//!
//! This module contains the boundaries of roster-bot:
//! - Chat services (e.g., Slack)
//! - The registration web server
//!
//! The chat service defines both a generic trait and a concrete implementation,
//! allowing for extensibility and easy testing.

pub mod chat;
pub mod web;
