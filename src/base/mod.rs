//! Core components, types, and utilities for the roster-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - User-facing message text and control labels.
//! - Common types, result handling, and workflow errors.
//! - The pure event, roster, grid, and submission models.

pub mod config;
pub mod event;
pub mod grid;
pub mod messages;
pub mod roster;
pub mod submission;
pub mod types;
