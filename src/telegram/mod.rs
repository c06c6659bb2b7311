//! Telegram bot integration and handlers

pub mod bot;
pub mod commands;
pub mod downloads;
pub mod handlers;
pub mod status;

/// Bot type used across handlers
pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands};
pub use handlers::{schema, HandlerDeps, HandlerError};
