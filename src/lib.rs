//! vidrelay - chat bot that downloads videos from popular sites
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, startup bookkeeping
//! - `download`: URL classification, quality presets, progress and the yt-dlp runner
//! - `prompt`: short-lived option prompts with a deadline
//! - `delivery`: attachment vs. upload-link delivery
//! - `telegram`: Telegram bot integration and handlers
//! - `cli`: command line interface

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod core;
pub mod delivery;
pub mod download;
pub mod prompt;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use download::{classify, ClassifiedRequest, Downloader, MediaKind, QualityPreset};
