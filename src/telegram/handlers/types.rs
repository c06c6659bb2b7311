//! Handler types and dependencies

use std::time::Duration;

use teloxide::types::UserId;

use crate::core::config;
use crate::core::error::AppResult;
use crate::delivery::UploadSink;
use crate::download::Downloader;
use crate::prompt::PromptRegistry;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub downloader: Downloader,
    pub upload_sink: UploadSink,
    /// Open inline-keyboard prompts, answered by callback queries
    pub prompts: PromptRegistry<String>,
    pub prefix: String,
    pub bot_username: Option<String>,
    pub bot_id: UserId,
    pub prompt_timeout: Duration,
    pub max_attachment_bytes: u64,
    /// Parent directory for per-download working directories
    pub temp_dir: String,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(downloader: Downloader, upload_sink: UploadSink, bot_username: Option<String>, bot_id: UserId) -> Self {
        Self {
            downloader,
            upload_sink,
            prompts: PromptRegistry::new(),
            prefix: config::MESSAGE_PREFIX.clone(),
            bot_username,
            bot_id,
            prompt_timeout: config::prompt::timeout(),
            max_attachment_bytes: config::delivery::max_attachment_bytes(),
            temp_dir: config::TEMP_FILES_DIR.clone(),
        }
    }

    /// Dependencies backed by the configured yt-dlp binary and upload endpoint.
    pub fn from_config(bot_username: Option<String>, bot_id: UserId) -> AppResult<Self> {
        Ok(Self::new(Downloader::ytdlp(), UploadSink::from_config()?, bot_username, bot_id))
    }
}
