//! Live status message for an in-flight download.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use teloxide::prelude::*;
use teloxide::types::MessageId;
use teloxide::{ApiError, RequestError};

use crate::core::config;
use crate::core::error::AppError;
use crate::core::utils::{format_size, format_speed};
use crate::download::{ProgressEvent, ProgressListener, ProgressPhase};
use crate::telegram::Bot;

const LOADING_FRAMES: [&str; 4] = ["", ".", "..", "..."];

/// Renders one status frame.
///
/// `header` is the first line (site and link); `frame` selects the loading dots.
pub fn render_status(header: &str, event: &ProgressEvent, frame: usize) -> String {
    let dots = LOADING_FRAMES[frame % LOADING_FRAMES.len()];
    match event.phase {
        ProgressPhase::Downloading => format!(
            "{}\nDownloading{}\n[{} / {}] ({:.2}%) {} ETA {}",
            header,
            dots,
            format_size(event.current),
            format_size(event.total),
            event.fraction * 100.0,
            format_speed(event.speed),
            event.eta.as_deref().unwrap_or("N/A"),
        ),
        ProgressPhase::Processing => format!("{}\nProcessing{}", header, dots),
    }
}

/// Edits a chat message as progress events arrive.
///
/// Edits are rate limited to one per [`config::progress::status_edit_interval`];
/// phase changes always go through.
pub struct StatusListener {
    bot: Bot,
    chat_id: ChatId,
    message_id: MessageId,
    header: String,
    min_interval: Duration,
    last_edit: Mutex<Option<(Instant, ProgressPhase)>>,
    frame: AtomicUsize,
}

impl StatusListener {
    pub fn new(bot: Bot, chat_id: ChatId, message_id: MessageId, header: impl Into<String>) -> Self {
        Self {
            bot,
            chat_id,
            message_id,
            header: header.into(),
            min_interval: config::progress::status_edit_interval(),
            last_edit: Mutex::new(None),
            frame: AtomicUsize::new(0),
        }
    }

    fn claim_edit(&self, phase: ProgressPhase) -> bool {
        let now = Instant::now();
        let mut last = self.last_edit.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let due = match *last {
            None => true,
            Some((at, last_phase)) => last_phase != phase || now.duration_since(at) >= self.min_interval,
        };
        if due {
            *last = Some((now, phase));
        }
        due
    }
}

#[async_trait]
impl ProgressListener for StatusListener {
    async fn on_progress(&self, event: &ProgressEvent) -> Result<(), AppError> {
        if !self.claim_edit(event.phase) {
            return Ok(());
        }
        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        let text = render_status(&self.header, event, frame);

        match self.bot.edit_message_text(self.chat_id, self.message_id, text).await {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(AppError::Listener(format!("status edit failed: {}", e))),
        }
    }
}
