//! Chat side of a download: option prompts, status message, delivery, cleanup.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use strum::IntoEnumIterator;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use teloxide::{ApiError, RequestError};

use crate::core::error::{AppError, AppResult};
use crate::delivery::{choose_delivery, DeliveryMethod};
use crate::download::{classify, ClassifiedRequest, MediaKind, QualityPreset};
use crate::telegram::commands::DownloadArgs;
use crate::telegram::handlers::HandlerDeps;
use crate::telegram::status::StatusListener;
use crate::telegram::Bot;

/// Callback data prefix for prompt buttons: `pick:<prompt id>:<value>`
pub const PROMPT_CALLBACK_PREFIX: &str = "pick:";

pub fn prompt_callback_data(prompt_id: &str, value: &str) -> String {
    format!("{}{}:{}", PROMPT_CALLBACK_PREFIX, prompt_id, value)
}

/// Splits prompt callback data into `(prompt id, value)`.
pub fn parse_prompt_callback(data: &str) -> Option<(&str, &str)> {
    data.strip_prefix(PROMPT_CALLBACK_PREFIX)?.split_once(':')
}

fn choice_keyboard<T: AsRef<str>>(prompt_id: &str, options: &[(T, &'static str)]) -> InlineKeyboardMarkup {
    let row = options
        .iter()
        .map(|(value, label)| InlineKeyboardButton::callback(*label, prompt_callback_data(prompt_id, value.as_ref())))
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}

/// Maps a failed attachment send, turning Telegram's 413 into [`AppError::UploadTooLarge`].
pub fn map_send_error(err: RequestError) -> AppError {
    match err {
        RequestError::Api(ApiError::RequestEntityTooLarge) => AppError::UploadTooLarge,
        other => AppError::Telegram(other),
    }
}

/// Text sent back to the chat for a failed request.
pub fn error_reply(err: &AppError) -> String {
    if err.is_user_facing() {
        format!("❌ {}\n{}", err.title(), err)
    } else {
        format!("❌ {}\nPlease try again later.", err.title())
    }
}

pub async fn report_error(bot: &Bot, chat_id: ChatId, err: &AppError) {
    if err.is_user_facing() {
        log::info!("Request in chat {} failed: {}", chat_id, err);
    } else {
        log::error!("Unexpected error in chat {}: {:?}", chat_id, err);
    }
    if let Err(e) = bot.send_message(chat_id, error_reply(err)).await {
        log::warn!("Failed to send error reply to chat {}: {}", chat_id, e);
    }
}

/// Shows an inline keyboard and waits for the requester to pick one option.
async fn ask_choice<T>(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    owner: Option<UserId>,
    question: &str,
    options: Vec<(T, &'static str)>,
) -> AppResult<T>
where
    T: Copy + AsRef<str> + FromStr,
{
    let session = deps.prompts.open(owner.map(|user| user.0));
    let keyboard = choice_keyboard(session.id(), &options);
    let prompt = bot.send_message(chat_id, question).reply_markup(keyboard).await?;

    let answer = session.wait(deps.prompt_timeout).await;
    let closing = match &answer {
        Ok(value) => {
            let label = options
                .iter()
                .find(|(option, _)| option.as_ref() == value.as_str())
                .map_or(value.as_str(), |(_, label)| *label);
            format!("{} {}", question, label)
        }
        Err(_) => format!("{}\nNo response, request cancelled.", question),
    };
    // Editing without a markup also removes the keyboard
    if let Err(e) = bot.edit_message_text(chat_id, prompt.id, closing).await {
        log::warn!("Failed to close prompt message in chat {}: {}", chat_id, e);
    }

    let value = answer?;
    T::from_str(&value).map_err(|_| AppError::Usage(format!("Unknown option `{}`", value)))
}

/// Runs a download request end to end and reports failures to the chat.
///
/// Meant to be spawned: prompt answers arrive as separate updates from the
/// same chat and must not queue behind this task.
pub async fn run_download(bot: Bot, deps: HandlerDeps, msg: Message, args: DownloadArgs) {
    let chat_id = msg.chat.id;
    if let Err(e) = process_download(&bot, &deps, &msg, args).await {
        report_error(&bot, chat_id, &e).await;
    }
}

async fn process_download(bot: &Bot, deps: &HandlerDeps, msg: &Message, args: DownloadArgs) -> AppResult<()> {
    let chat_id = msg.chat.id;
    let owner = msg.from.as_ref().map(|user| user.id);
    let mut request = classify(&args.url)?;

    let kind = match args.kind {
        Some(kind) => kind,
        None => {
            let options = MediaKind::iter().map(|kind| (kind, kind.label())).collect();
            ask_choice(bot, deps, chat_id, owner, "What should I send?", options).await?
        }
    };
    let preset = match args.preset {
        Some(preset) => preset,
        None => {
            let options = QualityPreset::iter().map(|preset| (preset, preset.label())).collect();
            ask_choice(bot, deps, chat_id, owner, "Which quality?", options).await?
        }
    };
    request.set_preset(preset);

    let header = format!("{}: {}", request.kind().display_name(), request.url());
    let status = bot.send_message(chat_id, format!("{}\nStarting...", header)).await?;
    request.add_listener(Arc::new(StatusListener::new(bot.clone(), chat_id, status.id, header.clone())));

    let work_dir = PathBuf::from(&deps.temp_dir).join(format!("vidrelay-{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::create_dir_all(&work_dir).await?;

    let result = download_and_deliver(bot, deps, &mut request, &work_dir, kind, chat_id, status.id, &header).await;

    if let Err(e) = tokio::fs::remove_dir_all(&work_dir).await {
        log::warn!("Failed to remove {}: {}", work_dir.display(), e);
    }
    if result.is_ok() {
        if let Err(e) = bot.delete_message(chat_id, status.id).await {
            log::debug!("Could not delete status message in chat {}: {}", chat_id, e);
        }
    }
    result
}

async fn download_and_deliver(
    bot: &Bot,
    deps: &HandlerDeps,
    request: &mut ClassifiedRequest,
    work_dir: &Path,
    kind: MediaKind,
    chat_id: ChatId,
    status_id: MessageId,
    header: &str,
) -> AppResult<()> {
    let destination = work_dir.join(format!("download.{}", kind.extension()));
    let output = deps.downloader.download(request, &destination, kind).await?;
    if !output.listener_failures.is_empty() {
        log::debug!(
            "{} progress dispatch(es) had listener failures for {}",
            output.listener_failures.len(),
            request.url()
        );
    }

    if let Err(e) = bot.edit_message_text(chat_id, status_id, format!("{}\nUploading...", header)).await {
        log::debug!("Status edit failed in chat {}: {}", chat_id, e);
    }

    match choose_delivery(output.file_size, deps.max_attachment_bytes) {
        DeliveryMethod::Attachment => send_file(bot, chat_id, &output.file_path, kind, header).await,
        DeliveryMethod::UploadLink => {
            log::info!(
                "{} is {} bytes, over the attachment limit; uploading instead",
                output.file_path.display(),
                output.file_size
            );
            let link = deps.upload_sink.upload(&output.file_path).await?;
            bot.send_message(chat_id, format!("{}\n{}", header, link)).await?;
            Ok(())
        }
    }
}

async fn send_file(bot: &Bot, chat_id: ChatId, path: &Path, kind: MediaKind, caption: &str) -> AppResult<()> {
    let file = InputFile::file(path.to_path_buf());
    let is_mp3 = path.extension().is_some_and(|ext| ext == "mp3");
    let sent = match kind {
        MediaKind::Video => bot
            .send_video(chat_id, file)
            .caption(caption)
            .supports_streaming(true)
            .await
            .map(|_| ()),
        MediaKind::Audio if is_mp3 => bot.send_audio(chat_id, file).caption(caption).await.map(|_| ()),
        // Lossless audio is sent as a plain document
        MediaKind::Audio => bot.send_document(chat_id, file).caption(caption).await.map(|_| ()),
    };
    sent.map_err(map_send_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_callback_roundtrip() {
        let data = prompt_callback_data("0f3a", "hd");
        assert_eq!(data, "pick:0f3a:hd");
        assert_eq!(parse_prompt_callback(&data), Some(("0f3a", "hd")));
        assert_eq!(parse_prompt_callback("dl:mp4:hd"), None);
        assert_eq!(parse_prompt_callback("pick:missing-value"), None);
    }

    #[test]
    fn test_keyboard_has_one_button_per_option() {
        let options: Vec<(QualityPreset, &'static str)> =
            QualityPreset::iter().map(|preset| (preset, preset.label())).collect();
        let keyboard = choice_keyboard("abc", &options);
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), 4);
        assert_eq!(keyboard.inline_keyboard[0][2].text, "HD");
    }

    #[test]
    fn test_too_large_maps_to_upload_error() {
        let err = map_send_error(RequestError::Api(ApiError::RequestEntityTooLarge));
        assert!(matches!(err, AppError::UploadTooLarge));
        let err = map_send_error(RequestError::Api(ApiError::MessageNotModified));
        assert!(matches!(err, AppError::Telegram(_)));
    }

    #[test]
    fn test_error_reply_hides_internal_details() {
        let err = AppError::NoMatchingDownloader {
            url: "https://example.com/v".to_string(),
        };
        assert_eq!(
            error_reply(&err),
            "❌ No Matching Downloader\nCould not find a downloader with this URL: `https://example.com/v`"
        );

        let err = AppError::UnregisteredPreset("hd".to_string());
        assert_eq!(error_reply(&err), "❌ Something went wrong\nPlease try again later.");
    }
}
