//! Text command parsing.
//!
//! Commands use a configurable prefix (`MESSAGE_PREFIX`), so teloxide's
//! `BotCommands` derive, which is tied to `/`, is not used here.

use std::str::FromStr;
use strum::IntoEnumIterator;

use crate::core::error::{AppError, AppResult};
use crate::download::{DownloaderKind, MediaKind, QualityPreset};

/// Arguments of a download command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadArgs {
    pub url: String,
    /// Asked interactively when missing
    pub kind: Option<MediaKind>,
    /// Asked interactively when missing
    pub preset: Option<QualityPreset>,
}

impl DownloadArgs {
    pub fn url_only(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: None,
            preset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Start,
    Help,
    Download(DownloadArgs),
}

pub fn usage(prefix: &str) -> String {
    format!("Usage: `{}download <url> [video|audio] [low|medium|hd|original]`", prefix)
}

/// Parses `text` as a prefixed command.
///
/// Returns `None` when the text is not a command for this bot (no prefix,
/// unknown command name, or addressed to another bot via `@name`).
pub fn parse_command(text: &str, prefix: &str, bot_username: Option<&str>) -> Option<AppResult<ParsedCommand>> {
    let rest = text.trim().strip_prefix(prefix)?;
    let mut tokens = rest.split_whitespace();
    let head = tokens.next()?;

    let name = match head.split_once('@') {
        Some((name, target)) => {
            let ours = bot_username.is_some_and(|username| username.eq_ignore_ascii_case(target));
            if !ours {
                return None;
            }
            name
        }
        None => head,
    };

    match name.to_ascii_lowercase().as_str() {
        "start" => Some(Ok(ParsedCommand::Start)),
        "help" => Some(Ok(ParsedCommand::Help)),
        "download" | "dl" => Some(parse_download_args(tokens, prefix).map(ParsedCommand::Download)),
        _ => None,
    }
}

fn parse_download_args<'a>(mut tokens: impl Iterator<Item = &'a str>, prefix: &str) -> AppResult<DownloadArgs> {
    let url = tokens.next().ok_or_else(|| AppError::Usage(usage(prefix)))?;
    let mut args = DownloadArgs::url_only(url);

    for token in tokens {
        if let Ok(kind) = MediaKind::from_str(token) {
            args.kind = Some(kind);
        } else if let Ok(preset) = QualityPreset::from_str(token) {
            args.preset = Some(preset);
        } else {
            return Err(AppError::Usage(format!("Unknown option `{}`. {}", token, usage(prefix))));
        }
    }

    Ok(args)
}

/// First http(s) link in a plain message.
pub fn extract_url(text: &str) -> Option<&str> {
    text.split_whitespace()
        .find(|token| token.starts_with("https://") || token.starts_with("http://"))
}

pub fn help_text(prefix: &str) -> String {
    let sites = DownloaderKind::iter()
        .map(|kind| kind.display_name())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Send me a link and I'll fetch the video for you.\n\n\
         {}\n\
         Without a type or quality I'll ask with buttons.\n\
         In private chats a bare link works too.\n\n\
         Supported sites: {}",
        usage(prefix),
        sites
    )
}
