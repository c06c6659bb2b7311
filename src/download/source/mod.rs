//! Download source classification.
//!
//! A URL is routed to a downloader kind by an ordered pattern table. Patterns
//! are tried in registration order and the first match wins, so more specific
//! sites must be registered before broader ones.
//!
//! Supported sites: YouTube (videos and shorts), TikTok, Twitch clips,
//! Twitter/X statuses, BiliBili videos.

use once_cell::sync::Lazy;
use regex::Regex;
use strum::{AsRefStr, EnumIter};

use crate::core::error::{AppError, AppResult};
use crate::download::request::ClassifiedRequest;

/// Site family a URL belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, EnumIter)]
pub enum DownloaderKind {
    YouTube,
    TikTok,
    TwitchClips,
    Twitter,
    BiliBili,
}

/// Per-site tweaks applied on top of the shared yt-dlp invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteOptions {
    /// Replaces the default video format selector
    pub video_format: Option<&'static str>,
    /// Extra yt-dlp arguments
    pub extra_args: &'static [&'static str],
}

impl DownloaderKind {
    /// Human-readable name shown in the status message.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::YouTube => "YouTube",
            Self::TikTok => "TikTok",
            Self::TwitchClips => "Twitch Clips",
            Self::Twitter => "Twitter",
            Self::BiliBili => "BiliBili",
        }
    }

    pub fn site_options(&self) -> SiteOptions {
        match self {
            Self::YouTube => SiteOptions {
                video_format: None,
                extra_args: &[],
            },
            // TikTok serves single progressive files; merging is pointless
            Self::TikTok => SiteOptions {
                video_format: Some("best[ext=mp4]/best"),
                extra_args: &[],
            },
            Self::TwitchClips => SiteOptions {
                video_format: Some("best[ext=mp4]/best"),
                extra_args: &[],
            },
            Self::Twitter => SiteOptions {
                video_format: None,
                extra_args: &[],
            },
            // BiliBili rejects requests without a matching referer
            Self::BiliBili => SiteOptions {
                video_format: None,
                extra_args: &["--referer", "https://www.bilibili.com/"],
            },
        }
    }
}

/// A compiled pattern bound to the downloader that handles it.
#[derive(Debug)]
pub struct SourcePattern {
    pub regex: Regex,
    pub kind: DownloaderKind,
}

impl SourcePattern {
    // Patterns are compile-time literals; a bad one is a programming error
    #[allow(clippy::expect_used)]
    fn new(pattern: &str, kind: DownloaderKind) -> Self {
        Self {
            regex: Regex::new(pattern).expect("source pattern must compile"),
            kind,
        }
    }
}

/// Process-wide pattern table, in priority order.
pub static PATTERN_REGISTRY: Lazy<Vec<SourcePattern>> = Lazy::new(|| {
    vec![
        SourcePattern::new(
            r"(?:https?://)?(?:www\.)?(?:youtube\.com/(?:watch\?v=|shorts/)|youtu\.be/)([A-Za-z0-9_-]{11})",
            DownloaderKind::YouTube,
        ),
        SourcePattern::new(r"https?://((?:vm|vt|www)\.)?tiktok\.com/.*", DownloaderKind::TikTok),
        SourcePattern::new(
            r"https?://(?:www\.)?twitch\.tv/(?:[a-zA-Z0-9_]+/)?clip/([a-zA-Z0-9_-]+)",
            DownloaderKind::TwitchClips,
        ),
        SourcePattern::new(
            r"https?://(x\.com|twitter\.com)/(i/)?[^/]+/status/\d+",
            DownloaderKind::Twitter,
        ),
        SourcePattern::new(
            r"https?://(?:www\.)?bilibili\.com/video/(av\d+|BV[a-zA-Z0-9]+)/?",
            DownloaderKind::BiliBili,
        ),
    ]
});

/// Finds the downloader for `url` by scanning `registry` in order.
pub fn classify_with(registry: &[SourcePattern], url: &str) -> AppResult<ClassifiedRequest> {
    for pattern in registry {
        if let Some(captures) = pattern.regex.captures(url) {
            let groups = captures
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect();
            log::debug!("Classified {} as {}", url, pattern.kind.display_name());
            return Ok(ClassifiedRequest::new(url, groups, pattern.kind));
        }
    }

    Err(AppError::NoMatchingDownloader { url: url.to_string() })
}

/// Finds the downloader for `url` in the built-in registry.
///
/// # Example
///
/// ```
/// use vidrelay::download::source::{classify, DownloaderKind};
///
/// let request = classify("https://youtu.be/AbCdEfGhIjK").unwrap();
/// assert_eq!(request.kind(), DownloaderKind::YouTube);
/// assert!(classify("https://example.com/watch").is_err());
/// ```
pub fn classify(url: &str) -> AppResult<ClassifiedRequest> {
    classify_with(&PATTERN_REGISTRY, url)
}
