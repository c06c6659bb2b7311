use thiserror::Error;

/// Centralized error type for the bot.
///
/// Variants above the wrapped library errors are the ones users see: they carry
/// a readable message and are rendered as-is in the chat. Everything else is
/// treated as an internal failure and escalated to the log.
///
/// # Example
///
/// ```
/// use vidrelay::core::error::AppError;
///
/// let err = AppError::NoMatchingDownloader {
///     url: "https://example.com/watch".to_string(),
/// };
/// assert!(err.is_user_facing());
/// assert_eq!(err.title(), "No Matching Downloader");
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// No pattern in the registry matched the URL
    #[error("Could not find a downloader with this URL: `{url}`")]
    NoMatchingDownloader { url: String },

    /// yt-dlp exited with a failure or could not be run
    #[error("Couldn't download {url}.")]
    ProcessingFailed { url: String },

    /// The user did not pick an option before the prompt deadline
    #[error("You did not respond in time.")]
    PromptTimedOut,

    /// The delivery sink refused the file because of its size
    #[error("File is too large to be uploaded.")]
    UploadTooLarge,

    /// The delivery sink failed for any other reason
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// Invalid user input (unknown media kind, malformed command, ...)
    #[error("{0}")]
    Usage(String),

    /// A quality preset has no entry in the encoder table.
    ///
    /// Means the preset enum and the table went out of sync; never user input.
    #[error("No parameter set registered for preset `{0}`")]
    UnregisteredPreset(String),

    /// A progress listener failed while handling an event
    #[error("Progress listener error: {0}")]
    Listener(String),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// HTTP errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Whether the message can be shown to the user verbatim.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AppError::NoMatchingDownloader { .. }
                | AppError::ProcessingFailed { .. }
                | AppError::PromptTimedOut
                | AppError::UploadTooLarge
                | AppError::UploadFailed(_)
                | AppError::Usage(_)
        )
    }

    /// Short title used as the heading of an error reply.
    pub fn title(&self) -> &'static str {
        match self {
            AppError::NoMatchingDownloader { .. } => "No Matching Downloader",
            AppError::ProcessingFailed { .. } => "Error Processing",
            AppError::PromptTimedOut => "Prompt Timed Out",
            AppError::UploadTooLarge | AppError::UploadFailed(_) => "Upload Error",
            AppError::Usage(_) => "User Error Usage",
            _ => "Something went wrong",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_matching_downloader_keeps_url() {
        let err = AppError::NoMatchingDownloader {
            url: "https://example.com/watch".into(),
        };
        assert!(err.to_string().contains("https://example.com/watch"));
    }

    #[test]
    fn test_internal_errors_are_not_user_facing() {
        assert!(!AppError::UnregisteredPreset("hd".into()).is_user_facing());
        assert!(!AppError::Listener("boom".into()).is_user_facing());
        let io = AppError::from(std::io::Error::other("disk"));
        assert!(!io.is_user_facing());
        assert_eq!(io.title(), "Something went wrong");
    }

    #[test]
    fn test_user_facing_titles() {
        assert_eq!(AppError::PromptTimedOut.title(), "Prompt Timed Out");
        assert_eq!(AppError::UploadTooLarge.title(), "Upload Error");
        assert_eq!(
            AppError::ProcessingFailed { url: "u".into() }.title(),
            "Error Processing"
        );
    }
}
