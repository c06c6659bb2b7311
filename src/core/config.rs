use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot version, written to the startup file to detect upgrades
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_default()
});

/// Prefix that marks a message as a bot command
/// Read from MESSAGE_PREFIX environment variable
/// Default: "/"
pub static MESSAGE_PREFIX: Lazy<String> = Lazy::new(|| {
    env::var("MESSAGE_PREFIX")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| "/".to_string())
});

/// Upload endpoint used for files above the attachment limit
/// Read from UPLOAD_URL environment variable
pub static UPLOAD_URL: Lazy<String> =
    Lazy::new(|| env::var("UPLOAD_URL").unwrap_or_else(|_| "https://tmpfiles.org/api/v1/upload".to_string()));

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Directory where per-request working directories are created
/// Read from TEMP_FILES_DIR environment variable, supports tilde (~) expansion
/// Defaults to the system temp directory
pub static TEMP_FILES_DIR: Lazy<String> = Lazy::new(|| match env::var("TEMP_FILES_DIR") {
    Ok(dir) => shellexpand::tilde(&dir).to_string(),
    Err(_) => env::temp_dir().display().to_string(),
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: vidrelay.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "vidrelay.log".to_string()));

/// File that remembers which version last registered the command list
/// Read from STARTUP_PATH environment variable
/// Default: .startup.json
pub static STARTUP_PATH: Lazy<String> =
    Lazy::new(|| env::var("STARTUP_PATH").unwrap_or_else(|_| ".startup.json".to_string()));

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

/// Progress reporting configuration
pub mod progress {
    use super::Duration;

    /// Minimum gap between forwarded download progress events (milliseconds)
    pub const THROTTLE_MS: u64 = 500;

    /// Minimum gap between edits of the chat status message (milliseconds)
    pub const STATUS_EDIT_INTERVAL_MS: u64 = 1000;

    pub fn throttle_interval() -> Duration {
        Duration::from_millis(THROTTLE_MS)
    }

    pub fn status_edit_interval() -> Duration {
        Duration::from_millis(STATUS_EDIT_INTERVAL_MS)
    }
}

/// Interactive prompt configuration
pub mod prompt {
    use super::{env_u64, Duration, Lazy};

    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    /// Read from PROMPT_TIMEOUT_SECS environment variable
    pub static TIMEOUT_SECS: Lazy<u64> = Lazy::new(|| env_u64("PROMPT_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));

    pub fn timeout() -> Duration {
        Duration::from_secs(*TIMEOUT_SECS)
    }
}

/// File delivery configuration
pub mod delivery {
    use super::{env_u64, Lazy};

    /// Telegram Bot API refuses documents above 50 MB
    pub const DEFAULT_MAX_ATTACHMENT_MB: u64 = 50;

    /// Read from MAX_ATTACHMENT_MB environment variable
    pub static MAX_ATTACHMENT_MB: Lazy<u64> =
        Lazy::new(|| env_u64("MAX_ATTACHMENT_MB", DEFAULT_MAX_ATTACHMENT_MB));

    pub fn max_attachment_bytes() -> u64 {
        *MAX_ATTACHMENT_MB * 1024 * 1024
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for HTTP requests (in seconds)
    /// Large enough for multi-megabyte uploads
    pub const REQUEST_TIMEOUT_SECS: u64 = 900;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
