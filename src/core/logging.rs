//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A yt-dlp availability check logged at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::process::{Command, Stdio};

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to create the file or a logger is already set
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Returns the `--version` output of the yt-dlp binary, if it can be run.
pub fn ytdlp_version(bin: &str) -> Option<String> {
    let output = Command::new(bin)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!version.is_empty()).then_some(version)
}

/// Logs the external tool configuration at application startup
pub fn log_ytdlp_configuration() {
    let bin = config::YTDL_BIN.as_str();
    match ytdlp_version(bin) {
        Some(version) => log::info!("yt-dlp {} found at `{}`", version, bin),
        None => {
            log::error!("yt-dlp binary `{}` could not be run", bin);
            log::error!("Downloads will FAIL until YTDL_BIN points to a working yt-dlp");
        }
    }
    log::info!("Command prefix: `{}`", config::MESSAGE_PREFIX.as_str());
    log::info!("Upload endpoint: {}", config::UPLOAD_URL.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ytdlp_version_missing_binary() {
        assert!(ytdlp_version("/definitely/not/a/real/yt-dlp").is_none());
    }
}
