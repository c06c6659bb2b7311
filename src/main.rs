use anyhow::Result;
use dotenvy::dotenv;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use teloxide::prelude::*;
use tokio::time::sleep;

use vidrelay::cli::{Cli, Commands};
use vidrelay::core::startup::StartupFile;
use vidrelay::core::utils::{format_size, format_speed};
use vidrelay::core::{config, init_logger, log_ytdlp_configuration, AppError};
use vidrelay::download::preset::{audio_extraction, video_encoding};
use vidrelay::download::{classify, Downloader, FnListener, MediaKind, ProgressEvent, ProgressPhase, QualityPreset};
use vidrelay::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the matching subcommand.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics from spawned tasks instead of losing them on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) => run_bot().await,
        Some(Commands::Classify { url }) => run_classify(&url),
        Some(Commands::Download {
            url,
            kind,
            quality,
            output,
        }) => run_cli_download(url, kind, quality, output).await,
        Some(Commands::Presets) => run_presets(),
        None => {
            log::info!("No command specified, running bot");
            run_bot().await
        }
    }
}

fn run_classify(url: &str) -> Result<()> {
    let request = classify(url)?;
    println!("{} -> {}", request.url(), request.kind().display_name());
    for (i, group) in request.captures().iter().enumerate() {
        println!("  group {}: {}", i + 1, group.as_deref().unwrap_or("-"));
    }
    Ok(())
}

fn run_presets() -> Result<()> {
    for preset in QualityPreset::iter() {
        let video = video_encoding(preset)?;
        let audio = audio_extraction(preset)?;
        println!("{} ({})", preset, preset.label());
        println!("  video: ffmpeg {}", video.ffmpeg_args().join(" "));
        println!(
            "  audio: {} @ {}{}",
            audio.codec,
            audio.quality,
            if audio.lossless { " (lossless)" } else { "" }
        );
    }
    Ok(())
}

async fn run_cli_download(url: String, kind: MediaKind, quality: QualityPreset, output: Option<String>) -> Result<()> {
    let mut request = classify(&url)?.with_preset(quality);
    println!("{} via {} ({}, {})", url, request.kind().display_name(), kind, quality);

    request.add_listener(Arc::new(FnListener(|event: ProgressEvent| async move {
        match event.phase {
            ProgressPhase::Downloading => eprint!(
                "\r{:>6.2}% of {} at {} ETA {}    ",
                event.fraction * 100.0,
                format_size(event.total),
                format_speed(event.speed),
                event.eta.as_deref().unwrap_or("N/A"),
            ),
            ProgressPhase::Processing => eprint!("\rprocessing...{:30}", ""),
        }
        std::io::stderr().flush()?;
        Ok::<(), AppError>(())
    })));

    let output_dir = PathBuf::from(output.unwrap_or_else(|| ".".to_string()));
    tokio::fs::create_dir_all(&output_dir).await?;
    let name = request
        .captures()
        .last()
        .and_then(|group| group.clone())
        .filter(|group| group.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or_else(|| "download".to_string());
    let destination = output_dir.join(format!("{}.{}", name, kind.extension()));

    let result = Downloader::ytdlp().download(&mut request, &destination, kind).await;
    eprintln!();
    let output = result?;

    println!("Saved {} ({})", output.file_path.display(), format_size(output.file_size as f64));
    Ok(())
}

/// Run the bot with long polling
async fn run_bot() -> Result<()> {
    let bot_init_start = std::time::Instant::now();
    log::info!("Starting vidrelay {}...", config::VERSION);

    log_ytdlp_configuration();

    let bot = create_bot()?;

    // Retry while the Bot API is unreachable
    let bot_info = {
        let startup_max_retries = 12;
        let mut startup_retry = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    startup_retry += 1;
                    if startup_retry >= startup_max_retries {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} retries: {}",
                            startup_retry,
                            e
                        ));
                    }
                    log::warn!(
                        "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                        startup_retry,
                        startup_max_retries,
                        e
                    );
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    };
    let bot_username = bot_info.username.clone();
    let bot_id = bot_info.id;
    log::info!("Bot username: {:?}, Bot ID: {}", bot_username, bot_id);

    // Register the command menu only when the version changed
    let startup = StartupFile::new(config::STARTUP_PATH.as_str(), config::VERSION);
    match startup.needs_sync() {
        Ok(true) => {
            log::info!("New version {}, syncing bot commands", config::VERSION);
            setup_bot_commands(&bot).await?;
            if let Err(e) = startup.write_current() {
                log::warn!("Failed to update {}: {}", startup.path().display(), e);
            }
        }
        Ok(false) => log::info!("Bot commands already synced for {}", config::VERSION),
        Err(e) => log::warn!("Could not read {}: {}", startup.path().display(), e),
    }

    let handler_deps = HandlerDeps::from_config(bot_username, bot_id)?;
    let handler = schema(handler_deps);

    log::info!("Bot initialization complete in {:.2}s", bot_init_start.elapsed().as_secs_f64());
    log::info!("Ready to receive updates!");

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Dispatcher shutdown gracefully");
    Ok(())
}
