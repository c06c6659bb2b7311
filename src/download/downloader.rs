//! Shared download routine for every supported site.
//!
//! The blocking yt-dlp call runs on tokio's blocking pool. Progress signals
//! travel back over an unbounded channel, get throttled against the request's
//! own timestamp, and are dispatched to the request's listeners in order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::core::error::{AppError, AppResult};
use crate::download::preset::{audio_extraction, video_encoding, MediaKind};
use crate::download::progress::{DispatchError, ProgressEvent};
use crate::download::request::ClassifiedRequest;
use crate::download::ytdlp::{FfmpegStage, RawSignal, TimedSignal, YtDlpBackend, YtDlpOptions};

/// Default video format: mp4/m4a pair when available, anything mergeable otherwise
pub const DEFAULT_VIDEO_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best";
pub const DEFAULT_AUDIO_FORMAT: &str = "bestaudio/best";

/// One run of the external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub url: String,
    pub args: Vec<String>,
}

/// Blocking media extraction backend.
///
/// `run` is called on a blocking thread. It reports progress through
/// `on_signal` and returns the process exit code (0 on success).
pub trait MediaBackend: Send + Sync {
    fn run(&self, invocation: &Invocation, on_signal: &mut dyn FnMut(TimedSignal)) -> AppResult<i32>;
}

/// Result of a successful download.
#[derive(Debug)]
pub struct DownloadOutput {
    /// The produced file; its extension follows the media kind and preset
    pub file_path: PathBuf,
    pub file_size: u64,
    /// Listener failures collected while the download ran
    pub listener_failures: Vec<DispatchError>,
}

/// Builds the yt-dlp options for a request and returns them together with the
/// path of the file yt-dlp will produce.
pub fn build_options(request: &ClassifiedRequest, destination: &Path, kind: MediaKind) -> AppResult<(YtDlpOptions, PathBuf)> {
    let site = request.kind().site_options();
    let extra_args = site.extra_args.iter().map(|a| a.to_string()).collect();

    match kind {
        MediaKind::Video => {
            let encoding = video_encoding(request.preset())?;
            // Single-file formats never hit the merger, so re-encodes need a stage that always runs
            let stage = if encoding.is_stream_copy() {
                FfmpegStage::Merger
            } else {
                FfmpegStage::CopyStream
            };
            let options = YtDlpOptions {
                output_template: destination.display().to_string(),
                format: site.video_format.unwrap_or(DEFAULT_VIDEO_FORMAT).to_string(),
                merge_output_format: Some(MediaKind::Video.extension().to_string()),
                postprocessor_args: encoding.ffmpeg_args(),
                postprocessor_stage: stage,
                extract_audio: None,
                extra_args,
            };
            Ok((options, destination.to_path_buf()))
        }
        MediaKind::Audio => {
            let extraction = audio_extraction(request.preset())?;
            // The extractor decides the final extension
            let stem = if destination.extension().is_some_and(|ext| ext == MediaKind::Audio.extension()) {
                destination.with_extension("")
            } else {
                destination.to_path_buf()
            };
            let produced = PathBuf::from(format!("{}.{}", stem.display(), extraction.extension));
            let options = YtDlpOptions {
                output_template: format!("{}.%(ext)s", stem.display()),
                format: DEFAULT_AUDIO_FORMAT.to_string(),
                merge_output_format: None,
                postprocessor_args: Vec::new(),
                postprocessor_stage: FfmpegStage::Merger,
                extract_audio: Some(*extraction),
                extra_args,
            };
            Ok((options, produced))
        }
    }
}

fn processing_failed(url: &str, listener_failures: &[DispatchError]) -> AppError {
    for failure in listener_failures {
        log::warn!("Listener failure before {} failed: {}", url, failure);
    }
    AppError::ProcessingFailed { url: url.to_string() }
}

/// Runs downloads through a [`MediaBackend`].
#[derive(Clone)]
pub struct Downloader {
    backend: Arc<dyn MediaBackend>,
}

impl Downloader {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self { backend }
    }

    /// Downloader backed by the configured yt-dlp binary.
    pub fn ytdlp() -> Self {
        Self::new(Arc::new(YtDlpBackend::from_config()))
    }

    /// Downloads `request` to `destination` as `kind`.
    ///
    /// Progress is dispatched to the request's listeners while the backend runs.
    /// Listener failures do not stop the download; they are returned in
    /// [`DownloadOutput::listener_failures`].
    pub async fn download(
        &self,
        request: &mut ClassifiedRequest,
        destination: &Path,
        kind: MediaKind,
    ) -> AppResult<DownloadOutput> {
        let (options, produced) = build_options(request, destination, kind)?;
        let invocation = Invocation {
            url: request.url().to_string(),
            args: options.to_args(request.url()),
        };
        log::info!(
            "Downloading {} ({}, {}, preset {})",
            request.url(),
            request.kind().display_name(),
            kind,
            request.preset()
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<TimedSignal>();
        let backend = Arc::clone(&self.backend);
        let worker = tokio::task::spawn_blocking(move || {
            backend.run(&invocation, &mut |signal| {
                // Receiver only goes away if the awaiting flow was dropped
                let _ = tx.send(signal);
            })
        });

        let mut listener_failures = Vec::new();
        while let Some(timed) = rx.recv().await {
            let event = match timed.signal {
                RawSignal::Downloading { .. } => {
                    if !request.throttle_mut().should_forward(timed.at) {
                        continue;
                    }
                    timed.signal.into_event()
                }
                RawSignal::Finished { .. } => {
                    request.throttle_mut().mark_forwarded(timed.at);
                    ProgressEvent::processing()
                }
            };
            if let Err(e) = request.dispatch_progress(&event).await {
                log::warn!("Progress dispatch for {} had failures: {}", request.url(), e);
                listener_failures.push(e);
            }
        }

        let exit_code = match worker.await {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                log::error!("Backend failed for {}: {}", request.url(), e);
                return Err(processing_failed(request.url(), &listener_failures));
            }
            Err(e) => {
                log::error!("Download worker for {} died: {}", request.url(), e);
                return Err(processing_failed(request.url(), &listener_failures));
            }
        };

        if exit_code != 0 {
            log::error!("yt-dlp exited with {} for {}", exit_code, request.url());
            return Err(processing_failed(request.url(), &listener_failures));
        }

        let file_size = match tokio::fs::metadata(&produced).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                log::error!("Expected output {} is missing: {}", produced.display(), e);
                return Err(processing_failed(request.url(), &listener_failures));
            }
        };

        log::info!("Downloaded {} -> {} ({} bytes)", request.url(), produced.display(), file_size);
        Ok(DownloadOutput {
            file_path: produced,
            file_size,
            listener_failures,
        })
    }
}
