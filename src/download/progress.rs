//! Progress events, throttling, and listener fan-out.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::error::AppError;

/// Stage of a download as reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
    /// Bytes are being fetched from the site
    Downloading,
    /// Download finished, ffmpeg is merging/transcoding
    Processing,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Downloading => "downloading",
            Self::Processing => "processing",
        }
    }
}

/// Point-in-time snapshot of an in-flight download.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub filename: Option<String>,
    /// Completed fraction in `[0, 1]`
    pub fraction: f64,
    /// Total size in bytes (estimate)
    pub total: f64,
    /// Bytes downloaded so far
    pub current: f64,
    /// Bytes per second
    pub speed: Option<f64>,
    pub eta: Option<String>,
}

impl ProgressEvent {
    /// Builds a downloading event, deriving the fraction from the byte counts.
    pub fn downloading(
        filename: Option<String>,
        downloaded: f64,
        total_estimate: Option<f64>,
        speed: Option<f64>,
        eta: Option<String>,
    ) -> Self {
        Self {
            phase: ProgressPhase::Downloading,
            filename,
            fraction: fraction_complete(downloaded, total_estimate),
            total: total_estimate.unwrap_or(downloaded),
            current: downloaded,
            speed,
            eta,
        }
    }

    /// Synthetic event sent once the download is done and post-processing starts.
    pub fn processing() -> Self {
        Self {
            phase: ProgressPhase::Processing,
            filename: None,
            fraction: 1.0,
            total: 1.0,
            current: 1.0,
            speed: None,
            eta: None,
        }
    }
}

/// `downloaded / (total or downloaded)`, clamped to `[0, 1]`.
///
/// Without a usable total the downloaded amount is its own denominator, so an
/// unknown total reads as complete. Zero over zero is also reported as 1.
pub fn fraction_complete(downloaded: f64, total_estimate: Option<f64>) -> f64 {
    let denominator = match total_estimate {
        Some(total) if total > 0.0 => total,
        _ => downloaded,
    };
    if denominator <= 0.0 || !denominator.is_finite() {
        return 1.0;
    }
    (downloaded / denominator).clamp(0.0, 1.0)
}

/// Drops progress updates that arrive too soon after the last forwarded one.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last_forwarded: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_forwarded: None,
        }
    }

    /// Returns true and records `at` if an update observed at `at` may go out.
    ///
    /// The first update always passes.
    pub fn should_forward(&mut self, at: Instant) -> bool {
        match self.last_forwarded {
            Some(last) if at.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_forwarded = Some(at);
                true
            }
        }
    }

    /// Records an update that bypassed the throttle.
    pub fn mark_forwarded(&mut self, at: Instant) {
        self.last_forwarded = Some(self.last_forwarded.map_or(at, |last| last.max(at)));
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(crate::core::config::progress::throttle_interval())
    }
}

/// Subscriber to the progress of one download.
#[async_trait]
pub trait ProgressListener: Send + Sync {
    async fn on_progress(&self, event: &ProgressEvent) -> Result<(), AppError>;
}

/// Adapts an async closure into a [`ProgressListener`].
pub struct FnListener<F>(pub F);

#[async_trait]
impl<F, Fut> ProgressListener for FnListener<F>
where
    F: Fn(ProgressEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    async fn on_progress(&self, event: &ProgressEvent) -> Result<(), AppError> {
        (self.0)(event.clone()).await
    }
}

/// One listener that failed during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    /// Position of the listener in registration order
    pub index: usize,
    pub message: String,
}

/// All listener failures of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchError {
    pub failures: Vec<ListenerFailure>,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} listener(s) failed:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, " [#{}] {};", failure.index, failure.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for DispatchError {}

impl From<DispatchError> for AppError {
    fn from(err: DispatchError) -> Self {
        AppError::Listener(err.to_string())
    }
}

/// Ordered list of listeners for one request.
#[derive(Clone, Default)]
pub struct ListenerFanout {
    listeners: Vec<Arc<dyn ProgressListener>>,
}

impl ListenerFanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers `event` to every listener concurrently and waits for all of them.
    ///
    /// A failing listener never keeps the others from running; every failure is
    /// reported in the returned [`DispatchError`].
    pub async fn dispatch(&self, event: &ProgressEvent) -> Result<(), DispatchError> {
        let results = join_all(self.listeners.iter().map(|listener| listener.on_progress(event))).await;

        let failures: Vec<ListenerFailure> = results
            .into_iter()
            .enumerate()
            .filter_map(|(index, result)| {
                result.err().map(|e| ListenerFailure {
                    index,
                    message: e.to_string(),
                })
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DispatchError { failures })
        }
    }
}

impl fmt::Debug for ListenerFanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerFanout")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
