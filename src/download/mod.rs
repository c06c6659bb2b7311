//! Download management: classification, presets, progress, and the yt-dlp runner

pub mod downloader;
pub mod preset;
pub mod progress;
pub mod request;
pub mod source;
pub mod ytdlp;

// Re-exports for convenience
pub use downloader::{DownloadOutput, Downloader, Invocation, MediaBackend};
pub use preset::{MediaKind, QualityPreset};
pub use progress::{
    DispatchError, FnListener, ListenerFailure, ListenerFanout, ProgressEvent, ProgressListener, ProgressPhase,
    ProgressThrottle,
};
pub use request::ClassifiedRequest;
pub use source::{classify, DownloaderKind};
