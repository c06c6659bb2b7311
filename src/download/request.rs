//! Classified download requests and their per-request progress state.

use std::sync::Arc;

use crate::download::preset::QualityPreset;
use crate::download::progress::{DispatchError, ListenerFanout, ProgressEvent, ProgressListener, ProgressThrottle};
use crate::download::source::DownloaderKind;

/// A URL matched to a downloader, with its per-request progress state.
///
/// Created by [`classify`](crate::download::source::classify) and owned by the
/// flow that handles one user request. Listeners and the throttle are never
/// shared between requests.
#[derive(Debug)]
pub struct ClassifiedRequest {
    url: String,
    captures: Vec<Option<String>>,
    kind: DownloaderKind,
    preset: QualityPreset,
    fanout: ListenerFanout,
    throttle: ProgressThrottle,
}

impl ClassifiedRequest {
    pub fn new(url: impl Into<String>, captures: Vec<Option<String>>, kind: DownloaderKind) -> Self {
        Self {
            url: url.into(),
            captures,
            kind,
            preset: QualityPreset::default(),
            fanout: ListenerFanout::new(),
            throttle: ProgressThrottle::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Capture groups of the matching pattern, group 1 first.
    pub fn captures(&self) -> &[Option<String>] {
        &self.captures
    }

    pub fn kind(&self) -> DownloaderKind {
        self.kind
    }

    pub fn preset(&self) -> QualityPreset {
        self.preset
    }

    /// Selects the quality preset. The downloader holds `&mut self` while it
    /// runs, so the preset cannot change mid-download.
    pub fn set_preset(&mut self, preset: QualityPreset) {
        self.preset = preset;
    }

    pub fn with_preset(mut self, preset: QualityPreset) -> Self {
        self.preset = preset;
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn ProgressListener>) {
        self.fanout.add_listener(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.fanout.len()
    }

    pub async fn dispatch_progress(&self, event: &ProgressEvent) -> Result<(), DispatchError> {
        self.fanout.dispatch(event).await
    }

    pub(crate) fn throttle_mut(&mut self) -> &mut ProgressThrottle {
        &mut self.throttle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::source::classify;

    #[test]
    fn test_defaults_to_hd() {
        let request = classify("https://youtu.be/AbCdEfGhIjK").unwrap();
        assert_eq!(request.preset(), QualityPreset::Hd);
        assert_eq!(request.listener_count(), 0);
        assert_eq!(request.url(), "https://youtu.be/AbCdEfGhIjK");
    }

    #[test]
    fn test_set_preset() {
        let mut request = classify("https://youtu.be/AbCdEfGhIjK").unwrap();
        request.set_preset(QualityPreset::Low);
        assert_eq!(request.preset(), QualityPreset::Low);
        let request = request.with_preset(QualityPreset::Original);
        assert_eq!(request.preset(), QualityPreset::Original);
    }
}
