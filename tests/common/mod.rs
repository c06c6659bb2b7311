//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;

use vidrelay::core::AppError;
use vidrelay::download::{ProgressEvent, ProgressListener, ProgressPhase};

/// Listener that remembers every event it receives.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, phase: ProgressPhase) -> usize {
        self.events().iter().filter(|e| e.phase == phase).count()
    }
}

#[async_trait]
impl ProgressListener for RecordingListener {
    async fn on_progress(&self, event: &ProgressEvent) -> Result<(), AppError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Listener that fails on every event.
pub struct FailingListener;

#[async_trait]
impl ProgressListener for FailingListener {
    async fn on_progress(&self, _event: &ProgressEvent) -> Result<(), AppError> {
        Err(AppError::Listener("status message is gone".to_string()))
    }
}
