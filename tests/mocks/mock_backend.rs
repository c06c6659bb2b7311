//! Scripted media backend
//!
//! Replays a fixed list of progress signals, each stamped at a chosen offset
//! from the start of the run, then writes a dummy output file and exits with
//! the configured code.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use vidrelay::core::AppResult;
use vidrelay::download::ytdlp::{RawSignal, TimedSignal};
use vidrelay::download::{Invocation, MediaBackend};

pub struct ScriptedBackend {
    steps: Vec<(Duration, RawSignal)>,
    exit_code: i32,
    output_bytes: usize,
    invocations: Mutex<Vec<Invocation>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            exit_code: 0,
            output_bytes: 1024,
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Adds a downloading signal observed `offset_ms` after the run started.
    pub fn downloading(mut self, offset_ms: u64, downloaded: f64, total: f64) -> Self {
        self.steps.push((
            Duration::from_millis(offset_ms),
            RawSignal::Downloading {
                filename: Some("video.mp4".to_string()),
                downloaded,
                total_estimate: Some(total),
                speed: Some(1_000_000.0),
                eta: Some("00:01".to_string()),
            },
        ));
        self
    }

    pub fn finished(mut self, offset_ms: u64) -> Self {
        self.steps.push((
            Duration::from_millis(offset_ms),
            RawSignal::Finished {
                filename: Some("video.mp4".to_string()),
            },
        ));
        self
    }

    /// A steady stream of downloading samples, one every `step_ms`.
    pub fn samples(mut self, count: u64, step_ms: u64) -> Self {
        for i in 0..count {
            let total = count as f64 * 1000.0;
            self = self.downloading(i * step_ms, (i + 1) as f64 * 1000.0, total);
        }
        self
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    pub fn output_bytes(mut self, bytes: usize) -> Self {
        self.output_bytes = bytes;
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Where yt-dlp would put the file for these arguments.
fn output_path(args: &[String]) -> Option<PathBuf> {
    let template = args.iter().position(|a| a == "-o").and_then(|i| args.get(i + 1))?;
    let audio_format = args
        .iter()
        .position(|a| a == "--audio-format")
        .and_then(|i| args.get(i + 1));
    Some(match audio_format {
        Some(format) => PathBuf::from(template.replace("%(ext)s", format)),
        None => PathBuf::from(template),
    })
}

impl MediaBackend for ScriptedBackend {
    fn run(&self, invocation: &Invocation, on_signal: &mut dyn FnMut(TimedSignal)) -> AppResult<i32> {
        self.invocations.lock().unwrap().push(invocation.clone());

        let base = Instant::now();
        for (offset, signal) in &self.steps {
            on_signal(TimedSignal {
                at: base + *offset,
                signal: signal.clone(),
            });
        }

        if self.exit_code == 0 {
            if let Some(path) = output_path(&invocation.args) {
                std::fs::write(path, vec![0u8; self.output_bytes])?;
            }
        }
        Ok(self.exit_code)
    }
}
