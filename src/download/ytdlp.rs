//! yt-dlp adapter.
//!
//! Builds the command line from typed options, runs the binary, and turns its
//! machine-readable progress lines into [`RawSignal`]s. Nothing outside this
//! module looks at the JSON progress payload.

use serde::Deserialize;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::core::error::{AppError, AppResult};
use crate::download::downloader::{Invocation, MediaBackend};
use crate::download::preset::AudioExtraction;
use crate::download::progress::ProgressEvent;

/// Prefix of the lines produced by our `--progress-template`.
pub const PROGRESS_MARKER: &str = "VIDRELAY_PROGRESS ";

/// Keeps the last lines of stderr for the failure log.
const STDERR_TAIL_LINES: usize = 20;

/// Progress dictionary as yt-dlp prints it (`%(progress)j`).
///
/// Only the fields we read are declared; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
struct RawProgress {
    status: String,
    filename: Option<String>,
    downloaded_bytes: Option<f64>,
    total_bytes: Option<f64>,
    total_bytes_estimate: Option<f64>,
    speed: Option<f64>,
    eta: Option<f64>,
    #[serde(rename = "_eta_str")]
    eta_str: Option<String>,
}

/// Typed progress callback from the external tool.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSignal {
    Downloading {
        filename: Option<String>,
        downloaded: f64,
        total_estimate: Option<f64>,
        speed: Option<f64>,
        eta: Option<String>,
    },
    /// The download part is over; post-processing follows
    Finished { filename: Option<String> },
}

impl RawSignal {
    /// Converts a downloading signal into a listener event.
    ///
    /// `Finished` maps to the synthetic processing event.
    pub fn into_event(self) -> ProgressEvent {
        match self {
            RawSignal::Downloading {
                filename,
                downloaded,
                total_estimate,
                speed,
                eta,
            } => ProgressEvent::downloading(filename, downloaded, total_estimate, speed, eta),
            RawSignal::Finished { .. } => ProgressEvent::processing(),
        }
    }
}

/// A signal stamped with the monotonic time it was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedSignal {
    pub at: Instant,
    pub signal: RawSignal,
}

impl TimedSignal {
    pub fn now(signal: RawSignal) -> Self {
        Self {
            at: Instant::now(),
            signal,
        }
    }
}

fn format_eta(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{:02}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

impl RawProgress {
    fn into_signal(self) -> Option<RawSignal> {
        match self.status.as_str() {
            "downloading" => {
                let downloaded = self.downloaded_bytes.unwrap_or(0.0);
                let eta = self
                    .eta_str
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .or_else(|| self.eta.map(format_eta));
                Some(RawSignal::Downloading {
                    filename: self.filename,
                    downloaded,
                    total_estimate: self.total_bytes_estimate.or(self.total_bytes),
                    speed: self.speed,
                    eta,
                })
            }
            "finished" => Some(RawSignal::Finished {
                filename: self.filename,
            }),
            _ => None,
        }
    }
}

/// Parses one stdout line. Returns `None` for anything that is not a
/// progress line we understand.
///
/// # Example
///
/// ```
/// use vidrelay::download::ytdlp::{parse_progress_line, RawSignal};
///
/// let line = r#"VIDRELAY_PROGRESS {"status": "finished", "filename": "a.mp4"}"#;
/// assert!(matches!(parse_progress_line(line), Some(RawSignal::Finished { .. })));
/// assert!(parse_progress_line("[download] Destination: a.mp4").is_none());
/// ```
pub fn parse_progress_line(line: &str) -> Option<RawSignal> {
    let payload = line.trim().strip_prefix(PROGRESS_MARKER.trim_end())?.trim_start();
    match serde_json::from_str::<RawProgress>(payload) {
        Ok(raw) => raw.into_signal(),
        Err(e) => {
            log::trace!("Unparseable progress payload ({}): {}", e, payload);
            None
        }
    }
}

/// yt-dlp post-processor that receives the preset's ffmpeg output arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfmpegStage {
    /// Only runs when separate video and audio streams get merged
    Merger,
    /// Forced through `--use-postprocessor`, runs on every download
    CopyStream,
}

impl FfmpegStage {
    fn key(&self) -> &'static str {
        match self {
            Self::Merger => "Merger",
            Self::CopyStream => "CopyStream",
        }
    }
}

/// Everything needed to build a yt-dlp command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpOptions {
    pub output_template: String,
    pub format: String,
    pub merge_output_format: Option<String>,
    /// ffmpeg output arguments for `postprocessor_stage`
    pub postprocessor_args: Vec<String>,
    pub postprocessor_stage: FfmpegStage,
    pub extract_audio: Option<AudioExtraction>,
    pub extra_args: Vec<String>,
}

impl YtDlpOptions {
    /// Renders the options as arguments, URL last.
    pub fn to_args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-playlist".into(),
            "--no-warnings".into(),
            "--progress-template".into(),
            format!("download:{}%(progress)j", PROGRESS_MARKER),
            "-o".into(),
            self.output_template.clone(),
            "-f".into(),
            self.format.clone(),
        ];

        if let Some(merge) = &self.merge_output_format {
            args.push("--merge-output-format".into());
            args.push(merge.clone());
        }
        if !self.postprocessor_args.is_empty() {
            if self.postprocessor_stage == FfmpegStage::CopyStream {
                args.push("--use-postprocessor".into());
                args.push("FFmpegCopyStream".into());
            }
            args.push("--postprocessor-args".into());
            args.push(format!(
                "{}+ffmpeg_o:{}",
                self.postprocessor_stage.key(),
                self.postprocessor_args.join(" ")
            ));
        }
        if let Some(audio) = &self.extract_audio {
            args.extend([
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                audio.codec.to_string(),
                "--audio-quality".to_string(),
                audio.quality.to_string(),
            ]);
        }
        args.extend(self.extra_args.iter().cloned());
        args.push("--".into());
        args.push(url.to_string());
        args
    }
}

/// Calls `on_line` for every line of `reader`.
///
/// Invalid UTF-8 is decoded lossily; the pipe is drained to EOF either way so
/// the child never blocks or dies on a closed pipe.
fn for_each_line(reader: impl Read, mut on_line: impl FnMut(String)) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                on_line(line.trim_end_matches(['\n', '\r']).to_string());
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("Stopped reading yt-dlp output: {}", e);
                break;
            }
        }
    }
}

/// Runs the real yt-dlp binary.
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    bin: String,
}

impl YtDlpBackend {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn from_config() -> Self {
        Self::new(crate::core::config::YTDL_BIN.as_str())
    }
}

impl MediaBackend for YtDlpBackend {
    fn run(&self, invocation: &Invocation, on_signal: &mut dyn FnMut(TimedSignal)) -> AppResult<i32> {
        log::info!("Starting {} for {}", self.bin, invocation.url);
        log::debug!("{} {}", self.bin, invocation.args.join(" "));

        let mut child = Command::new(&self.bin)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                log::error!("Failed to spawn {}: {}", self.bin, e);
                AppError::ProcessingFailed {
                    url: invocation.url.clone(),
                }
            })?;

        // Drain stderr on its own thread so a chatty process never blocks on a full pipe
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));
        let stderr_reader = child.stderr.take().map(|stderr| {
            let tail = Arc::clone(&stderr_tail);
            std::thread::spawn(move || {
                for_each_line(stderr, |line| {
                    if let Ok(mut tail) = tail.lock() {
                        if tail.len() == STDERR_TAIL_LINES {
                            tail.pop_front();
                        }
                        tail.push_back(line);
                    }
                });
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for_each_line(stdout, |line| match parse_progress_line(&line) {
                Some(signal) => on_signal(TimedSignal::now(signal)),
                None => log::trace!("yt-dlp: {}", line),
            });
        }

        let status = child.wait().map_err(|e| {
            log::error!("Failed to wait for {}: {}", self.bin, e);
            AppError::ProcessingFailed {
                url: invocation.url.clone(),
            }
        })?;
        if let Some(reader) = stderr_reader {
            let _ = reader.join();
        }

        let code = status.code().unwrap_or(-1);
        if code != 0 {
            if let Ok(tail) = stderr_tail.lock() {
                for line in tail.iter() {
                    log::warn!("yt-dlp stderr: {}", line);
                }
            }
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_downloading_line() {
        let line = r#"VIDRELAY_PROGRESS {"status": "downloading", "filename": "/tmp/x/file.mp4", "downloaded_bytes": 1024, "total_bytes_estimate": 4096.5, "speed": 2048.0, "eta": 3, "_eta_str": "00:03", "fragment_index": 2}"#;
        assert_eq!(
            parse_progress_line(line),
            Some(RawSignal::Downloading {
                filename: Some("/tmp/x/file.mp4".into()),
                downloaded: 1024.0,
                total_estimate: Some(4096.5),
                speed: Some(2048.0),
                eta: Some("00:03".into()),
            })
        );
    }

    #[test]
    fn test_parse_prefers_estimate_then_exact_total() {
        let line = r#"VIDRELAY_PROGRESS {"status": "downloading", "downloaded_bytes": 10, "total_bytes": 40}"#;
        match parse_progress_line(line) {
            Some(RawSignal::Downloading { total_estimate, .. }) => assert_eq!(total_estimate, Some(40.0)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_formats_numeric_eta() {
        let line = r#"VIDRELAY_PROGRESS {"status": "downloading", "downloaded_bytes": 1, "eta": 3725, "speed": null}"#;
        match parse_progress_line(line) {
            Some(RawSignal::Downloading { eta, speed, .. }) => {
                assert_eq!(eta.as_deref(), Some("01:02:05"));
                assert_eq!(speed, None);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ignores_other_lines() {
        assert_eq!(parse_progress_line("[youtube] AbCdEfGhIjK: Downloading webpage"), None);
        assert_eq!(parse_progress_line("VIDRELAY_PROGRESS not-json"), None);
        assert_eq!(parse_progress_line(r#"VIDRELAY_PROGRESS {"status": "error"}"#), None);
        assert_eq!(parse_progress_line(""), None);
    }

    #[test]
    fn test_downloading_signal_to_event() {
        let event = RawSignal::Downloading {
            filename: None,
            downloaded: 50.0,
            total_estimate: Some(200.0),
            speed: None,
            eta: None,
        }
        .into_event();
        assert_eq!(event.fraction, 0.25);
        assert_eq!(event.current, 50.0);
        assert_eq!(event.total, 200.0);
    }

    #[test]
    fn test_video_args() {
        let options = YtDlpOptions {
            output_template: "/tmp/x/file.mp4".into(),
            format: "bv*+ba/b".into(),
            merge_output_format: Some("mp4".into()),
            postprocessor_args: vec!["-c".into(), "copy".into()],
            postprocessor_stage: FfmpegStage::Merger,
            extract_audio: None,
            extra_args: vec!["--referer".into(), "https://www.bilibili.com/".into()],
        };
        let args = options.to_args("https://youtu.be/AbCdEfGhIjK");
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/AbCdEfGhIjK"));
        assert!(args.windows(2).any(|w| w[0] == "--merge-output-format" && w[1] == "mp4"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--postprocessor-args" && w[1] == "Merger+ffmpeg_o:-c copy"));
        assert!(args.windows(2).any(|w| w[0] == "--referer"));
        assert!(!args.contains(&"--use-postprocessor".to_string()));
        assert!(!args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&format!("download:{}%(progress)j", PROGRESS_MARKER)));
    }

    #[test]
    fn test_audio_args() {
        let options = YtDlpOptions {
            output_template: "/tmp/x/file".into(),
            format: "bestaudio/best".into(),
            merge_output_format: None,
            postprocessor_args: Vec::new(),
            postprocessor_stage: FfmpegStage::Merger,
            extract_audio: Some(AudioExtraction {
                codec: "mp3",
                quality: "192",
                extension: "mp3",
                lossless: false,
            }),
            extra_args: Vec::new(),
        };
        let args = options.to_args("https://youtu.be/AbCdEfGhIjK");
        assert!(args.windows(2).any(|w| w[0] == "--audio-format" && w[1] == "mp3"));
        assert!(args.windows(2).any(|w| w[0] == "--audio-quality" && w[1] == "192"));
        assert!(!args.contains(&"--postprocessor-args".to_string()));
    }

    #[test]
    fn test_transcode_args_force_copy_stream() {
        let options = YtDlpOptions {
            output_template: "/tmp/x/file.mp4".into(),
            format: "best[ext=mp4]/best".into(),
            merge_output_format: Some("mp4".into()),
            postprocessor_args: vec!["-c:v".into(), "libx264".into(), "-crf".into(), "32".into()],
            postprocessor_stage: FfmpegStage::CopyStream,
            extract_audio: None,
            extra_args: Vec::new(),
        };
        let args = options.to_args("https://clips.twitch.tv/Abc");
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--use-postprocessor" && w[1] == "FFmpegCopyStream"));
        assert!(args
            .windows(2)
            .any(|w| w[0] == "--postprocessor-args" && w[1] == "CopyStream+ffmpeg_o:-c:v libx264 -crf 32"));
    }

    #[test]
    fn test_for_each_line_survives_invalid_utf8() {
        let input: &[u8] = b"first\r\ncaf\xe9.mp4\nlast";
        let mut lines = Vec::new();
        for_each_line(input, |line| lines.push(line));
        assert_eq!(lines, vec!["first", "caf\u{FFFD}.mp4", "last"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_invalid_utf8_output_does_not_abort_download() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-yt-dlp.sh");
        std::fs::write(
            &script,
            concat!(
                "echo 'VIDRELAY_PROGRESS {\"status\": \"downloading\", \"downloaded_bytes\": 10, \"total_bytes\": 100}'\n",
                "printf 'caf\\351.mp4\\n'\n",
                "printf 'caf\\351\\n' >&2\n",
                "i=0\n",
                "while [ $i -lt 4000 ]; do echo \"[download] line $i\"; i=$((i+1)); done\n",
                "echo 'VIDRELAY_PROGRESS {\"status\": \"finished\"}'\n",
                "exit 0\n",
            ),
        )
        .unwrap();

        // Run through sh so the script needs no exec bit
        let backend = YtDlpBackend::new("sh");
        let invocation = Invocation {
            url: "https://youtu.be/AbCdEfGhIjK".into(),
            args: vec![script.display().to_string()],
        };
        let mut signals = Vec::new();
        let code = backend.run(&invocation, &mut |timed| signals.push(timed.signal)).unwrap();

        assert_eq!(code, 0);
        assert_eq!(signals.len(), 2);
        assert!(matches!(signals[1], RawSignal::Finished { .. }));
    }

    #[test]
    fn test_missing_binary_is_processing_failure() {
        let backend = YtDlpBackend::new("/definitely/not/a/real/yt-dlp");
        let invocation = Invocation {
            url: "https://youtu.be/AbCdEfGhIjK".into(),
            args: vec![],
        };
        let result = backend.run(&invocation, &mut |_| {});
        assert!(matches!(result, Err(AppError::ProcessingFailed { .. })));
    }
}
