//! Quality presets and the encoder parameters they resolve to.
//!
//! The tables below are the single source of truth for what each preset means.
//! Lookups go through [`video_encoding`] and [`audio_extraction`]; both return
//! [`AppError::UnregisteredPreset`] when a variant is missing from its table.

use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::core::error::{AppError, AppResult};

/// Named quality tier chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum QualityPreset {
    Low,
    Medium,
    #[default]
    Hd,
    /// Stream copy for video, lossless codec for audio
    Original,
}

impl QualityPreset {
    /// Label shown on prompt buttons.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::Hd => "HD",
            Self::Original => "Original",
        }
    }
}

/// What the user wants back: a video file or just the audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// Default container extension for the kind.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Audio => "mp3",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Video => "Video",
            Self::Audio => "Audio",
        }
    }
}

/// ffmpeg output parameters for a video preset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoEncoding {
    /// Re-encode with H.264/AAC
    Transcode {
        encoder: &'static str,
        crf: u8,
        speed_preset: &'static str,
        profile: &'static str,
        pixel_format: &'static str,
        audio_codec: &'static str,
        audio_bitrate: &'static str,
        output_flags: &'static str,
    },
    /// Keep the source streams untouched, only fix up the container
    StreamCopy { output_flags: &'static str },
}

impl VideoEncoding {
    /// Renders the parameter set as ffmpeg output arguments.
    pub fn ffmpeg_args(&self) -> Vec<String> {
        match self {
            VideoEncoding::Transcode {
                encoder,
                crf,
                speed_preset,
                profile,
                pixel_format,
                audio_codec,
                audio_bitrate,
                output_flags,
            } => vec![
                "-c:v".into(),
                (*encoder).into(),
                "-crf".into(),
                crf.to_string(),
                "-preset".into(),
                (*speed_preset).into(),
                "-profile:v".into(),
                (*profile).into(),
                "-pix_fmt".into(),
                (*pixel_format).into(),
                "-c:a".into(),
                (*audio_codec).into(),
                "-b:a".into(),
                (*audio_bitrate).into(),
                "-movflags".into(),
                (*output_flags).into(),
            ],
            VideoEncoding::StreamCopy { output_flags } => {
                vec!["-c".into(), "copy".into(), "-movflags".into(), (*output_flags).into()]
            }
        }
    }

    pub fn is_stream_copy(&self) -> bool {
        matches!(self, VideoEncoding::StreamCopy { .. })
    }
}

/// Audio extraction parameters (yt-dlp `--audio-format` / `--audio-quality`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: &'static str,
    pub quality: &'static str,
    /// Extension of the file the extractor produces
    pub extension: &'static str,
    pub lossless: bool,
}

const FASTSTART: &str = "+faststart";

const fn x264(crf: u8, speed_preset: &'static str, profile: &'static str, audio_bitrate: &'static str) -> VideoEncoding {
    VideoEncoding::Transcode {
        encoder: "libx264",
        crf,
        speed_preset,
        profile,
        pixel_format: "yuv420p",
        audio_codec: "aac",
        audio_bitrate,
        output_flags: FASTSTART,
    }
}

const fn mp3(quality: &'static str) -> AudioExtraction {
    AudioExtraction {
        codec: "mp3",
        quality,
        extension: "mp3",
        lossless: false,
    }
}

static VIDEO_PRESETS: &[(QualityPreset, VideoEncoding)] = &[
    (QualityPreset::Low, x264(32, "veryfast", "baseline", "64k")),
    (QualityPreset::Medium, x264(28, "medium", "main", "96k")),
    (QualityPreset::Hd, x264(23, "medium", "high", "128k")),
    (QualityPreset::Original, VideoEncoding::StreamCopy { output_flags: FASTSTART }),
];

static AUDIO_PRESETS: &[(QualityPreset, AudioExtraction)] = &[
    (QualityPreset::Low, mp3("96")),
    (QualityPreset::Medium, mp3("160")),
    (QualityPreset::Hd, mp3("192")),
    (
        QualityPreset::Original,
        AudioExtraction {
            codec: "flac",
            quality: "0",
            extension: "flac",
            lossless: true,
        },
    ),
];

fn lookup<T>(table: &'static [(QualityPreset, T)], preset: QualityPreset) -> AppResult<&'static T> {
    table
        .iter()
        .find(|(p, _)| *p == preset)
        .map(|(_, params)| params)
        .ok_or_else(|| {
            log::error!("Preset table has no entry for `{}`", preset);
            AppError::UnregisteredPreset(preset.to_string())
        })
}

/// Encoder parameters for a video download.
pub fn video_encoding(preset: QualityPreset) -> AppResult<&'static VideoEncoding> {
    lookup(VIDEO_PRESETS, preset)
}

/// Extraction parameters for an audio download.
pub fn audio_extraction(preset: QualityPreset) -> AppResult<&'static AudioExtraction> {
    lookup(AUDIO_PRESETS, preset)
}
