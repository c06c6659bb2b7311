use clap::{Parser, Subcommand};

use crate::download::{MediaKind, QualityPreset};

#[derive(Parser)]
#[command(name = "vidrelay")]
#[command(author, version, about = "Chat bot that fetches videos from popular sites with yt-dlp", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot (default when no command is given)
    Run,

    /// Show which downloader a URL resolves to
    Classify {
        /// URL to classify
        url: String,
    },

    /// Download a URL from the terminal, printing progress
    Download {
        /// URL to download
        url: String,

        /// What to produce: video or audio
        #[arg(short, long, default_value = "video")]
        kind: MediaKind,

        /// Quality preset: low, medium, hd or original
        #[arg(short, long, default_value = "hd")]
        quality: QualityPreset,

        /// Output directory (defaults to the current directory)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List quality presets and the encoder settings they map to
    Presets,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
