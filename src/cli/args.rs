//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the compress command
#[derive(Args, Debug)]
pub struct CompressArgs {
    /// Input video file path
    #[arg(short, long = "in", value_name = "FILE")]
    pub input: PathBuf,

    /// Output file path (default: <input>_compressed.<ext>)
    #[arg(short, long = "out", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output frame height in pixels
    #[arg(long)]
    pub target_height: Option<u32>,

    /// Playback speed multiplier while recording
    #[arg(long)]
    pub playback_rate: Option<f64>,

    /// Target bitrate in bits per second
    #[arg(long)]
    pub bitrate: Option<u64>,

    /// Inputs smaller than this many bytes are copied unchanged
    #[arg(long)]
    pub threshold_bytes: Option<u64>,

    /// Codec preference list, e.g. `libvpx-vp9:webm,libx264:mp4`
    #[arg(long)]
    pub codecs: Option<String>,
}

/// Arguments for the extract command
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Input video file path
    #[arg(short, long = "in", value_name = "FILE")]
    pub input: PathBuf,

    /// Start time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub start: String,

    /// End time (HH:MM:SS.ms, MM:SS.ms, or seconds)
    #[arg(short, long)]
    pub end: String,

    /// Output file path (default: auto-generated)
    #[arg(short, long = "out", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Maximum output frame height in pixels
    #[arg(long)]
    pub max_height: Option<u32>,

    /// Target bitrate in bits per second
    #[arg(long)]
    pub bitrate: Option<u64>,

    /// Wait after seeking before recording starts, in milliseconds
    #[arg(long)]
    pub settle_ms: Option<u64>,

    /// Codec preference list, e.g. `libvpx-vp9:webm,libx264:mp4`
    #[arg(long)]
    pub codecs: Option<String>,
}

/// Arguments for the highlights command
#[derive(Args, Debug)]
pub struct HighlightsArgs {
    /// Input video file path
    #[arg(short, long = "in", value_name = "FILE")]
    pub input: PathBuf,

    /// Analysis report JSON (title, summary, highlights)
    #[arg(short, long, value_name = "JSON")]
    pub report: PathBuf,

    /// Output directory (default: <input>_highlights)
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Input video file path
    #[arg(short, long = "in", value_name = "FILE")]
    pub input: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
