use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ffconvert")]
#[command(about = "Convert a video file to another container format", long_about = None)]
pub struct Cli {
    /// Target container format (mp4, webm, avi, wmv, mov). Unknown or
    /// missing values fall back to the default.
    #[arg(value_name = "FORMAT")]
    pub format: Option<String>,

    /// Video file to convert
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Directory to save the converted file in (defaults to the current
    /// directory, or the configured output dir)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check if ffmpeg and ffprobe are installed
    CheckFfmpeg,

    /// Probe a video file to get its duration
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// List the supported output formats
    Formats,

    /// Show config status and location, or create default config if missing
    InitConfig,
}

pub fn parse() -> Cli {
    Cli::parse()
}
