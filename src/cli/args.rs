//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::core::models::{
    DEFAULT_DIMENSION, DEFAULT_DURATION_MS, DEFAULT_FPS, DEFAULT_SAMPLE_STRENGTH, Geometry,
};
use crate::error::{GenError, Result};

/// genflow - Generate images and videos through a hosted generation service.
#[derive(Parser, Debug)]
#[command(name = "genflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    // === Global flags ===
    /// Session token; repeat the flag or comma-separate several accounts
    #[arg(
        long = "token",
        value_name = "TOKEN",
        value_delimiter = ',',
        global = true
    )]
    pub tokens: Vec<String>,

    /// Service base URL
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub timeout: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub format: OutputFormat,

    /// Shorthand for --format json
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Log level
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSONL logs to stderr
    #[arg(long, global = true)]
    pub json_output: bool,

    /// Verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the effective output format.
    #[must_use]
    pub const fn effective_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            self.format
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate images from a text prompt
    Image(ImageArgs),

    /// Generate images guided by a reference image
    Edit(EditArgs),

    /// Generate a video from a first-frame image
    Video(VideoArgs),

    /// Show the credit balance of every configured account
    Credit,

    /// Upload an image and print its reference
    Upload(UploadArgs),
}

/// Output geometry flags shared by generation commands.
#[derive(Args, Debug, Clone, Copy)]
pub struct GeometryArgs {
    /// Output width in pixels
    #[arg(long, default_value_t = DEFAULT_DIMENSION)]
    pub width: u32,

    /// Output height in pixels
    #[arg(long, default_value_t = DEFAULT_DIMENSION)]
    pub height: u32,
}

impl GeometryArgs {
    /// Validated geometry.
    ///
    /// # Errors
    /// Rejects a zero width or height.
    pub fn geometry(self) -> Result<Geometry> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if value == 0 {
                return Err(GenError::InvalidArgument {
                    name: name.to_string(),
                    message: "must be greater than 0".to_string(),
                });
            }
        }
        Ok(Geometry {
            width: self.width,
            height: self.height,
        })
    }
}

/// Source image for edit and video commands: an already-uploaded reference
/// or a local file uploaded first.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ImageSourceArgs {
    /// Image reference returned by `genflow upload`
    #[arg(long, value_name = "URI")]
    pub image: Option<String>,

    /// Local image file to upload first
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

/// Arguments for the `image` command.
#[derive(Parser, Debug)]
pub struct ImageArgs {
    /// Text prompt
    pub prompt: String,

    /// Model name (unknown names fall back to the default)
    #[arg(long, short)]
    pub model: Option<String>,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    /// Sample strength (0.0 - 1.0)
    #[arg(long, default_value_t = DEFAULT_SAMPLE_STRENGTH)]
    pub sample_strength: f64,

    /// Things the image should not contain
    #[arg(long, default_value = "")]
    pub negative_prompt: String,
}

/// Arguments for the `edit` command.
#[derive(Parser, Debug)]
pub struct EditArgs {
    /// Text prompt describing the edit
    pub prompt: String,

    /// Model name (unknown names fall back to the default)
    #[arg(long, short)]
    pub model: Option<String>,

    #[command(flatten)]
    pub source: ImageSourceArgs,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    /// Sample strength (0.0 - 1.0)
    #[arg(long, default_value_t = DEFAULT_SAMPLE_STRENGTH)]
    pub sample_strength: f64,
}

/// Arguments for the `video` command.
#[derive(Parser, Debug)]
pub struct VideoArgs {
    /// Text prompt
    pub prompt: String,

    /// Model name (unknown names fall back to the default)
    #[arg(long, short)]
    pub model: Option<String>,

    #[command(flatten)]
    pub source: ImageSourceArgs,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    /// Frames per second
    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// Duration in milliseconds
    #[arg(long, default_value_t = DEFAULT_DURATION_MS)]
    pub duration_ms: u32,

    /// Seed (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for the `upload` command.
#[derive(Parser, Debug)]
pub struct UploadArgs {
    /// Image file to upload
    pub file: PathBuf,
}

/// Check a sample strength value.
///
/// # Errors
/// Rejects values outside 0.0 - 1.0.
pub fn validate_sample_strength(value: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(GenError::InvalidArgument {
            name: "sample-strength".to_string(),
            message: format!("{value} is outside 0.0 - 1.0"),
        })
    }
}

/// Output format.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
}
