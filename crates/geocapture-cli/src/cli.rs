use clap::{Parser, Subcommand};
use geocapture_core::config::CliConfigOverrides;
use std::path::PathBuf;

/// GeoCapture - Georeferenced capture sessions for 3D reconstruction
#[derive(Parser, Debug)]
#[command(name = "geocapture")]
#[command(about = "Georeferenced capture sessions for 3D reconstruction", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to ./geocapture.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Processing service base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Node identifier sent with every request
    #[arg(long, global = true)]
    pub node_id: Option<String>,

    /// API key (falls back to GEOCAPTURE_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn config_overrides(&self) -> CliConfigOverrides {
        CliConfigOverrides {
            api_base_url: self.api_url.clone(),
            node_id: self.node_id.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the effective configuration and where each value comes from
    Config(ConfigArgs),

    /// Check connectivity and credentials against the processing service
    Probe,

    /// Show processing network capacity and pricing
    Network,

    /// Inspect submitted reconstruction jobs
    Job(JobArgs),

    /// Replay a recorded GPX track and photo folder as a capture session
    Replay(ReplayArgs),
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Validate the configuration and fail on invalid values
    #[arg(long)]
    pub validate: bool,
}

#[derive(Parser, Debug)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand, Debug)]
pub enum JobCommand {
    /// Show the current status of a job
    Status(JobIdArgs),

    /// Fetch the outputs of a completed job
    Results(JobIdArgs),

    /// Poll a job until it completes or fails
    Wait(WaitArgs),
}

#[derive(Parser, Debug)]
pub struct JobIdArgs {
    /// Job identifier returned at submission
    pub job_id: String,
}

#[derive(Parser, Debug)]
pub struct WaitArgs {
    /// Job identifier returned at submission
    pub job_id: String,

    /// Seconds between status polls
    #[arg(long, default_value = "10")]
    pub interval_secs: u64,

    /// Give up after this many seconds
    #[arg(long, default_value = "14400")]
    pub timeout_secs: u64,

    /// Consecutive network errors tolerated before giving up
    #[arg(long, default_value = "3")]
    pub max_errors: u32,
}

#[derive(Parser, Debug)]
pub struct ReplayArgs {
    /// GPX file with the recorded track
    pub track: PathBuf,

    /// Folder holding the session photos (*.jpg, *.jpeg)
    pub photos: PathBuf,

    /// Write the session snapshot to this file
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Accuracy in meters for track points without HDOP
    #[arg(long, default_value = "0.5")]
    pub accuracy: f64,

    /// Maximum photos per session
    #[arg(long)]
    pub max_photos: Option<usize>,

    /// Precision threshold in meters
    #[arg(long)]
    pub precision_threshold: Option<f64>,

    /// Upload the assets and submit a reconstruction job
    #[arg(long)]
    pub submit: bool,
}

impl ReplayArgs {
    pub fn config_overrides(&self, base: CliConfigOverrides) -> CliConfigOverrides {
        CliConfigOverrides {
            max_photos: self.max_photos,
            precision_threshold_m: self.precision_threshold,
            ..base
        }
    }
}
