use geocapture_core::models::{JobId, JobSubmission, SessionSummary, UploadedAsset};
use serde::Serialize;
use tabled::Tabled;

/// One row of the config command
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigEntry {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

/// Output for probe command
#[derive(Debug, Serialize)]
pub struct ProbeOutput {
    pub base_url: String,
    pub status: String,
    pub version: Option<String>,
}

/// One row of the job results table
#[derive(Debug, Serialize, Tabled)]
pub struct PipelineRow {
    #[tabled(rename = "Pipeline")]
    pub pipeline: String,
    #[tabled(rename = "Points")]
    pub point_count: u64,
    #[tabled(rename = "Size (bytes)")]
    pub file_size: u64,
    #[tabled(rename = "URL")]
    pub url: String,
}

/// Output for replay command
#[derive(Debug, Serialize)]
pub struct ReplayOutput {
    pub track_points: usize,
    pub photos_found: usize,
    pub photos_captured: usize,
    pub skipped: Vec<SkippedShot>,
    pub summary: SessionSummary,
    pub snapshot_path: Option<String>,
    pub submission: Option<SubmissionOutput>,
}

#[derive(Debug, Serialize)]
pub struct SkippedShot {
    pub photo: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct SubmissionOutput {
    pub uploaded: Vec<UploadedAsset>,
    pub job: JobSubmission,
    pub queued_jobs: Vec<JobId>,
}
