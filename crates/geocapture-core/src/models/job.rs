//! Client-side mirror of remote reconstruction jobs.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Identifier assigned by the processing service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Reconstruction pipelines requested for every job
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingType {
    GaussianSplatting,
    ConvexSplatting,
}

impl ProcessingType {
    pub const ALL: [ProcessingType; 2] =
        [ProcessingType::GaussianSplatting, ProcessingType::ConvexSplatting];
}

impl std::fmt::Display for ProcessingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProcessingType::GaussianSplatting => "gaussian_splatting",
            ProcessingType::ConvexSplatting => "convex_splatting",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Ply,
    Splat,
    Obj,
    Gltf,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] =
        [OutputFormat::Ply, OutputFormat::Splat, OutputFormat::Obj, OutputFormat::Gltf];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Accepted job as returned by the submit endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub job_id: JobId,
    /// Estimated processing time in seconds
    #[serde(default)]
    pub estimated_time: Option<u64>,
    #[serde(default)]
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub status: JobStatus,
    /// Percentage in 0..=100
    #[serde(default, deserialize_with = "percentage")]
    pub progress: f64,
    #[serde(default)]
    pub estimated_time_remaining: Option<u64>,
    #[serde(default)]
    pub current_stage: Option<String>,
}

/// Accepts integral or fractional percentages and clamps them into range
fn percentage<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.unwrap_or(0.0).clamp(0.0, 100.0))
}

/// Output of a single reconstruction pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineResult {
    pub url: String,
    pub hash: String,
    pub point_count: u64,
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResults {
    pub results: BTreeMap<ProcessingType, PipelineResult>,
    /// Seconds spent processing
    pub processing_time: f64,
    #[serde(default)]
    pub render_nodes: Vec<String>,
    pub quality_score: f64,
}

impl JobResults {
    pub fn pipeline(&self, processing_type: ProcessingType) -> Option<&PipelineResult> {
        self.results.get(&processing_type)
    }
}

/// Capacity and pricing of the processing network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub available_nodes: u32,
    /// Seconds
    pub average_processing_time: f64,
    pub pricing: f64,
    pub queue_length: u32,
}

/// Remote reference for one successfully uploaded asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    /// Position of the asset in the upload request
    pub index: usize,
    pub uri: String,
    pub upload_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFailure {
    pub index: usize,
    pub path: PathBuf,
    pub reason: String,
}
