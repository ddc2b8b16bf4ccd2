//! Error types for GeoCapture

use std::path::PathBuf;
use thiserror::Error;

use crate::models::{UploadFailure, UploadedAsset};

#[derive(Debug, Error)]
pub enum GeocaptureError {
    // Capability errors
    #[error("Permission denied for {capability}")]
    PermissionDenied { capability: String },

    #[error("Location unavailable: {reason}")]
    LocationUnavailable { reason: String },

    // Session precondition errors
    #[error("No active capture session. Start a session first")]
    NoActiveSession,

    #[error("No GPS fix available yet")]
    NoFixAvailable,

    #[error("Capture capacity exceeded: maximum of {max} photos reached")]
    CapacityExceeded { max: usize },

    #[error("Capture belongs to session {expected}, but the active session is {actual}")]
    SessionChanged { expected: String, actual: String },

    // Camera errors
    #[error("Camera is not ready")]
    CameraNotReady,

    #[error("A capture is already in progress")]
    CaptureInProgress,

    #[error("A recording is already in progress")]
    RecordingInProgress,

    #[error("Capture failed: {reason}")]
    CaptureFailure { reason: String },

    // Remote service errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Authentication rejected: {0}")]
    Authentication(String),

    #[error("Job submission failed: {0}")]
    Submission(String),

    #[error("{} of {} uploads failed", failures.len(), failures.len() + completed.len())]
    UploadFailed {
        failures: Vec<UploadFailure>,
        completed: Vec<UploadedAsset>,
    },

    #[error("Job {job_id} has not completed yet")]
    JobNotComplete { job_id: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response from processing service: {0}")]
    InvalidResponse(String),

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    #[error("Media file not readable at {}: {reason}", path.display())]
    MediaUnreadable { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GeocaptureError {
    /// Whether a caller may reasonably retry the failed operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, GeocaptureError::Network(_) | GeocaptureError::Timeout { .. })
    }

    /// Whether the failure is a local precondition that left all state untouched
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            GeocaptureError::NoActiveSession
                | GeocaptureError::NoFixAvailable
                | GeocaptureError::CameraNotReady
                | GeocaptureError::CaptureInProgress
                | GeocaptureError::RecordingInProgress
                | GeocaptureError::CapacityExceeded { .. }
        )
    }
}

impl From<serde_json::Error> for GeocaptureError {
    fn from(err: serde_json::Error) -> Self {
        GeocaptureError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeocaptureError>;
