use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use super::{AccuracyClass, CoordinateSystem, GeoFix, PhotoAsset, VideoAsset};

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Time-based session identifier, unique for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a new identifier from the session start time.
    ///
    /// The process-wide sequence suffix keeps ids distinct when two sessions
    /// start within the same millisecond.
    pub fn generate(started_at: DateTime<Utc>) -> Self {
        let seq = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self(format!("session_{}_{}", started_at.timestamp_millis(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One capture run anchored at a frozen base location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    pub id: SessionId,
    pub started_at: DateTime<Utc>,
    /// Snapshot of the fix at session start; never recomputed
    pub base_location: GeoFix,
    pub total_assets: usize,
}

impl CaptureSession {
    pub fn new(id: SessionId, started_at: DateTime<Utc>, base_location: GeoFix) -> Self {
        Self {
            id,
            started_at,
            base_location,
            total_assets: 0,
        }
    }
}

/// Session block sent along with a reconstruction job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub session_id: SessionId,
    pub base_location: GeoFix,
    pub total_assets: usize,
    pub coordinate_system: CoordinateSystem,
    #[serde(rename = "isRTKSurvey")]
    pub is_rtk_survey: bool,
}

impl SessionMetadata {
    pub fn for_session(session: &CaptureSession) -> Self {
        Self {
            session_id: session.id.clone(),
            base_location: session.base_location.clone(),
            total_assets: session.total_assets,
            coordinate_system: CoordinateSystem::Wgs84,
            is_rtk_survey: session.base_location.is_precise,
        }
    }
}

/// Read-only view of the engine state for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: Option<SessionId>,
    pub started_at: Option<DateTime<Utc>>,
    pub photo_count: usize,
    pub video_count: usize,
    pub total_assets: usize,
    pub base_location: Option<GeoFix>,
    pub accuracy: AccuracyClass,
    pub remaining_photo_capacity: usize,
    /// Enough photos to be worth submitting for reconstruction
    pub ready_for_processing: bool,
}

/// Exportable session together with its asset ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session: CaptureSession,
    pub photos: Vec<PhotoAsset>,
    pub videos: Vec<VideoAsset>,
}

impl SessionSnapshot {
    pub fn metadata(&self) -> SessionMetadata {
        SessionMetadata::for_session(&self.session)
    }
}
