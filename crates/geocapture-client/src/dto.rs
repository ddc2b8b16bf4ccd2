//! Wire types for the processing service REST API.

use chrono::{DateTime, Utc};
use geocapture_core::models::{
    CapturedAsset, GeoFix, OutputFormat, PhotoAsset, ProcessingType, SessionMetadata,
    SurveyMetadata, VideoAsset,
};
use serde::{Deserialize, Serialize};

pub const JOB_TYPE: &str = "3d_reconstruction";
pub const JOB_QUALITY: &str = "high";
pub const JOB_PRIORITY: &str = "normal";

/// Response of `GET /status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// `metadata` field of a `POST /upload` multipart request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata<'a> {
    pub gps_data: &'a GeoFix,
    pub timestamp: DateTime<Utc>,
    pub index: usize,
}

impl<'a> UploadMetadata<'a> {
    pub fn for_asset(asset: &'a CapturedAsset, index: usize) -> Self {
        Self {
            gps_data: asset.gps_data(),
            timestamp: asset.timestamp(),
            index,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub uri: String,
    pub upload_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoEntry<'a> {
    pub uri: String,
    pub timestamp: DateTime<Utc>,
    pub index: usize,
    pub gps_data: &'a GeoFix,
    pub survey_metadata: &'a SurveyMetadata,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEntry<'a> {
    pub uri: String,
    pub timestamp: DateTime<Utc>,
    pub duration: f64,
    pub gps_data: &'a GeoFix,
    pub survey_metadata: SurveyMetadata,
}

#[derive(Debug, Serialize)]
pub struct JobAssets<'a> {
    pub photos: Vec<PhotoEntry<'a>>,
    pub videos: Vec<VideoEntry<'a>>,
}

/// Body of `POST /jobs/submit`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest<'a> {
    pub job_type: &'static str,
    pub processing_types: [ProcessingType; 2],
    pub assets: JobAssets<'a>,
    pub session_metadata: &'a SessionMetadata,
    pub output_formats: [OutputFormat; 4],
    pub quality: &'static str,
    pub priority: &'static str,
}

impl<'a> JobRequest<'a> {
    /// Describe a reconstruction of the given assets.
    ///
    /// Uploaded assets are referenced by their remote URI, others by their
    /// local path. Video offsets are computed against the session base.
    pub fn new(
        photos: &'a [PhotoAsset],
        videos: &'a [VideoAsset],
        session_metadata: &'a SessionMetadata,
    ) -> Self {
        let photos = photos
            .iter()
            .map(|photo| PhotoEntry {
                uri: asset_uri(photo.remote_uri.as_deref(), &photo.media.path),
                timestamp: photo.timestamp,
                index: photo.index,
                gps_data: &photo.gps_data,
                survey_metadata: &photo.survey_metadata,
            })
            .collect();

        let videos = videos
            .iter()
            .map(|video| VideoEntry {
                uri: asset_uri(video.remote_uri.as_deref(), &video.media.path),
                timestamp: video.timestamp,
                duration: video.duration,
                gps_data: &video.gps_data,
                survey_metadata: SurveyMetadata::relative_to(
                    &video.gps_data,
                    &session_metadata.base_location,
                ),
            })
            .collect();

        Self {
            job_type: JOB_TYPE,
            processing_types: ProcessingType::ALL,
            assets: JobAssets { photos, videos },
            session_metadata,
            output_formats: OutputFormat::ALL,
            quality: JOB_QUALITY,
            priority: JOB_PRIORITY,
        }
    }
}

fn asset_uri(remote: Option<&str>, path: &std::path::Path) -> String {
    remote
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// Error body returned by the service, in either of its two shapes
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
