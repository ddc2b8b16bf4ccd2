//! Captured assets and their survey metadata.
//!
//! Assets are immutable once recorded. Derived values such as the remote URI
//! after an upload are attached by building a new asset from the old one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{CoordinateSystem, GeoFix, SessionId};

/// Reference to media written by the camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub path: PathBuf,
    pub mime_type: String,
}

impl MediaRef {
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn jpeg(path: impl Into<PathBuf>) -> Self {
        Self::new(path, "image/jpeg")
    }

    pub fn mp4(path: impl Into<PathBuf>) -> Self {
        Self::new(path, "video/mp4")
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "asset".to_string())
    }
}

/// Quality block of the survey metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyQuality {
    pub accuracy: f64,
    pub is_precise: bool,
    pub coordinate_system: CoordinateSystem,
}

/// Offset of a capture fix from the session base location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyMetadata {
    pub delta_latitude: f64,
    pub delta_longitude: f64,
    pub delta_altitude: f64,
    pub quality: SurveyQuality,
}

impl SurveyMetadata {
    /// Plain component-wise difference `fix - base`, in degrees and meters
    pub fn relative_to(fix: &GeoFix, base: &GeoFix) -> Self {
        Self {
            delta_latitude: fix.latitude - base.latitude,
            delta_longitude: fix.longitude - base.longitude,
            delta_altitude: fix.altitude - base.altitude,
            quality: SurveyQuality {
                accuracy: fix.accuracy,
                is_precise: fix.is_precise,
                coordinate_system: CoordinateSystem::Wgs84,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoAsset {
    pub media: MediaRef,
    pub timestamp: DateTime<Utc>,
    pub session_id: SessionId,
    /// 1-based position within the session
    pub index: usize,
    pub gps_data: GeoFix,
    pub survey_metadata: SurveyMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_uri: Option<String>,
}

impl PhotoAsset {
    pub fn new(
        media: MediaRef,
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        index: usize,
        gps_data: GeoFix,
        base_location: &GeoFix,
    ) -> Self {
        let survey_metadata = SurveyMetadata::relative_to(&gps_data, base_location);
        Self {
            media,
            timestamp,
            session_id,
            index,
            gps_data,
            survey_metadata,
            remote_uri: None,
        }
    }

    /// Copy of this photo pointing at its uploaded location
    pub fn with_remote_uri(&self, uri: impl Into<String>) -> Self {
        Self {
            remote_uri: Some(uri.into()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoAsset {
    pub media: MediaRef,
    pub timestamp: DateTime<Utc>,
    pub session_id: SessionId,
    /// Recorded length in seconds
    pub duration: f64,
    /// Fix active when the recording started
    pub gps_data: GeoFix,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_uri: Option<String>,
}

impl VideoAsset {
    pub fn new(
        media: MediaRef,
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        duration: f64,
        gps_data: GeoFix,
    ) -> Self {
        Self {
            media,
            timestamp,
            session_id,
            duration,
            gps_data,
            remote_uri: None,
        }
    }

    pub fn with_remote_uri(&self, uri: impl Into<String>) -> Self {
        Self {
            remote_uri: Some(uri.into()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Photo,
    Video,
}

/// Any captured asset, as handed to the upload stage
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedAsset {
    Photo(PhotoAsset),
    Video(VideoAsset),
}

impl CapturedAsset {
    pub fn kind(&self) -> AssetKind {
        match self {
            CapturedAsset::Photo(_) => AssetKind::Photo,
            CapturedAsset::Video(_) => AssetKind::Video,
        }
    }

    pub fn media(&self) -> &MediaRef {
        match self {
            CapturedAsset::Photo(photo) => &photo.media,
            CapturedAsset::Video(video) => &video.media,
        }
    }

    pub fn gps_data(&self) -> &GeoFix {
        match self {
            CapturedAsset::Photo(photo) => &photo.gps_data,
            CapturedAsset::Video(video) => &video.gps_data,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            CapturedAsset::Photo(photo) => photo.timestamp,
            CapturedAsset::Video(video) => video.timestamp,
        }
    }

    /// Attach the uploaded location, producing a new asset
    pub fn with_remote_uri(&self, uri: impl Into<String>) -> Self {
        match self {
            CapturedAsset::Photo(photo) => CapturedAsset::Photo(photo.with_remote_uri(uri)),
            CapturedAsset::Video(video) => CapturedAsset::Video(video.with_remote_uri(uri)),
        }
    }
}

impl From<PhotoAsset> for CapturedAsset {
    fn from(photo: PhotoAsset) -> Self {
        CapturedAsset::Photo(photo)
    }
}

impl From<VideoAsset> for CapturedAsset {
    fn from(video: VideoAsset) -> Self {
        CapturedAsset::Video(video)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PositionSample;

    fn fix(lat: f64, lon: f64, alt: f64, accuracy: f64) -> GeoFix {
        GeoFix::from_sample(
            &PositionSample::new(lat, lon, accuracy, Utc::now()).with_altitude(alt),
            1.0,
        )
    }

    #[test]
    fn test_survey_offsets_are_plain_differences() {
        let base = fix(45.0, -111.0, 1500.0, 0.8);
        let at = fix(45.00001, -111.00001, 1502.5, 0.9);
        let survey = SurveyMetadata::relative_to(&at, &base);

        assert_eq!(survey.delta_latitude, 45.00001 - 45.0);
        assert_eq!(survey.delta_longitude, -111.00001 - -111.0);
        assert_eq!(survey.delta_altitude, 2.5);
        assert_eq!(survey.quality.accuracy, 0.9);
        assert!(survey.quality.is_precise);
        assert_eq!(survey.quality.coordinate_system, CoordinateSystem::Wgs84);
    }

    #[test]
    fn test_with_remote_uri_leaves_original_untouched() {
        let base = fix(45.0, -111.0, 0.0, 0.8);
        let photo = PhotoAsset::new(
            MediaRef::jpeg("/tmp/p1.jpg"),
            Utc::now(),
            SessionId("s".into()),
            1,
            base.clone(),
            &base,
        );
        let uploaded = photo.with_remote_uri("https://cdn.example/p1.jpg");

        assert!(photo.remote_uri.is_none());
        assert_eq!(uploaded.remote_uri.as_deref(), Some("https://cdn.example/p1.jpg"));
        assert_eq!(uploaded.index, photo.index);
        assert_eq!(uploaded.gps_data, photo.gps_data);
    }

    #[test]
    fn test_media_file_name() {
        assert_eq!(MediaRef::jpeg("/data/DSC_0001.jpg").file_name(), "DSC_0001.jpg");
        assert_eq!(MediaRef::mp4("/").file_name(), "asset");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_survey_offsets_are_exact_differences(
                base_lat in -89.0f64..89.0,
                base_lon in -179.0f64..179.0,
                base_alt in -100.0f64..5000.0,
                lat in -89.0f64..89.0,
                lon in -179.0f64..179.0,
                alt in -100.0f64..5000.0,
                accuracy in 0.01f64..50.0,
            ) {
                let base = fix(base_lat, base_lon, base_alt, 0.5);
                let at = fix(lat, lon, alt, accuracy);

                let survey = SurveyMetadata::relative_to(&at, &base);
                prop_assert_eq!(survey.delta_latitude, lat - base_lat);
                prop_assert_eq!(survey.delta_longitude, lon - base_lon);
                prop_assert_eq!(survey.delta_altitude, alt - base_alt);
                prop_assert_eq!(survey.quality.accuracy, accuracy);
                prop_assert_eq!(survey.quality.is_precise, accuracy < 1.0);

                let origin = SurveyMetadata::relative_to(&base, &base);
                prop_assert_eq!(origin.delta_latitude, 0.0);
                prop_assert_eq!(origin.delta_longitude, 0.0);
                prop_assert_eq!(origin.delta_altitude, 0.0);
            }
        }
    }
}
