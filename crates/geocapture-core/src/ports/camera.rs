use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::MediaRef;

/// Still capture parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotoOptions {
    /// Encoder quality in 0.0..=1.0
    pub quality: f32,

    /// Ask the camera to embed EXIF metadata
    pub exif: bool,
}

impl Default for PhotoOptions {
    fn default() -> Self {
        Self {
            quality: 1.0,
            exif: true,
        }
    }
}

/// Opaque token for an in-progress recording
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordingHandle(pub u64);

/// Port for the device camera
#[async_trait]
pub trait Camera: Send + Sync {
    /// Whether the camera can accept capture requests
    fn is_ready(&self) -> bool;

    /// Take a still photo
    async fn take_photo(&self, options: &PhotoOptions) -> Result<MediaRef>;

    /// Begin a video recording
    async fn start_recording(&self) -> Result<RecordingHandle>;

    /// Finalize a recording and return the clip
    async fn stop_recording(&self, handle: RecordingHandle) -> Result<MediaRef>;
}
