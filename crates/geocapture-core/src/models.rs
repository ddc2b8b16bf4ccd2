pub mod asset;
pub mod fix;
pub mod job;
pub mod session;

pub use asset::{
    AssetKind, CapturedAsset, MediaRef, PhotoAsset, SurveyMetadata, SurveyQuality, VideoAsset,
};
pub use fix::{AccuracyClass, CoordinateSystem, GeoFix, PositionSample};
pub use job::{
    JobId, JobResults, JobStatus, JobStatusReport, JobSubmission, NetworkInfo, OutputFormat,
    PipelineResult, ProcessingType, UploadFailure, UploadedAsset,
};
pub use session::{CaptureSession, SessionId, SessionMetadata, SessionSnapshot, SessionSummary};
