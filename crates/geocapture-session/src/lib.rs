//! GeoCapture Session - Capture session engine and capture controllers
//!
//! This crate fuses the location feed with photo and video capture into a
//! georeferenced, relative-to-base asset ledger.

pub mod capture;
pub mod engine;
pub mod location;
pub mod memory;
pub mod video;

// Re-export main types
pub use capture::{AssetCaptureController, BurstFailure, BurstFailurePolicy, BurstPolicy, BurstReport};
pub use engine::{CaptureSessionEngine, SharedEngine};
pub use location::{FixHandler, FixSource, LocationFeed};
pub use memory::{ScriptedCamera, ScriptedLocationProvider};
pub use video::VideoRecordingController;
