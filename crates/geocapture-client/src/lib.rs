//! GeoCapture Client - Processing submission protocol
//!
//! Uploads captured assets to the reconstruction service, submits jobs
//! covering both splatting pipelines, and reads back status and results.

pub mod client;
pub mod dto;

// Re-export main types
pub use client::{PollPolicy, ProcessingClient};
pub use dto::ServiceStatus;
