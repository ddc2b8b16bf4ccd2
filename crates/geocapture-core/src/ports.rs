//! Port trait definitions
//!
//! These traits define the capability providers the capture core consumes.
//! Adapters for real hardware live outside this workspace; scripted
//! implementations are provided by `geocapture-session`.

pub mod camera;
pub mod clock;
pub mod location;

pub use camera::{Camera, PhotoOptions, RecordingHandle};
pub use clock::{Clock, TokioClock};
pub use location::{LocationOptions, LocationProvider, PositionStream};
