//! GeoCapture Core - Domain models, configuration, and capability ports
//!
//! This crate contains the georeferenced capture data model and the port
//! definitions through which the location provider, camera and clock are
//! consumed.

pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use error::{GeocaptureError, Result};
