//! GPS observations and their quality classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geodetic reference for every stored position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CoordinateSystem {
    #[default]
    #[serde(rename = "WGS84")]
    Wgs84,
}

impl std::fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinateSystem::Wgs84 => write!(f, "WGS84"),
        }
    }
}

/// Raw observation as delivered by a location provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            altitude: None,
            accuracy,
            heading: None,
            speed: None,
            timestamp,
        }
    }

    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }
}

/// A classified GPS fix.
///
/// Fixes are values: a feed replaces its current fix with a new one and
/// never edits one that has already been handed out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters above the ellipsoid, 0 when the provider reported none
    pub altitude: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub timestamp: DateTime<Utc>,
    /// Accuracy is strictly below the precision threshold
    pub is_precise: bool,
}

impl GeoFix {
    /// Classify a provider sample against a precision threshold (meters)
    pub fn from_sample(sample: &PositionSample, precision_threshold: f64) -> Self {
        Self {
            latitude: sample.latitude,
            longitude: sample.longitude,
            altitude: sample.altitude.unwrap_or(0.0),
            accuracy: sample.accuracy,
            heading: sample.heading,
            speed: sample.speed,
            timestamp: sample.timestamp,
            is_precise: sample.accuracy < precision_threshold,
        }
    }

    pub fn accuracy_class(&self) -> AccuracyClass {
        if self.is_precise {
            AccuracyClass::Precise
        } else {
            AccuracyClass::Standard
        }
    }
}

/// Display classification of the fix quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyClass {
    /// Below the precision threshold (RTK-grade)
    Precise,
    Standard,
    Unavailable,
}

impl AccuracyClass {
    pub fn of(fix: Option<&GeoFix>) -> Self {
        fix.map(GeoFix::accuracy_class).unwrap_or(AccuracyClass::Unavailable)
    }
}
