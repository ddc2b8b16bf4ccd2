use crate::error::{GeocaptureError, Result};
use crate::ports::LocationOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MAX_PHOTOS: usize = 1000;
pub const DEFAULT_MAX_VIDEO_DURATION_SECS: u64 = 600;
pub const DEFAULT_MIN_PHOTOS_FOR_PROCESSING: usize = 8;
pub const DEFAULT_BURST_SIZE: usize = 20;
pub const DEFAULT_BURST_INTERVAL_MS: u64 = 300;
pub const DEFAULT_GPS_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_GPS_DISTANCE_M: f64 = 0.1;
pub const DEFAULT_PRECISION_THRESHOLD_M: f64 = 1.0;
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Resource limits enforced by the capture engine and controllers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureLimits {
    pub max_photos: usize,
    pub max_video_duration: Duration,
    pub min_photos_for_processing: usize,
    pub burst_size: usize,
    pub burst_interval: Duration,
    /// Accuracy (meters) below which a fix counts as precise
    pub precision_threshold: f64,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_photos: DEFAULT_MAX_PHOTOS,
            max_video_duration: Duration::from_secs(DEFAULT_MAX_VIDEO_DURATION_SECS),
            min_photos_for_processing: DEFAULT_MIN_PHOTOS_FOR_PROCESSING,
            burst_size: DEFAULT_BURST_SIZE,
            burst_interval: Duration::from_millis(DEFAULT_BURST_INTERVAL_MS),
            precision_threshold: DEFAULT_PRECISION_THRESHOLD_M,
        }
    }
}

/// Connection settings for the processing service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub base_url: String,
    pub request_timeout: Duration,
    pub node_id: Option<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            node_id: None,
        }
    }
}

/// Layered configuration for GeoCapture
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub max_photos: ConfigValue<usize>,
    pub max_video_duration_secs: ConfigValue<u64>,
    pub min_photos_for_processing: ConfigValue<usize>,
    pub burst_size: ConfigValue<usize>,
    pub burst_interval_ms: ConfigValue<u64>,
    pub gps_interval_ms: ConfigValue<u64>,
    pub gps_distance_m: ConfigValue<f64>,
    pub precision_threshold_m: ConfigValue<f64>,
    pub api_base_url: ConfigValue<String>,
    pub request_timeout_secs: ConfigValue<u64>,
    pub node_id: ConfigValue<Option<String>>,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        use ConfigSource::Default as D;
        Self {
            max_photos: ConfigValue::new(DEFAULT_MAX_PHOTOS, D),
            max_video_duration_secs: ConfigValue::new(DEFAULT_MAX_VIDEO_DURATION_SECS, D),
            min_photos_for_processing: ConfigValue::new(DEFAULT_MIN_PHOTOS_FOR_PROCESSING, D),
            burst_size: ConfigValue::new(DEFAULT_BURST_SIZE, D),
            burst_interval_ms: ConfigValue::new(DEFAULT_BURST_INTERVAL_MS, D),
            gps_interval_ms: ConfigValue::new(DEFAULT_GPS_INTERVAL_MS, D),
            gps_distance_m: ConfigValue::new(DEFAULT_GPS_DISTANCE_M, D),
            precision_threshold_m: ConfigValue::new(DEFAULT_PRECISION_THRESHOLD_M, D),
            api_base_url: ConfigValue::new(DEFAULT_API_BASE_URL.to_string(), D),
            request_timeout_secs: ConfigValue::new(DEFAULT_REQUEST_TIMEOUT_SECS, D),
            node_id: ConfigValue::new(None, D),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| GeocaptureError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to read config file: {}", e),
            })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| GeocaptureError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        let source = ConfigSource::File;
        if let Some(v) = file_config.max_photos {
            self.max_photos.update(v, source);
        }
        if let Some(v) = file_config.max_video_duration_secs {
            self.max_video_duration_secs.update(v, source);
        }
        if let Some(v) = file_config.min_photos_for_processing {
            self.min_photos_for_processing.update(v, source);
        }
        if let Some(v) = file_config.burst_size {
            self.burst_size.update(v, source);
        }
        if let Some(v) = file_config.burst_interval_ms {
            self.burst_interval_ms.update(v, source);
        }
        if let Some(v) = file_config.gps_interval_ms {
            self.gps_interval_ms.update(v, source);
        }
        if let Some(v) = file_config.gps_distance_m {
            self.gps_distance_m.update(v, source);
        }
        if let Some(v) = file_config.precision_threshold_m {
            self.precision_threshold_m.update(v, source);
        }
        if let Some(v) = file_config.api_base_url {
            self.api_base_url.update(v, source);
        }
        if let Some(v) = file_config.request_timeout_secs {
            self.request_timeout_secs.update(v, source);
        }
        if let Some(v) = file_config.node_id {
            self.node_id.update(Some(v), source);
        }

        Ok(self)
    }

    /// Load configuration from `GEOCAPTURE_*` environment variables
    pub fn load_from_env(mut self) -> Self {
        let source = ConfigSource::Environment;
        if let Some(v) = env_value("GEOCAPTURE_MAX_PHOTOS") {
            self.max_photos.update(v, source);
        }
        if let Some(v) = env_value("GEOCAPTURE_MAX_VIDEO_DURATION_SECS") {
            self.max_video_duration_secs.update(v, source);
        }
        if let Some(v) = env_value("GEOCAPTURE_MIN_PHOTOS_FOR_PROCESSING") {
            self.min_photos_for_processing.update(v, source);
        }
        if let Some(v) = env_value("GEOCAPTURE_BURST_SIZE") {
            self.burst_size.update(v, source);
        }
        if let Some(v) = env_value("GEOCAPTURE_BURST_INTERVAL_MS") {
            self.burst_interval_ms.update(v, source);
        }
        if let Some(v) = env_value("GEOCAPTURE_GPS_INTERVAL_MS") {
            self.gps_interval_ms.update(v, source);
        }
        if let Some(v) = env_value("GEOCAPTURE_GPS_DISTANCE_M") {
            self.gps_distance_m.update(v, source);
        }
        if let Some(v) = env_value("GEOCAPTURE_PRECISION_THRESHOLD_M") {
            self.precision_threshold_m.update(v, source);
        }
        if let Ok(url) = env::var("GEOCAPTURE_API_URL") {
            self.api_base_url.update(url, source);
        }
        if let Some(v) = env_value("GEOCAPTURE_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs.update(v, source);
        }
        if let Ok(node_id) = env::var("GEOCAPTURE_NODE_ID") {
            self.node_id.update(Some(node_id), source);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        let source = ConfigSource::Cli;
        if let Some(v) = overrides.max_photos {
            self.max_photos.update(v, source);
        }
        if let Some(v) = overrides.burst_size {
            self.burst_size.update(v, source);
        }
        if let Some(v) = overrides.precision_threshold_m {
            self.precision_threshold_m.update(v, source);
        }
        if let Some(v) = overrides.api_base_url {
            self.api_base_url.update(v, source);
        }
        if let Some(v) = overrides.node_id {
            self.node_id.update(Some(v), source);
        }
    }

    /// Reject values the capture core cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.max_photos.value == 0 {
            return Err(invalid("max_photos", "must be at least 1"));
        }
        if self.max_video_duration_secs.value == 0 {
            return Err(invalid("max_video_duration_secs", "must be at least 1 second"));
        }
        if self.burst_size.value == 0 {
            return Err(invalid("burst_size", "must be at least 1"));
        }
        let threshold = self.precision_threshold_m.value;
        if threshold.is_nan() || threshold <= 0.0 {
            return Err(invalid("precision_threshold_m", "must be a positive number of meters"));
        }
        let distance = self.gps_distance_m.value;
        if distance.is_nan() || distance < 0.0 {
            return Err(invalid("gps_distance_m", "must not be negative"));
        }
        if !self.api_base_url.value.starts_with("http://")
            && !self.api_base_url.value.starts_with("https://")
        {
            return Err(invalid("api_base_url", "must be an http(s) URL"));
        }
        Ok(())
    }

    pub fn capture_limits(&self) -> CaptureLimits {
        CaptureLimits {
            max_photos: self.max_photos.value,
            max_video_duration: Duration::from_secs(self.max_video_duration_secs.value),
            min_photos_for_processing: self.min_photos_for_processing.value,
            burst_size: self.burst_size.value,
            burst_interval: Duration::from_millis(self.burst_interval_ms.value),
            precision_threshold: self.precision_threshold_m.value,
        }
    }

    pub fn location_options(&self) -> LocationOptions {
        LocationOptions {
            min_interval_ms: self.gps_interval_ms.value,
            min_distance_m: self.gps_distance_m.value,
            high_accuracy: true,
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            base_url: self.api_base_url.value.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(self.request_timeout_secs.value),
            node_id: self.node_id.value.clone(),
        }
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        fn entry<T: ToString>(
            map: &mut HashMap<String, (String, ConfigSource)>,
            key: &str,
            value: &ConfigValue<T>,
        ) {
            map.insert(key.to_string(), (value.value.to_string(), value.source));
        }

        entry(&mut map, "max_photos", &self.max_photos);
        entry(&mut map, "max_video_duration_secs", &self.max_video_duration_secs);
        entry(&mut map, "min_photos_for_processing", &self.min_photos_for_processing);
        entry(&mut map, "burst_size", &self.burst_size);
        entry(&mut map, "burst_interval_ms", &self.burst_interval_ms);
        entry(&mut map, "gps_interval_ms", &self.gps_interval_ms);
        entry(&mut map, "gps_distance_m", &self.gps_distance_m);
        entry(&mut map, "precision_threshold_m", &self.precision_threshold_m);
        entry(&mut map, "api_base_url", &self.api_base_url);
        entry(&mut map, "request_timeout_secs", &self.request_timeout_secs);
        map.insert(
            "node_id".to_string(),
            (
                self.node_id.value.clone().unwrap_or_else(|| "(none)".to_string()),
                self.node_id.source,
            ),
        );

        map
    }
}

fn invalid(key: &str, reason: &str) -> GeocaptureError {
    GeocaptureError::ConfigInvalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse an environment variable, warning and ignoring it when malformed
fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': ignoring", key, raw);
            None
        }
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    max_photos: Option<usize>,
    max_video_duration_secs: Option<u64>,
    min_photos_for_processing: Option<usize>,
    burst_size: Option<usize>,
    burst_interval_ms: Option<u64>,
    gps_interval_ms: Option<u64>,
    gps_distance_m: Option<f64>,
    precision_threshold_m: Option<f64>,
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    node_id: Option<String>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub max_photos: Option<usize>,
    pub burst_size: Option<usize>,
    pub precision_threshold_m: Option<f64>,
    pub api_base_url: Option<String>,
    pub node_id: Option<String>,
}
