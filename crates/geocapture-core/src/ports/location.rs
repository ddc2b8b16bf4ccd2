use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;
use crate::models::PositionSample;

/// Receiving end of a position subscription, in provider order
pub type PositionStream = mpsc::Receiver<PositionSample>;

/// Subscription parameters passed to the provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationOptions {
    /// Minimum time between updates
    pub min_interval_ms: u64,

    /// Minimum movement between updates
    pub min_distance_m: f64,

    pub high_accuracy: bool,
}

impl Default for LocationOptions {
    fn default() -> Self {
        Self {
            min_interval_ms: 1000,
            min_distance_m: 0.1,
            high_accuracy: true,
        }
    }
}

/// Port for a continuous position source
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Begin delivering samples.
    ///
    /// Fails with `PermissionDenied` or `LocationUnavailable` when the
    /// provider cannot be started.
    async fn subscribe(&self, options: &LocationOptions) -> Result<PositionStream>;

    /// Stop delivering samples
    async fn unsubscribe(&self) -> Result<()>;
}
