use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Port for wall-clock time and delays.
///
/// Timers in the capture controllers go through this trait so tests can run
/// them without real waiting.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Clock backed by the system time and the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
