//! Continuous position feed.
//!
//! The feed is the single writer of the "current fix". Consumers hold a
//! [`FixSource`] and always read a complete, immutable fix.

use geocapture_core::error::{GeocaptureError, Result};
use geocapture_core::models::{AccuracyClass, GeoFix};
use geocapture_core::ports::{LocationOptions, LocationProvider, PositionStream};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Callback invoked for every classified fix
pub type FixHandler = Arc<dyn Fn(&GeoFix) + Send + Sync>;

/// Read handle on the latest fix
#[derive(Debug, Clone)]
pub struct FixSource {
    receiver: watch::Receiver<Option<GeoFix>>,
}

impl FixSource {
    /// Snapshot of the latest fix, if any has arrived
    pub fn current(&self) -> Option<GeoFix> {
        self.receiver.borrow().clone()
    }

    pub fn accuracy_class(&self) -> AccuracyClass {
        AccuracyClass::of(self.receiver.borrow().as_ref())
    }

    /// Wait until a fix newer than the last one observed through this handle
    /// is published. Returns `None` once the feed has been dropped.
    pub async fn next_fix(&mut self) -> Option<GeoFix> {
        self.receiver.changed().await.ok()?;
        self.receiver.borrow_and_update().clone()
    }
}

struct Subscription {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct LocationFeed {
    provider: Arc<dyn LocationProvider>,
    precision_threshold: f64,
    current: Arc<watch::Sender<Option<GeoFix>>>,
    subscription: Option<Subscription>,
}

impl LocationFeed {
    pub fn new(provider: Arc<dyn LocationProvider>, precision_threshold: f64) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            provider,
            precision_threshold,
            current: Arc::new(sender),
            subscription: None,
        }
    }

    /// Subscribe to the provider and start publishing fixes.
    ///
    /// Calling `start` on a running feed does nothing. Provider failures are
    /// returned as-is and never retried here.
    pub async fn start(&mut self, options: LocationOptions, handler: Option<FixHandler>) -> Result<()> {
        if self.subscription.is_some() {
            tracing::debug!("Location feed already running");
            return Ok(());
        }

        let stream = self.provider.subscribe(&options).await.map_err(|err| match err {
            GeocaptureError::PermissionDenied { .. } | GeocaptureError::LocationUnavailable { .. } => err,
            other => GeocaptureError::LocationUnavailable {
                reason: other.to_string(),
            },
        })?;

        tracing::info!(
            min_interval_ms = options.min_interval_ms,
            min_distance_m = options.min_distance_m,
            high_accuracy = options.high_accuracy,
            "Location tracking started"
        );

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_listener(
            stream,
            Arc::clone(&self.current),
            self.precision_threshold,
            handler,
            cancel.clone(),
        ));

        self.subscription = Some(Subscription { cancel, task });
        Ok(())
    }

    /// Cancel the subscription.
    ///
    /// Once this returns the handler will not be called again. The last
    /// published fix stays readable.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(subscription) = self.subscription.take() else {
            return Ok(());
        };

        subscription.cancel.cancel();
        if let Err(e) = subscription.task.await {
            tracing::warn!("Location listener ended abnormally: {}", e);
        }
        self.provider.unsubscribe().await?;

        tracing::info!("Location tracking stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn current_fix(&self) -> Option<GeoFix> {
        self.current.borrow().clone()
    }

    pub fn accuracy_class(&self) -> AccuracyClass {
        AccuracyClass::of(self.current.borrow().as_ref())
    }

    pub fn fix_source(&self) -> FixSource {
        FixSource {
            receiver: self.current.subscribe(),
        }
    }

    pub fn precision_threshold(&self) -> f64 {
        self.precision_threshold
    }
}

impl Drop for LocationFeed {
    fn drop(&mut self) {
        if let Some(subscription) = &self.subscription {
            subscription.cancel.cancel();
        }
    }
}

async fn run_listener(
    mut stream: PositionStream,
    current: Arc<watch::Sender<Option<GeoFix>>>,
    precision_threshold: f64,
    handler: Option<FixHandler>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sample = stream.recv() => {
                let Some(sample) = sample else {
                    tracing::debug!("Position stream closed by provider");
                    break;
                };

                let fix = GeoFix::from_sample(&sample, precision_threshold);
                tracing::trace!(
                    latitude = fix.latitude,
                    longitude = fix.longitude,
                    accuracy = fix.accuracy,
                    precise = fix.is_precise,
                    "Fix received"
                );

                current.send_replace(Some(fix.clone()));
                if let Some(handler) = &handler {
                    handler(&fix);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ScriptedLocationProvider;
    use chrono::Utc;
    use geocapture_core::models::PositionSample;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample(lat: f64, accuracy: f64) -> PositionSample {
        PositionSample::new(lat, -111.0, accuracy, Utc::now())
    }

    #[tokio::test]
    async fn test_fixes_are_classified_and_published() {
        let provider = ScriptedLocationProvider::new();
        let mut feed = LocationFeed::new(Arc::new(provider.clone()), 1.0);
        let mut source = feed.fix_source();

        assert!(feed.current_fix().is_none());
        assert_eq!(feed.accuracy_class(), AccuracyClass::Unavailable);

        feed.start(LocationOptions::default(), None).await.unwrap();
        assert!(provider.push(sample(45.0, 0.8)));

        let fix = source.next_fix().await.unwrap();
        assert_eq!(fix.latitude, 45.0);
        assert!(fix.is_precise);
        assert_eq!(source.accuracy_class(), AccuracyClass::Precise);

        assert!(provider.push(sample(45.1, 2.5)));
        let fix = source.next_fix().await.unwrap();
        assert!(!fix.is_precise);
        assert_eq!(feed.current_fix().unwrap().latitude, 45.1);

        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_subscription_options_are_forwarded() {
        let provider = ScriptedLocationProvider::new();
        let mut feed = LocationFeed::new(Arc::new(provider.clone()), 1.0);
        let options = LocationOptions {
            min_interval_ms: 500,
            min_distance_m: 0.5,
            high_accuracy: true,
        };

        feed.start(options, None).await.unwrap();
        // A second start is a no-op
        feed.start(options, None).await.unwrap();

        assert_eq!(provider.subscribe_count(), 1);
        assert_eq!(provider.last_options(), Some(options));
        feed.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported_not_retried() {
        let provider = ScriptedLocationProvider::new();
        provider.fail_subscribe(GeocaptureError::PermissionDenied {
            capability: "location".to_string(),
        });
        let mut feed = LocationFeed::new(Arc::new(provider.clone()), 1.0);

        let err = feed.start(LocationOptions::default(), None).await.unwrap_err();
        assert!(matches!(err, GeocaptureError::PermissionDenied { .. }));
        assert!(!feed.is_running());
        assert_eq!(provider.subscribe_count(), 1);
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_silences_handler() {
        let provider = ScriptedLocationProvider::new();
        let mut feed = LocationFeed::new(Arc::new(provider.clone()), 1.0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler: FixHandler = Arc::new(move |_fix| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut source = feed.fix_source();

        feed.start(LocationOptions::default(), Some(handler)).await.unwrap();
        provider.push(sample(45.0, 0.5));
        source.next_fix().await.unwrap();

        feed.stop().await.unwrap();
        feed.stop().await.unwrap();
        assert_eq!(provider.unsubscribe_count(), 1);

        // Nothing is listening any more
        assert!(!provider.push(sample(46.0, 0.5)));
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(feed.current_fix().unwrap().latitude, 45.0);
    }
}
