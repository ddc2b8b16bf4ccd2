//! Still photo capture: single shots and bursts.

use geocapture_core::config::CaptureLimits;
use geocapture_core::error::{GeocaptureError, Result};
use geocapture_core::models::PhotoAsset;
use geocapture_core::ports::{Camera, Clock, PhotoOptions};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::SharedEngine;
use crate::location::FixSource;

/// What a burst does when one of its shots fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BurstFailurePolicy {
    /// Record the failure and keep shooting
    #[default]
    Continue,
    /// Stop the burst at the first failed shot
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstPolicy {
    pub size: usize,
    /// Delay between consecutive shots
    pub interval: Duration,
    pub on_failure: BurstFailurePolicy,
}

impl BurstPolicy {
    pub fn from_limits(limits: &CaptureLimits) -> Self {
        Self {
            size: limits.burst_size,
            interval: limits.burst_interval,
            on_failure: BurstFailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, on_failure: BurstFailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BurstFailure {
    /// 1-based position of the shot within the burst
    pub shot: usize,
    pub reason: String,
}

/// Outcome of a burst
#[derive(Debug, Clone, Serialize)]
pub struct BurstReport {
    pub requested: usize,
    pub assets: Vec<PhotoAsset>,
    pub failures: Vec<BurstFailure>,
}

impl BurstReport {
    pub fn captured(&self) -> usize {
        self.assets.len()
    }

    pub fn is_complete(&self) -> bool {
        self.assets.len() == self.requested
    }
}

/// Clears the in-flight flag when the capture ends, however it ends
struct CaptureGuard<'a>(&'a AtomicBool);

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AssetCaptureController {
    camera: Arc<dyn Camera>,
    engine: SharedEngine,
    fixes: FixSource,
    clock: Arc<dyn Clock>,
    photo_options: PhotoOptions,
    burst: BurstPolicy,
    is_capturing: AtomicBool,
}

impl AssetCaptureController {
    pub fn new(
        camera: Arc<dyn Camera>,
        engine: SharedEngine,
        fixes: FixSource,
        clock: Arc<dyn Clock>,
        burst: BurstPolicy,
    ) -> Self {
        Self {
            camera,
            engine,
            fixes,
            clock,
            photo_options: PhotoOptions::default(),
            burst,
            is_capturing: AtomicBool::new(false),
        }
    }

    pub fn with_photo_options(mut self, options: PhotoOptions) -> Self {
        self.photo_options = options;
        self
    }

    /// Whether a single shot or burst is in flight
    pub fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::Acquire)
    }

    pub fn burst_policy(&self) -> &BurstPolicy {
        &self.burst
    }

    /// Take one georeferenced photo.
    ///
    /// Fails without touching the ledger when the camera is not ready, no
    /// session is active, no fix is available, or another capture is running.
    pub async fn capture_photo(&self) -> Result<PhotoAsset> {
        let _guard = self.begin_capture()?;
        let photo = self.capture_once().await?;
        tracing::info!(index = photo.index, session_id = %photo.session_id, "Photo captured");
        Ok(photo)
    }

    /// Shoot up to the configured burst size, bounded by remaining capacity.
    ///
    /// Individual shot failures are collected in the report; whether they end
    /// the burst is decided by the burst failure policy.
    pub async fn burst_capture(&self) -> Result<BurstReport> {
        let _guard = self.begin_capture()?;

        if !self.camera.is_ready() {
            return Err(GeocaptureError::CameraNotReady);
        }

        let (remaining, max_photos) = {
            let engine = self.engine.lock().await;
            if !engine.is_active() {
                return Err(GeocaptureError::NoActiveSession);
            }
            (engine.remaining_photo_capacity(), engine.limits().max_photos)
        };

        let count = self.burst.size.min(remaining);
        if count == 0 {
            return Err(GeocaptureError::CapacityExceeded { max: max_photos });
        }

        tracing::info!(requested = count, remaining, "Burst capture started");

        let mut report = BurstReport {
            requested: count,
            assets: Vec::with_capacity(count),
            failures: Vec::new(),
        };

        for shot in 1..=count {
            if shot > 1 {
                self.clock.sleep(self.burst.interval).await;
            }

            match self.capture_once().await {
                Ok(photo) => report.assets.push(photo),
                Err(err) => {
                    tracing::warn!(shot, error = %err, "Burst shot failed");
                    report.failures.push(BurstFailure {
                        shot,
                        reason: err.to_string(),
                    });
                    if self.burst.on_failure == BurstFailurePolicy::Abort {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            requested = report.requested,
            captured = report.captured(),
            failed = report.failures.len(),
            "Burst capture finished"
        );
        Ok(report)
    }

    fn begin_capture(&self) -> Result<CaptureGuard<'_>> {
        self.is_capturing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| GeocaptureError::CaptureInProgress)?;
        Ok(CaptureGuard(&self.is_capturing))
    }

    async fn capture_once(&self) -> Result<PhotoAsset> {
        if !self.camera.is_ready() {
            return Err(GeocaptureError::CameraNotReady);
        }

        let session_id = {
            let engine = self.engine.lock().await;
            let session = engine.session().ok_or(GeocaptureError::NoActiveSession)?;
            if engine.remaining_photo_capacity() == 0 {
                return Err(GeocaptureError::CapacityExceeded {
                    max: engine.limits().max_photos,
                });
            }
            session.id.clone()
        };

        let fix_before = self.fixes.current().ok_or(GeocaptureError::NoFixAvailable)?;

        let media = self
            .camera
            .take_photo(&self.photo_options)
            .await
            .map_err(|err| match err {
                GeocaptureError::CaptureFailure { .. } => err,
                other => GeocaptureError::CaptureFailure {
                    reason: other.to_string(),
                },
            })?;

        // Position at shutter release, not at the request
        let fix = self.fixes.current().unwrap_or(fix_before);
        let mut engine = self.engine.lock().await;
        engine.record_photo_in(&session_id, media, Some(&fix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::CaptureSessionEngine;
    use crate::location::LocationFeed;
    use crate::memory::{ScriptedCamera, ScriptedLocationProvider};
    use async_trait::async_trait;
    use chrono::Utc;
    use geocapture_core::models::{GeoFix, MediaRef, PositionSample};
    use geocapture_core::ports::{LocationOptions, RecordingHandle, TokioClock};

    struct Rig {
        camera: ScriptedCamera,
        provider: ScriptedLocationProvider,
        feed: LocationFeed,
        engine: SharedEngine,
        controller: AssetCaptureController,
    }

    async fn rig(max_photos: usize, burst_size: usize) -> Rig {
        let limits = CaptureLimits {
            max_photos,
            burst_size,
            ..CaptureLimits::default()
        };
        let camera = ScriptedCamera::new("/captures");
        let provider = ScriptedLocationProvider::new();
        let mut feed = LocationFeed::new(Arc::new(provider.clone()), limits.precision_threshold);
        feed.start(LocationOptions::default(), None).await.unwrap();

        let clock = Arc::new(TokioClock);
        let engine = CaptureSessionEngine::new(limits, clock.clone()).into_shared();
        let controller = AssetCaptureController::new(
            Arc::new(camera.clone()),
            engine.clone(),
            feed.fix_source(),
            clock,
            BurstPolicy::from_limits(&limits),
        );

        Rig {
            camera,
            provider,
            feed,
            engine,
            controller,
        }
    }

    async fn publish_fix(rig: &Rig, lat: f64, lon: f64, accuracy: f64) {
        let mut source = rig.feed.fix_source();
        assert!(rig.provider.push(PositionSample::new(lat, lon, accuracy, Utc::now())));
        source.next_fix().await.unwrap();
    }

    async fn start_session(rig: &Rig) {
        let fix = rig.feed.current_fix();
        rig.engine.lock().await.start_session(fix.as_ref()).unwrap();
    }

    #[tokio::test]
    async fn test_preconditions_are_reported() {
        let rig = rig(10, 5).await;

        rig.camera.set_ready(false);
        assert!(matches!(rig.controller.capture_photo().await, Err(GeocaptureError::CameraNotReady)));

        rig.camera.set_ready(true);
        assert!(matches!(rig.controller.capture_photo().await, Err(GeocaptureError::NoActiveSession)));

        publish_fix(&rig, 45.0, -111.0, 0.8).await;
        start_session(&rig).await;
        assert!(rig.controller.capture_photo().await.is_ok());
        assert_eq!(rig.camera.photos_taken(), 1);
        assert!(!rig.controller.is_capturing());
    }

    #[tokio::test]
    async fn test_session_without_published_fix_is_rejected() {
        let rig = rig(10, 5).await;
        let base = GeoFix::from_sample(&PositionSample::new(45.0, -111.0, 0.8, Utc::now()), 1.0);
        rig.engine.lock().await.start_session(Some(&base)).unwrap();

        assert!(matches!(rig.controller.capture_photo().await, Err(GeocaptureError::NoFixAvailable)));
        assert_eq!(rig.camera.photos_taken(), 0);
        assert_eq!(rig.engine.lock().await.photo_count(), 0);
        assert!(!rig.controller.is_capturing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_shot_rejected_while_burst_runs() {
        let rig = rig(100, 20).await;
        publish_fix(&rig, 45.0, -111.0, 0.8).await;
        start_session(&rig).await;

        let controller = Arc::new(rig.controller);
        let burst = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.burst_capture().await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(controller.is_capturing());
        assert!(matches!(controller.capture_photo().await, Err(GeocaptureError::CaptureInProgress)));
        assert!(matches!(controller.burst_capture().await, Err(GeocaptureError::CaptureInProgress)));

        let report = burst.await.unwrap().unwrap();
        assert_eq!(report.captured(), 20);
        assert!(!controller.is_capturing());
        assert!(controller.capture_photo().await.is_ok());
        assert_eq!(rig.engine.lock().await.photo_count(), 21);
    }

    /// Camera that moves the receiver while the shutter is open
    struct DriftingCamera {
        inner: ScriptedCamera,
        provider: ScriptedLocationProvider,
        fixes: FixSource,
    }

    #[async_trait]
    impl Camera for DriftingCamera {
        fn is_ready(&self) -> bool {
            self.inner.is_ready()
        }

        async fn take_photo(&self, options: &PhotoOptions) -> Result<MediaRef> {
            let mut fixes = self.fixes.clone();
            self.provider.push(PositionSample::new(45.00002, -111.00003, 0.7, Utc::now()));
            fixes.next_fix().await;
            self.inner.take_photo(options).await
        }

        async fn start_recording(&self) -> Result<RecordingHandle> {
            self.inner.start_recording().await
        }

        async fn stop_recording(&self, handle: RecordingHandle) -> Result<MediaRef> {
            self.inner.stop_recording(handle).await
        }
    }

    #[tokio::test]
    async fn test_photo_records_fix_at_shutter_release() {
        let rig = rig(10, 5).await;
        publish_fix(&rig, 45.0, -111.0, 0.8).await;
        start_session(&rig).await;

        let camera = DriftingCamera {
            inner: rig.camera.clone(),
            provider: rig.provider.clone(),
            fixes: rig.feed.fix_source(),
        };
        let controller = AssetCaptureController::new(
            Arc::new(camera),
            rig.engine.clone(),
            rig.feed.fix_source(),
            Arc::new(TokioClock),
            BurstPolicy::from_limits(rig.engine.lock().await.limits()),
        );

        let photo = controller.capture_photo().await.unwrap();
        assert_eq!(photo.gps_data.latitude, 45.00002);
        assert_eq!(photo.gps_data.longitude, -111.00003);
        assert!((photo.survey_metadata.delta_latitude - 0.00002).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_photo_uses_latest_fix() {
        let rig = rig(10, 5).await;
        publish_fix(&rig, 45.0, -111.0, 0.8).await;
        start_session(&rig).await;
        publish_fix(&rig, 45.00001, -111.00001, 0.9).await;

        let photo = rig.controller.capture_photo().await.unwrap();
        assert_eq!(photo.index, 1);
        assert_eq!(photo.gps_data.latitude, 45.00001);
        assert!((photo.survey_metadata.delta_latitude - 0.00001).abs() < 1e-9);
        assert!((photo.survey_metadata.delta_longitude + 0.00001).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_camera_failure_leaves_ledger_untouched() {
        let rig = rig(10, 5).await;
        publish_fix(&rig, 45.0, -111.0, 0.8).await;
        start_session(&rig).await;
        rig.camera.fail_shots([1]);

        assert!(matches!(
            rig.controller.capture_photo().await,
            Err(GeocaptureError::CaptureFailure { .. })
        ));
        let engine = rig.engine.lock().await;
        assert_eq!(engine.photo_count(), 0);
        assert_eq!(engine.session().unwrap().total_assets, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_bounded_by_remaining_capacity() {
        let rig = rig(5, 20).await;
        publish_fix(&rig, 45.0, -111.0, 0.8).await;
        start_session(&rig).await;
        rig.controller.capture_photo().await.unwrap();
        rig.controller.capture_photo().await.unwrap();

        let report = rig.controller.burst_capture().await.unwrap();
        assert_eq!(report.requested, 3);
        assert_eq!(report.captured(), 3);
        assert!(report.is_complete());

        let indices: Vec<usize> = rig.engine.lock().await.photos().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);

        assert!(matches!(
            rig.controller.burst_capture().await,
            Err(GeocaptureError::CapacityExceeded { max: 5 })
        ));
        assert_eq!(rig.camera.photos_taken(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_continues_past_failures() {
        let rig = rig(100, 6).await;
        publish_fix(&rig, 45.0, -111.0, 0.8).await;
        start_session(&rig).await;
        rig.camera.fail_shots([2, 5]);

        let report = rig.controller.burst_capture().await.unwrap();
        assert_eq!(report.requested, 6);
        assert_eq!(report.captured(), 4);
        let failed: Vec<usize> = report.failures.iter().map(|f| f.shot).collect();
        assert_eq!(failed, vec![2, 5]);

        let engine = rig.engine.lock().await;
        assert_eq!(engine.session().unwrap().total_assets, 4);
        let indices: Vec<usize> = engine.photos().iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_abort_policy_stops_at_first_failure() {
        let limits = CaptureLimits {
            burst_size: 6,
            ..CaptureLimits::default()
        };
        let rig = rig(100, 6).await;
        let controller = AssetCaptureController::new(
            Arc::new(rig.camera.clone()),
            rig.engine.clone(),
            rig.feed.fix_source(),
            Arc::new(TokioClock),
            BurstPolicy::from_limits(&limits).with_failure_policy(BurstFailurePolicy::Abort),
        );
        publish_fix(&rig, 45.0, -111.0, 0.8).await;
        start_session(&rig).await;
        rig.camera.fail_shots([3]);

        let report = controller.burst_capture().await.unwrap();
        assert_eq!(report.captured(), 2);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_complete());
        assert_eq!(rig.camera.photos_taken(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_waits_between_shots() {
        let rig = rig(100, 4).await;
        publish_fix(&rig, 45.0, -111.0, 0.8).await;
        start_session(&rig).await;

        let started = tokio::time::Instant::now();
        rig.controller.burst_capture().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(900));
    }

    #[tokio::test]
    async fn test_burst_requires_session() {
        let rig = rig(100, 4).await;
        assert!(matches!(
            rig.controller.burst_capture().await,
            Err(GeocaptureError::NoActiveSession)
        ));
        assert_eq!(rig.camera.photos_taken(), 0);
    }
}
