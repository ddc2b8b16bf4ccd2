//! Duration-limited video recording.

use geocapture_core::error::{GeocaptureError, Result};
use geocapture_core::models::{GeoFix, SessionId, VideoAsset};
use geocapture_core::ports::{Camera, Clock, RecordingHandle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::engine::SharedEngine;
use crate::location::FixSource;

const TICK: Duration = Duration::from_secs(1);

struct ActiveRecording {
    id: u64,
    handle: RecordingHandle,
    session_id: SessionId,
    start_fix: GeoFix,
    elapsed_secs: Arc<AtomicU64>,
    cancel: CancellationToken,
}

struct Recorder {
    camera: Arc<dyn Camera>,
    engine: SharedEngine,
    fixes: FixSource,
    clock: Arc<dyn Clock>,
    max_duration: Duration,
    active: Mutex<Option<ActiveRecording>>,
    next_id: AtomicU64,
}

pub struct VideoRecordingController {
    recorder: Arc<Recorder>,
}

impl VideoRecordingController {
    pub fn new(
        camera: Arc<dyn Camera>,
        engine: SharedEngine,
        fixes: FixSource,
        clock: Arc<dyn Clock>,
        max_duration: Duration,
    ) -> Self {
        Self {
            recorder: Arc::new(Recorder {
                camera,
                engine,
                fixes,
                clock,
                max_duration,
                active: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Start recording and arm the duration ceiling.
    ///
    /// The recording stops on its own once `max_duration` has elapsed.
    pub async fn start_recording(&self) -> Result<()> {
        let recorder = &self.recorder;
        if !recorder.camera.is_ready() {
            return Err(GeocaptureError::CameraNotReady);
        }

        let mut active = recorder.active.lock().await;
        if active.is_some() {
            return Err(GeocaptureError::RecordingInProgress);
        }

        let session_id = recorder
            .engine
            .lock()
            .await
            .session()
            .map(|s| s.id.clone())
            .ok_or(GeocaptureError::NoActiveSession)?;
        let start_fix = recorder.fixes.current().ok_or(GeocaptureError::NoFixAvailable)?;

        let handle = recorder.camera.start_recording().await.map_err(as_capture_failure)?;

        let id = recorder.next_id.fetch_add(1, Ordering::Relaxed);
        let elapsed_secs = Arc::new(AtomicU64::new(0));
        let cancel = CancellationToken::new();

        *active = Some(ActiveRecording {
            id,
            handle,
            session_id: session_id.clone(),
            start_fix,
            elapsed_secs: Arc::clone(&elapsed_secs),
            cancel: cancel.clone(),
        });
        drop(active);

        tokio::spawn(run_ticker(Arc::clone(recorder), id, elapsed_secs, cancel));

        tracing::info!(
            session_id = %session_id,
            max_duration_secs = recorder.max_duration.as_secs(),
            "Recording started"
        );
        Ok(())
    }

    /// Stop the current recording and store the clip.
    ///
    /// Returns `Ok(None)` when nothing is being recorded.
    pub async fn stop_recording(&self) -> Result<Option<VideoAsset>> {
        self.recorder.finish(None).await
    }

    pub async fn is_recording(&self) -> bool {
        self.recorder.active.lock().await.is_some()
    }

    /// Elapsed time of the current recording, in whole seconds
    pub async fn elapsed(&self) -> Option<Duration> {
        self.recorder
            .active
            .lock()
            .await
            .as_ref()
            .map(|r| Duration::from_secs(r.elapsed_secs.load(Ordering::Acquire)))
    }

    pub fn max_duration(&self) -> Duration {
        self.recorder.max_duration
    }
}

impl Drop for VideoRecordingController {
    fn drop(&mut self) {
        if let Ok(active) = self.recorder.active.try_lock() {
            if let Some(recording) = active.as_ref() {
                recording.cancel.cancel();
            }
        }
    }
}

impl Recorder {
    fn ceiling_secs(&self) -> u64 {
        self.max_duration.as_secs().max(1)
    }

    /// Finalize the active recording, or only recording `only` when given
    async fn finish(&self, only: Option<u64>) -> Result<Option<VideoAsset>> {
        let recording = {
            let mut active = self.active.lock().await;
            match active.as_ref() {
                Some(r) if only.map_or(true, |id| id == r.id) => active.take(),
                _ => None,
            }
        };
        let Some(recording) = recording else {
            return Ok(None);
        };

        recording.cancel.cancel();
        let media = self
            .camera
            .stop_recording(recording.handle)
            .await
            .map_err(as_capture_failure)?;

        let elapsed = recording.elapsed_secs.load(Ordering::Acquire);
        let duration = elapsed.min(self.ceiling_secs()) as f64;

        let mut engine = self.engine.lock().await;
        let video = engine.record_video_in(
            &recording.session_id,
            media,
            Some(&recording.start_fix),
            duration,
        )?;

        tracing::info!(session_id = %video.session_id, duration = video.duration, "Recording stopped");
        Ok(Some(video))
    }
}

async fn run_ticker(
    recorder: Arc<Recorder>,
    id: u64,
    elapsed_secs: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    let ceiling = recorder.ceiling_secs();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = recorder.clock.sleep(TICK) => {}
        }

        let elapsed = elapsed_secs.fetch_add(1, Ordering::AcqRel) + 1;
        if elapsed >= ceiling {
            tracing::info!(elapsed_secs = elapsed, "Maximum recording duration reached");
            if let Err(e) = recorder.finish(Some(id)).await {
                tracing::warn!("Automatic recording stop failed: {}", e);
            }
            return;
        }
    }
}

fn as_capture_failure(err: GeocaptureError) -> GeocaptureError {
    match err {
        GeocaptureError::CaptureFailure { .. } => err,
        other => GeocaptureError::CaptureFailure {
            reason: other.to_string(),
        },
    }
}
