//! Scripted capability providers for development, replay and testing.
//!
//! These implementations use `Mutex::lock().unwrap()` intentionally. Lock
//! poisoning only occurs when another thread panicked while holding the lock,
//! which is an unrecoverable state. Real devices provide their own adapters.

use async_trait::async_trait;
use geocapture_core::error::{GeocaptureError, Result};
use geocapture_core::models::{MediaRef, PositionSample};
use geocapture_core::ports::{
    Camera, LocationOptions, LocationProvider, PhotoOptions, PositionStream, RecordingHandle,
};
use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

const POSITION_BUFFER: usize = 256;

#[derive(Default)]
struct ProviderState {
    sender: Option<mpsc::Sender<PositionSample>>,
    pending_failure: Option<GeocaptureError>,
    last_options: Option<LocationOptions>,
    subscribe_count: usize,
    unsubscribe_count: usize,
}

/// Location provider driven by explicit [`push`](Self::push) calls
#[derive(Clone, Default)]
pub struct ScriptedLocationProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl ScriptedLocationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a sample to the current subscriber.
    ///
    /// Returns `false` when nobody is subscribed or the subscriber is gone.
    pub fn push(&self, sample: PositionSample) -> bool {
        let state = self.state.lock().unwrap();
        match &state.sender {
            Some(sender) => sender.try_send(sample).is_ok(),
            None => false,
        }
    }

    /// Make the next `subscribe` call fail with `error`
    pub fn fail_subscribe(&self, error: GeocaptureError) {
        self.state.lock().unwrap().pending_failure = Some(error);
    }

    pub fn is_subscribed(&self) -> bool {
        self.state.lock().unwrap().sender.is_some()
    }

    pub fn subscribe_count(&self) -> usize {
        self.state.lock().unwrap().subscribe_count
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.state.lock().unwrap().unsubscribe_count
    }

    pub fn last_options(&self) -> Option<LocationOptions> {
        self.state.lock().unwrap().last_options
    }
}

#[async_trait]
impl LocationProvider for ScriptedLocationProvider {
    async fn subscribe(&self, options: &LocationOptions) -> Result<PositionStream> {
        let mut state = self.state.lock().unwrap();
        state.subscribe_count += 1;
        state.last_options = Some(*options);

        if let Some(error) = state.pending_failure.take() {
            return Err(error);
        }

        let (sender, receiver) = mpsc::channel(POSITION_BUFFER);
        state.sender = Some(sender);
        Ok(receiver)
    }

    async fn unsubscribe(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.unsubscribe_count += 1;
        state.sender = None;
        Ok(())
    }
}

struct CameraState {
    ready: bool,
    queued_photos: VecDeque<MediaRef>,
    failing_shots: HashSet<usize>,
    shots: usize,
    photos_taken: usize,
    next_handle: u64,
    recording: Option<RecordingHandle>,
    recordings_finished: usize,
}

/// Camera that hands out pre-queued or generated media references.
///
/// Nothing is written to disk; generated references point into `output_dir`.
#[derive(Clone)]
pub struct ScriptedCamera {
    output_dir: PathBuf,
    state: Arc<Mutex<CameraState>>,
}

impl ScriptedCamera {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            state: Arc::new(Mutex::new(CameraState {
                ready: true,
                queued_photos: VecDeque::new(),
                failing_shots: HashSet::new(),
                shots: 0,
                photos_taken: 0,
                next_handle: 1,
                recording: None,
                recordings_finished: 0,
            })),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    /// Serve these references, in order, before generating new ones
    pub fn queue_photos(&self, photos: impl IntoIterator<Item = MediaRef>) {
        self.state.lock().unwrap().queued_photos.extend(photos);
    }

    /// Fail the given shutter releases (1-based, counted across all calls)
    pub fn fail_shots(&self, shots: impl IntoIterator<Item = usize>) {
        self.state.lock().unwrap().failing_shots.extend(shots);
    }

    pub fn photos_taken(&self) -> usize {
        self.state.lock().unwrap().photos_taken
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().unwrap().recording.is_some()
    }

    pub fn recordings_finished(&self) -> usize {
        self.state.lock().unwrap().recordings_finished
    }
}

#[async_trait]
impl Camera for ScriptedCamera {
    fn is_ready(&self) -> bool {
        self.state.lock().unwrap().ready
    }

    async fn take_photo(&self, _options: &PhotoOptions) -> Result<MediaRef> {
        let mut state = self.state.lock().unwrap();
        state.shots += 1;
        let shot = state.shots;

        if state.failing_shots.remove(&shot) {
            return Err(GeocaptureError::CaptureFailure {
                reason: format!("sensor read failed on shot {}", shot),
            });
        }

        state.photos_taken += 1;
        let media = match state.queued_photos.pop_front() {
            Some(media) => media,
            None => MediaRef::jpeg(self.output_dir.join(format!("IMG_{:04}.jpg", shot))),
        };
        Ok(media)
    }

    async fn start_recording(&self) -> Result<RecordingHandle> {
        let mut state = self.state.lock().unwrap();
        if state.recording.is_some() {
            return Err(GeocaptureError::CaptureFailure {
                reason: "camera is already recording".to_string(),
            });
        }
        let handle = RecordingHandle(state.next_handle);
        state.next_handle += 1;
        state.recording = Some(handle);
        Ok(handle)
    }

    async fn stop_recording(&self, handle: RecordingHandle) -> Result<MediaRef> {
        let mut state = self.state.lock().unwrap();
        if state.recording != Some(handle) {
            return Err(GeocaptureError::CaptureFailure {
                reason: format!("no recording with handle {}", handle.0),
            });
        }
        state.recording = None;
        state.recordings_finished += 1;
        Ok(MediaRef::mp4(self.output_dir.join(format!("VID_{:04}.mp4", handle.0))))
    }
}
