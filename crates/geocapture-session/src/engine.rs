//! Capture session engine.
//!
//! Owns the active session and its asset ledger. All mutation goes through
//! the operations below; callers only ever receive clones of stored assets.

use geocapture_core::config::CaptureLimits;
use geocapture_core::error::{GeocaptureError, Result};
use geocapture_core::models::{
    AccuracyClass, CapturedAsset, CaptureSession, GeoFix, MediaRef, PhotoAsset, SessionId,
    SessionMetadata, SessionSnapshot, SessionSummary, VideoAsset,
};
use geocapture_core::ports::Clock;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Engine handle shared between the driving task and the capture controllers
pub type SharedEngine = Arc<Mutex<CaptureSessionEngine>>;

struct ActiveSession {
    session: CaptureSession,
    photos: Vec<PhotoAsset>,
    videos: Vec<VideoAsset>,
}

pub struct CaptureSessionEngine {
    limits: CaptureLimits,
    clock: Arc<dyn Clock>,
    active: Option<ActiveSession>,
}

impl CaptureSessionEngine {
    pub fn new(limits: CaptureLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            clock,
            active: None,
        }
    }

    /// Wrap the engine for sharing with controllers
    pub fn into_shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    /// Start a new session anchored at `current_fix`.
    ///
    /// An already active session is replaced and its ledger discarded.
    pub fn start_session(&mut self, current_fix: Option<&GeoFix>) -> Result<CaptureSession> {
        let base = current_fix.ok_or(GeocaptureError::NoFixAvailable)?;

        if let Some(previous) = &self.active {
            tracing::warn!(
                session_id = %previous.session.id,
                discarded_assets = previous.session.total_assets,
                "Replacing active session; its assets are discarded"
            );
        }

        let started_at = self.clock.now();
        let session = CaptureSession::new(SessionId::generate(started_at), started_at, base.clone());

        tracing::info!(
            session_id = %session.id,
            latitude = base.latitude,
            longitude = base.longitude,
            accuracy = base.accuracy,
            precise = base.is_precise,
            "Capture session started"
        );

        self.active = Some(ActiveSession {
            session: session.clone(),
            photos: Vec::new(),
            videos: Vec::new(),
        });
        Ok(session)
    }

    /// Record a photo in the active session
    pub fn record_photo(&mut self, media: MediaRef, current_fix: Option<&GeoFix>) -> Result<PhotoAsset> {
        let session_id = self.active_id()?;
        self.record_photo_in(&session_id, media, current_fix)
    }

    /// Record a photo only if `session_id` is still the active session.
    ///
    /// Captures started before a reset or replacement fail with
    /// `SessionChanged` and leave the ledger untouched.
    pub fn record_photo_in(
        &mut self,
        session_id: &SessionId,
        media: MediaRef,
        current_fix: Option<&GeoFix>,
    ) -> Result<PhotoAsset> {
        let max_photos = self.limits.max_photos;
        let timestamp = self.clock.now();
        let active = self.active_for(session_id)?;
        let fix = current_fix.ok_or(GeocaptureError::NoFixAvailable)?;

        if active.photos.len() >= max_photos {
            return Err(GeocaptureError::CapacityExceeded { max: max_photos });
        }

        let photo = PhotoAsset::new(
            media,
            timestamp,
            session_id.clone(),
            active.photos.len() + 1,
            fix.clone(),
            &active.session.base_location,
        );

        active.photos.push(photo.clone());
        active.session.total_assets += 1;

        tracing::debug!(
            session_id = %session_id,
            index = photo.index,
            delta_lat = photo.survey_metadata.delta_latitude,
            delta_lon = photo.survey_metadata.delta_longitude,
            "Photo recorded"
        );
        Ok(photo)
    }

    /// Record a finished video clip in the active session
    pub fn record_video(
        &mut self,
        media: MediaRef,
        start_fix: Option<&GeoFix>,
        duration: f64,
    ) -> Result<VideoAsset> {
        let session_id = self.active_id()?;
        self.record_video_in(&session_id, media, start_fix, duration)
    }

    /// Session-guarded variant of [`record_video`](Self::record_video)
    pub fn record_video_in(
        &mut self,
        session_id: &SessionId,
        media: MediaRef,
        start_fix: Option<&GeoFix>,
        duration: f64,
    ) -> Result<VideoAsset> {
        let timestamp = self.clock.now();
        let active = self.active_for(session_id)?;
        let fix = start_fix.ok_or(GeocaptureError::NoFixAvailable)?;

        let video = VideoAsset::new(media, timestamp, session_id.clone(), duration.max(0.0), fix.clone());
        active.videos.push(video.clone());
        active.session.total_assets += 1;

        tracing::debug!(session_id = %session_id, duration = video.duration, "Video recorded");
        Ok(video)
    }

    /// Drop the active session and its ledger
    pub fn reset_session(&mut self) {
        if let Some(previous) = self.active.take() {
            tracing::info!(
                session_id = %previous.session.id,
                total_assets = previous.session.total_assets,
                "Capture session reset"
            );
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let photo_count = self.photo_count();
        let base_location = self.active.as_ref().map(|a| a.session.base_location.clone());

        SessionSummary {
            session_id: self.active.as_ref().map(|a| a.session.id.clone()),
            started_at: self.active.as_ref().map(|a| a.session.started_at),
            photo_count,
            video_count: self.video_count(),
            total_assets: self.active.as_ref().map_or(0, |a| a.session.total_assets),
            accuracy: AccuracyClass::of(base_location.as_ref()),
            base_location,
            remaining_photo_capacity: self.remaining_photo_capacity(),
            ready_for_processing: photo_count >= self.limits.min_photos_for_processing,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    pub fn photos(&self) -> &[PhotoAsset] {
        self.active.as_ref().map_or(&[], |a| a.photos.as_slice())
    }

    pub fn videos(&self) -> &[VideoAsset] {
        self.active.as_ref().map_or(&[], |a| a.videos.as_slice())
    }

    pub fn photo_count(&self) -> usize {
        self.photos().len()
    }

    pub fn video_count(&self) -> usize {
        self.videos().len()
    }

    pub fn remaining_photo_capacity(&self) -> usize {
        self.limits.max_photos.saturating_sub(self.photo_count())
    }

    pub fn limits(&self) -> &CaptureLimits {
        &self.limits
    }

    /// Session block for a reconstruction job
    pub fn session_metadata(&self) -> Option<SessionMetadata> {
        self.session().map(SessionMetadata::for_session)
    }

    /// All assets in capture order, photos first
    pub fn captured_assets(&self) -> Vec<CapturedAsset> {
        self.photos()
            .iter()
            .cloned()
            .map(CapturedAsset::from)
            .chain(self.videos().iter().cloned().map(CapturedAsset::from))
            .collect()
    }

    /// Export of the session and its ledger
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.active.as_ref().map(|a| SessionSnapshot {
            session: a.session.clone(),
            photos: a.photos.clone(),
            videos: a.videos.clone(),
        })
    }

    fn active_id(&self) -> Result<SessionId> {
        self.active
            .as_ref()
            .map(|a| a.session.id.clone())
            .ok_or(GeocaptureError::NoActiveSession)
    }

    fn active_for(&mut self, session_id: &SessionId) -> Result<&mut ActiveSession> {
        match self.active.as_mut() {
            Some(active) if &active.session.id == session_id => Ok(active),
            Some(active) => Err(GeocaptureError::SessionChanged {
                expected: session_id.to_string(),
                actual: active.session.id.to_string(),
            }),
            None => Err(GeocaptureError::SessionChanged {
                expected: session_id.to_string(),
                actual: "none".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use geocapture_core::models::PositionSample;
    use geocapture_core::ports::TokioClock;
    use proptest::prelude::*;

    fn fix(lat: f64, lon: f64, accuracy: f64) -> GeoFix {
        GeoFix::from_sample(&PositionSample::new(lat, lon, accuracy, Utc::now()), 1.0)
    }

    fn engine_with_max(max_photos: usize) -> CaptureSessionEngine {
        let limits = CaptureLimits {
            max_photos,
            ..CaptureLimits::default()
        };
        CaptureSessionEngine::new(limits, Arc::new(TokioClock))
    }

    fn photo(n: usize) -> MediaRef {
        MediaRef::jpeg(format!("/captures/IMG_{:04}.jpg", n))
    }

    #[test]
    fn test_start_requires_fix() {
        let mut engine = engine_with_max(10);
        assert!(matches!(engine.start_session(None), Err(GeocaptureError::NoFixAvailable)));
        assert!(!engine.is_active());
    }

    #[test]
    fn test_reference_scenario() {
        let mut engine = engine_with_max(1000);
        let base = fix(45.000000, -111.000000, 0.8);

        let session = engine.start_session(Some(&base)).unwrap();
        assert_eq!(session.base_location, base);
        assert!(session.base_location.is_precise);
        assert_eq!(engine.summary().accuracy, AccuracyClass::Precise);

        let at = fix(45.000010, -111.000010, 0.9);
        let photo = engine.record_photo(photo(1), Some(&at)).unwrap();

        assert!((photo.survey_metadata.delta_latitude - 0.000010).abs() < 1e-9);
        assert!((photo.survey_metadata.delta_longitude + 0.000010).abs() < 1e-9);
        assert_eq!(photo.index, 1);
        assert_eq!(photo.session_id, session.id);
        assert_eq!(engine.session().unwrap().total_assets, 1);
    }

    #[test]
    fn test_record_without_session_fails() {
        let mut engine = engine_with_max(10);
        let at = fix(45.0, -111.0, 0.5);
        assert!(matches!(
            engine.record_photo(photo(1), Some(&at)),
            Err(GeocaptureError::NoActiveSession)
        ));
        assert!(matches!(
            engine.record_video(MediaRef::mp4("/v.mp4"), Some(&at), 3.0),
            Err(GeocaptureError::NoActiveSession)
        ));
    }

    #[test]
    fn test_record_without_fix_fails_and_changes_nothing() {
        let mut engine = engine_with_max(10);
        engine.start_session(Some(&fix(45.0, -111.0, 0.5))).unwrap();

        assert!(matches!(engine.record_photo(photo(1), None), Err(GeocaptureError::NoFixAvailable)));
        assert!(matches!(
            engine.record_video(MediaRef::mp4("/v.mp4"), None, 3.0),
            Err(GeocaptureError::NoFixAvailable)
        ));
        assert_eq!(engine.session().unwrap().total_assets, 0);
    }

    #[test]
    fn test_capacity_is_exact() {
        let mut engine = engine_with_max(3);
        let at = fix(45.0, -111.0, 0.5);
        engine.start_session(Some(&at)).unwrap();

        for n in 1..=3 {
            assert_eq!(engine.record_photo(photo(n), Some(&at)).unwrap().index, n);
        }
        assert!(matches!(
            engine.record_photo(photo(4), Some(&at)),
            Err(GeocaptureError::CapacityExceeded { max: 3 })
        ));
        assert_eq!(engine.photo_count(), 3);
        assert_eq!(engine.remaining_photo_capacity(), 0);

        // Videos have no independent cap
        engine.record_video(MediaRef::mp4("/v.mp4"), Some(&at), 12.0).unwrap();
        assert_eq!(engine.session().unwrap().total_assets, 4);
    }

    #[test]
    fn test_reset_then_record_fails() {
        let mut engine = engine_with_max(10);
        let at = fix(45.0, -111.0, 0.5);
        engine.start_session(Some(&at)).unwrap();
        engine.record_photo(photo(1), Some(&at)).unwrap();

        engine.reset_session();
        engine.reset_session();

        assert!(matches!(
            engine.record_photo(photo(2), Some(&at)),
            Err(GeocaptureError::NoActiveSession)
        ));
        let summary = engine.summary();
        assert!(summary.session_id.is_none());
        assert_eq!(summary.total_assets, 0);
        assert_eq!(summary.accuracy, AccuracyClass::Unavailable);
    }

    #[test]
    fn test_restart_replaces_session_and_discards_ledger() {
        let mut engine = engine_with_max(10);
        let at = fix(45.0, -111.0, 0.5);
        let first = engine.start_session(Some(&at)).unwrap();
        engine.record_photo(photo(1), Some(&at)).unwrap();

        let second = engine.start_session(Some(&fix(46.0, -112.0, 3.0))).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(engine.photo_count(), 0);

        let next = engine.record_photo(photo(2), Some(&at)).unwrap();
        assert_eq!(next.index, 1);
        assert_eq!(next.survey_metadata.delta_latitude, 45.0 - 46.0);
    }

    #[test]
    fn test_stale_capture_is_discarded() {
        let mut engine = engine_with_max(10);
        let at = fix(45.0, -111.0, 0.5);
        let first = engine.start_session(Some(&at)).unwrap();

        engine.reset_session();
        assert!(matches!(
            engine.record_photo_in(&first.id, photo(1), Some(&at)),
            Err(GeocaptureError::SessionChanged { .. })
        ));

        let second = engine.start_session(Some(&at)).unwrap();
        assert!(matches!(
            engine.record_video_in(&first.id, MediaRef::mp4("/v.mp4"), Some(&at), 2.0),
            Err(GeocaptureError::SessionChanged { .. })
        ));
        assert!(engine.record_photo_in(&second.id, photo(2), Some(&at)).is_ok());
        assert_eq!(engine.session().unwrap().total_assets, 1);
    }

    #[test]
    fn test_summary_reports_processing_readiness() {
        let mut engine = engine_with_max(100);
        let at = fix(45.0, -111.0, 2.0);
        engine.start_session(Some(&at)).unwrap();

        for n in 1..=7 {
            engine.record_photo(photo(n), Some(&at)).unwrap();
        }
        assert!(!engine.summary().ready_for_processing);

        engine.record_photo(photo(8), Some(&at)).unwrap();
        let summary = engine.summary();
        assert!(summary.ready_for_processing);
        assert_eq!(summary.remaining_photo_capacity, 92);
        assert_eq!(summary.accuracy, AccuracyClass::Standard);
    }

    #[test]
    fn test_metadata_and_snapshot() {
        let mut engine = engine_with_max(10);
        assert!(engine.session_metadata().is_none());
        assert!(engine.snapshot().is_none());

        let at = fix(45.0, -111.0, 0.5);
        engine.start_session(Some(&at)).unwrap();
        engine.record_photo(photo(1), Some(&at)).unwrap();
        engine.record_video(MediaRef::mp4("/v.mp4"), Some(&at), 4.0).unwrap();

        let metadata = engine.session_metadata().unwrap();
        assert_eq!(metadata.total_assets, 2);
        assert!(metadata.is_rtk_survey);

        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.photos.len(), 1);
        assert_eq!(snapshot.videos.len(), 1);
        assert_eq!(engine.captured_assets().len(), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Photo { dlat: f64, dlon: f64, with_fix: bool },
        Video { with_fix: bool },
        Reset,
        Start,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => (-0.001f64..0.001, -0.001f64..0.001, any::<bool>())
                .prop_map(|(dlat, dlon, with_fix)| Op::Photo { dlat, dlon, with_fix }),
            2 => any::<bool>().prop_map(|with_fix| Op::Video { with_fix }),
            1 => Just(Op::Reset),
            1 => Just(Op::Start),
        ]
    }

    proptest! {
        #[test]
        fn prop_ledger_invariants_hold(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let mut engine = engine_with_max(15);
            let base = fix(45.0, -111.0, 0.8);
            engine.start_session(Some(&base)).unwrap();
            let mut current_base = base.clone();

            for op in ops {
                match op {
                    Op::Photo { dlat, dlon, with_fix } => {
                        let at = fix(45.0 + dlat, -111.0 + dlon, 0.9);
                        let before = engine.photo_count();
                        let result = engine.record_photo(photo(before + 1), with_fix.then_some(&at));
                        match result {
                            Ok(p) => {
                                prop_assert_eq!(p.index, before + 1);
                                prop_assert_eq!(p.survey_metadata.delta_latitude, at.latitude - current_base.latitude);
                                prop_assert_eq!(p.survey_metadata.delta_longitude, at.longitude - current_base.longitude);
                            }
                            Err(GeocaptureError::CapacityExceeded { .. }) => {
                                prop_assert_eq!(before, 15);
                            }
                            Err(_) => prop_assert_eq!(engine.photo_count(), before),
                        }
                    }
                    Op::Video { with_fix } => {
                        let _ = engine.record_video(MediaRef::mp4("/v.mp4"), with_fix.then_some(&base), 1.0);
                    }
                    Op::Reset => engine.reset_session(),
                    Op::Start => {
                        engine.start_session(Some(&base)).unwrap();
                        current_base = base.clone();
                    }
                }

                if let Some(session) = engine.session() {
                    prop_assert_eq!(session.total_assets, engine.photo_count() + engine.video_count());
                    prop_assert_eq!(&session.base_location, &current_base);
                    let indices: Vec<usize> = engine.photos().iter().map(|p| p.index).collect();
                    let expected: Vec<usize> = (1..=engine.photo_count()).collect();
                    prop_assert_eq!(indices, expected);
                    prop_assert!(engine.photos().iter().all(|p| p.session_id == session.id));
                }
            }
        }
    }
}
