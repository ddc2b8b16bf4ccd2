//! Replay command implementation
//!
//! Feeds a recorded GPX track and a folder of photos through the capture
//! engine as if they were captured live, then optionally submits the
//! resulting session for reconstruction.

use crate::cli::ReplayArgs;
use crate::output::OutputWriter;
use crate::output_types::{ReplayOutput, SkippedShot, SubmissionOutput};
use crate::track::{list_photos, load_track, track_index};
use anyhow::{bail, Context, Result};
use geocapture_core::config::LayeredConfig;
use geocapture_core::models::{
    CapturedAsset, GeoFix, MediaRef, PhotoAsset, PositionSample, SessionSnapshot, SessionSummary,
    UploadedAsset, VideoAsset,
};
use geocapture_core::ports::{Clock, TokioClock};
use geocapture_core::GeocaptureError;
use geocapture_session::{
    AssetCaptureController, BurstPolicy, CaptureSessionEngine, FixSource, LocationFeed,
    ScriptedCamera, ScriptedLocationProvider,
};
use std::path::Path;
use std::sync::Arc;

pub async fn execute(
    args: ReplayArgs,
    config: &LayeredConfig,
    api_key: Option<String>,
    output: &OutputWriter,
) -> Result<()> {
    let track = load_track(&args.track, args.accuracy)?;
    let photos = list_photos(&args.photos)?;
    if photos.is_empty() {
        bail!("No JPEG photos found in {}", args.photos.display());
    }

    output.info(format!(
        "Replaying {} photos along {} track points",
        photos.len(),
        track.len()
    ));
    let replay = replay_session(&track, &photos, &args.photos, config).await?;

    let snapshot_path = match &args.output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&replay.snapshot)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Some(path.display().to_string())
        }
        None => None,
    };

    let submission = if args.submit {
        if !replay.summary.ready_for_processing {
            output.warning(format!(
                "Only {} photos captured; at least {} are recommended for reconstruction",
                replay.summary.photo_count,
                config.capture_limits().min_photos_for_processing
            ));
        }
        Some(submit(&replay.snapshot, config, api_key).await?)
    } else {
        None
    };

    let result = ReplayOutput {
        track_points: track.len(),
        photos_found: photos.len(),
        photos_captured: replay.summary.photo_count,
        skipped: replay.skipped,
        summary: replay.summary,
        snapshot_path,
        submission,
    };

    if output.is_json() {
        return output.result(&result);
    }

    output.section("Replayed Session");
    if let Some(id) = &result.summary.session_id {
        output.kv("Session", id);
    }
    output.kv("Photos", format!("{} of {}", result.photos_captured, result.photos_found));
    output.kv("Base Accuracy", format!("{:?}", result.summary.accuracy));
    output.kv("Remaining Capacity", result.summary.remaining_photo_capacity);
    output.kv("Ready For Processing", result.summary.ready_for_processing);
    for shot in &result.skipped {
        output.warning(format!("Skipped {}: {}", shot.photo, shot.reason));
    }
    if let Some(path) = &result.snapshot_path {
        output.success(format!("Session written to {}", path));
    }
    if let Some(submission) = &result.submission {
        output.success(format!(
            "Uploaded {} assets, job {} queued",
            submission.uploaded.len(),
            submission.job.job_id
        ));
    }
    Ok(())
}

struct Replay {
    snapshot: SessionSnapshot,
    summary: SessionSummary,
    skipped: Vec<SkippedShot>,
}

/// Run one capture session over recorded positions and photos
async fn replay_session(
    track: &[PositionSample],
    photos: &[MediaRef],
    photo_dir: &Path,
    config: &LayeredConfig,
) -> Result<Replay> {
    let Some(first) = track.first() else {
        bail!("Track has no points");
    };
    let limits = config.capture_limits();
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);

    let provider = ScriptedLocationProvider::new();
    let camera = ScriptedCamera::new(photo_dir);
    camera.queue_photos(photos.iter().cloned());

    let mut feed = LocationFeed::new(Arc::new(provider.clone()), limits.precision_threshold);
    feed.start(config.location_options(), None).await?;
    let mut fixes = feed.fix_source();

    let engine = CaptureSessionEngine::new(limits, Arc::clone(&clock)).into_shared();
    let controller = AssetCaptureController::new(
        Arc::new(camera),
        engine.clone(),
        feed.fix_source(),
        clock,
        BurstPolicy::from_limits(&limits),
    );

    let base = deliver(&provider, &mut fixes, first).await?;
    let session = engine.lock().await.start_session(Some(&base))?;
    tracing::info!(
        session_id = %session.id,
        accuracy = ?base.accuracy_class(),
        "Replay session started"
    );

    let mut skipped = Vec::new();
    for (shot, media) in photos.iter().enumerate() {
        let sample = &track[track_index(shot, photos.len(), track.len())];
        deliver(&provider, &mut fixes, sample).await?;

        match controller.capture_photo().await {
            Ok(photo) => tracing::debug!(index = photo.index, file = %media.file_name(), "Replayed photo"),
            Err(e @ GeocaptureError::CapacityExceeded { .. }) => {
                tracing::warn!("Session full after {} photos", shot);
                skipped.extend(photos[shot..].iter().map(|m| SkippedShot {
                    photo: m.file_name(),
                    reason: e.to_string(),
                }));
                break;
            }
            Err(e) => skipped.push(SkippedShot {
                photo: media.file_name(),
                reason: e.to_string(),
            }),
        }
    }

    feed.stop().await?;

    let engine = engine.lock().await;
    let snapshot = engine
        .snapshot()
        .context("Capture session ended during replay")?;
    Ok(Replay {
        snapshot,
        summary: engine.summary(),
        skipped,
    })
}

/// Push a recorded sample and wait until the feed has published it
async fn deliver(
    provider: &ScriptedLocationProvider,
    fixes: &mut FixSource,
    sample: &PositionSample,
) -> Result<GeoFix> {
    if !provider.push(sample.clone()) {
        bail!("Location feed is not accepting samples");
    }
    fixes.next_fix().await.context("Location feed stopped")
}

/// Upload the session's assets and submit them as one reconstruction job
async fn submit(
    snapshot: &SessionSnapshot,
    config: &LayeredConfig,
    api_key: Option<String>,
) -> Result<SubmissionOutput> {
    let (mut client, _) = super::connect(config, api_key).await?;

    let assets: Vec<CapturedAsset> = snapshot
        .photos
        .iter()
        .cloned()
        .map(CapturedAsset::from)
        .chain(snapshot.videos.iter().cloned().map(CapturedAsset::from))
        .collect();
    let uploaded = client.upload_assets(&assets).await?;

    let (photos, videos) = with_remote_uris(snapshot, &assets, &uploaded);
    let job = client
        .submit_reconstruction_job(&photos, &videos, &snapshot.metadata())
        .await?;

    Ok(SubmissionOutput {
        uploaded,
        queued_jobs: client.queued_jobs().to_vec(),
        job,
    })
}

/// Session assets pointing at their uploaded copies
fn with_remote_uris(
    snapshot: &SessionSnapshot,
    assets: &[CapturedAsset],
    uploaded: &[UploadedAsset],
) -> (Vec<PhotoAsset>, Vec<VideoAsset>) {
    let mut photos = Vec::with_capacity(snapshot.photos.len());
    let mut videos = Vec::with_capacity(snapshot.videos.len());

    for reference in uploaded {
        match assets.get(reference.index).map(|a| a.with_remote_uri(&reference.uri)) {
            Some(CapturedAsset::Photo(photo)) => photos.push(photo),
            Some(CapturedAsset::Video(video)) => videos.push(video),
            None => {}
        }
    }
    (photos, videos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use geocapture_core::config::{CliConfigOverrides, LayeredConfig};

    fn track() -> Vec<PositionSample> {
        (0..5)
            .map(|i| {
                PositionSample::new(45.0 + i as f64 * 1e-5, -111.0, 0.5, Utc::now())
                    .with_altitude(1500.0)
            })
            .collect()
    }

    fn photos(count: usize) -> Vec<MediaRef> {
        (1..=count)
            .map(|i| MediaRef::jpeg(format!("/field/IMG_{:04}.jpg", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_replay_captures_every_photo() {
        let config = LayeredConfig::with_defaults();

        let replay = replay_session(&track(), &photos(3), Path::new("/field"), &config)
            .await
            .unwrap();

        assert_eq!(replay.summary.photo_count, 3);
        assert!(!replay.summary.ready_for_processing);
        assert!(replay.skipped.is_empty());

        let snapshot = &replay.snapshot;
        assert_eq!(snapshot.session.base_location.latitude, 45.0);
        assert!(snapshot.session.base_location.is_precise);
        let indices: Vec<usize> = snapshot.photos.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(snapshot.photos[0].media.path, Path::new("/field/IMG_0001.jpg"));
        // Last photo sits on the last track point
        assert!((snapshot.photos[2].gps_data.latitude - 45.00004).abs() < 1e-9);
        assert!((snapshot.photos[2].survey_metadata.delta_latitude - 4e-5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_replay_stops_at_capacity() {
        let mut config = LayeredConfig::with_defaults();
        config.update_from_cli(CliConfigOverrides {
            max_photos: Some(2),
            ..Default::default()
        });

        let replay = replay_session(&track(), &photos(4), Path::new("/field"), &config)
            .await
            .unwrap();

        assert_eq!(replay.summary.photo_count, 2);
        assert_eq!(replay.summary.remaining_photo_capacity, 0);
        let skipped: Vec<&str> = replay.skipped.iter().map(|s| s.photo.as_str()).collect();
        assert_eq!(skipped, vec!["IMG_0003.jpg", "IMG_0004.jpg"]);
    }

    #[tokio::test]
    async fn test_remote_uris_follow_upload_indices() {
        let config = LayeredConfig::with_defaults();
        let replay = replay_session(&track(), &photos(2), Path::new("/field"), &config)
            .await
            .unwrap();
        let assets: Vec<CapturedAsset> = replay
            .snapshot
            .photos
            .iter()
            .cloned()
            .map(CapturedAsset::from)
            .collect();
        let uploaded = vec![
            UploadedAsset {
                index: 1,
                uri: "https://store/b".into(),
                upload_id: "u1".into(),
            },
            UploadedAsset {
                index: 0,
                uri: "https://store/a".into(),
                upload_id: "u0".into(),
            },
        ];

        let (photos, videos) = with_remote_uris(&replay.snapshot, &assets, &uploaded);

        assert!(videos.is_empty());
        assert_eq!(photos[0].remote_uri.as_deref(), Some("https://store/b"));
        assert_eq!(photos[0].index, 2);
        assert_eq!(photos[1].remote_uri.as_deref(), Some("https://store/a"));
    }
}
