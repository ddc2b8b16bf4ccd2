//! Recorded field data for session replay

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use geocapture_core::models::{MediaRef, PositionSample};
use gpx::{read, Gpx, Waypoint};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Meters of horizontal error per unit of HDOP
const HDOP_TO_METERS: f64 = 5.0;

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Read every track point of a GPX file, in file order.
///
/// Points without HDOP get `default_accuracy`. Points without a timestamp
/// are stamped with the time of loading.
pub fn load_track(path: &Path, default_accuracy: f64) -> Result<Vec<PositionSample>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let gpx: Gpx = read(BufReader::new(file))
        .map_err(|e| anyhow::anyhow!("Failed to parse GPX {}: {}", path.display(), e))?;

    let samples: Vec<PositionSample> = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .map(|point| to_sample(point, default_accuracy))
        .collect();

    if samples.is_empty() {
        bail!("{} contains no track points", path.display());
    }
    Ok(samples)
}

fn to_sample(point: &Waypoint, default_accuracy: f64) -> PositionSample {
    let position = point.point();
    let timestamp = point
        .time
        .and_then(|t| t.format().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    let accuracy = point
        .hdop
        .map(|hdop| hdop * HDOP_TO_METERS)
        .unwrap_or(default_accuracy);

    let mut sample = PositionSample::new(position.y(), position.x(), accuracy, timestamp);
    sample.speed = point.speed;
    if let Some(elevation) = point.elevation {
        sample = sample.with_altitude(elevation);
    }
    sample
}

/// JPEG files in `dir`, sorted by file name
pub fn list_photos(dir: &Path) -> Result<Vec<MediaRef>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_photo = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| PHOTO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && is_photo {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths.into_iter().map(MediaRef::jpeg).collect())
}

/// Track point paired with the `shot`-th of `shots` photos.
///
/// Photos are spread evenly from the first to the last point.
pub fn track_index(shot: usize, shots: usize, points: usize) -> usize {
    if shots <= 1 || points <= 1 {
        return 0;
    }
    shot.min(shots - 1) * (points - 1) / (shots - 1)
}
