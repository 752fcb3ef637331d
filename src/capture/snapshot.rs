//! Saved playable-area snapshots for building the fingerprint corpus.
//!
//! Each snapshot is a PNG plus a JSON file holding the border fingerprint
//! extracted from it, so a new frame can be added to the corpus by naming the
//! JSON entry and merging it into an analysis export.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::RgbImage;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::detection::{BorderFingerprint, fingerprint};

#[derive(Debug, Serialize)]
pub struct SnapshotRecord {
    pub timestamp: String,
    pub image_file: String,
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub borders: BorderFingerprint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SavedSnapshot {
    pub image_path: PathBuf,
    pub fingerprint_path: PathBuf,
}

/// Writes `frame_<timestamp>.png` and `frame_<timestamp>.json` into `dir`.
pub fn save_snapshot(dir: &Path, frame_image: &RgbImage, taken_at: DateTime<Local>) -> Result<SavedSnapshot> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let stem = format!("frame_{}", taken_at.format("%Y%m%d_%H%M%S_%3f"));
    let image_file = format!("{}.png", stem);
    let image_path = dir.join(&image_file);
    let fingerprint_path = dir.join(format!("{}.json", stem));

    frame_image
        .save(&image_path)
        .with_context(|| format!("Failed to save {}", image_path.display()))?;

    let record = SnapshotRecord {
        timestamp: taken_at.to_rfc3339(),
        image_file,
        width: frame_image.width(),
        height: frame_image.height(),
        borders: fingerprint::extract(frame_image),
    };
    let json = serde_json::to_string_pretty(&record)?;
    fs::write(&fingerprint_path, json)
        .with_context(|| format!("Failed to write {}", fingerprint_path.display()))?;

    log::info!("Saved snapshot {}", image_path.display());
    Ok(SavedSnapshot {
        image_path,
        fingerprint_path,
    })
}
