//! Debug-only mirror of the geometry cache.
//!
//! Written to `logs/cache/cache.cache` after every geometry change so the
//! current values can be inspected by hand. Nothing reads it back.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs;
use std::path::Path;

use super::geometry::{OverlayAnchor, PlayableArea, WindowGeometry};

#[derive(Debug, Serialize)]
pub struct CacheDump<'a> {
    pub timestamp: i64,
    pub last_updated: String,
    pub is_valid: bool,
    pub window_info: Option<&'a WindowGeometry>,
    pub playable_area: Option<PlayableArea>,
    pub pixel_size: Option<f64>,
    pub overlay_position: Option<OverlayAnchor>,
}

impl<'a> CacheDump<'a> {
    pub fn new(
        updated_at: DateTime<Local>,
        window_info: Option<&'a WindowGeometry>,
        playable_area: Option<PlayableArea>,
        pixel_size: Option<f64>,
        overlay_position: Option<OverlayAnchor>,
    ) -> Self {
        Self {
            timestamp: updated_at.timestamp(),
            last_updated: updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            is_valid: window_info.is_some(),
            window_info,
            playable_area,
            pixel_size,
            overlay_position,
        }
    }
}

/// Writes the dump as pretty JSON, creating the parent directory if needed.
pub fn write_cache_dump(path: &Path, dump: &CacheDump) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(dump)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
