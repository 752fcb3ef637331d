//! Screen capture of the playable area.
//!
//! This module provides:
//! - The `FrameSource` seam the engine captures through
//! - Cropping a client-area capture to the playable area (`crop_playable_area`)
//! - Saving snapshots with their fingerprints (`save_snapshot`)
//! - Windows Graphics Capture (`WindowFrameSource`, Windows only)

pub mod crop;
#[cfg(windows)]
pub mod screenshot;
pub mod snapshot;

use anyhow::Result;
use image::RgbImage;

use crate::window::{PlayableArea, WindowGeometry};

pub use crop::crop_playable_area;
#[cfg(windows)]
pub use screenshot::WindowFrameSource;
pub use snapshot::{SavedSnapshot, save_snapshot};

/// Produces an image of the playable area for the given geometry.
pub trait FrameSource {
    fn capture(&mut self, window: &WindowGeometry, area: &PlayableArea) -> Result<RgbImage>;
}
