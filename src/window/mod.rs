//! Game window tracking.
//!
//! This module provides:
//! - Window discovery (`WindowLocator`, `Win32WindowLocator` on Windows)
//! - Derived geometry: 3:2 playable area, pixel-art grid scale, overlay anchor
//! - The proactive `GeometryCache` with change notifications

pub mod cache;
pub mod dump;
pub mod geometry;
pub mod locator;

pub use cache::{GeometryCache, WindowEvent};
pub use geometry::{
    GRID_HEIGHT, GRID_WIDTH, OverlayAnchor, PlayableArea, Point, Rect, WindowGeometry,
    WindowHandle, calculate_pixel_size,
};
pub use locator::WindowLocator;
#[cfg(windows)]
pub use locator::Win32WindowLocator;
