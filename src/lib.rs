//! WidgetInc screen geometry and frame identification engine.
//!
//! Tracks the WidgetInc game window, maps it onto a 192x128 pixel-art grid
//! inside the letterboxed 3:2 playable area, and identifies the current game
//! screen from the colors of its left and right borders.

pub mod capture;
pub mod config;
pub mod coords;
pub mod detection;
pub mod engine;
pub mod logging;
pub mod paths;
pub mod window;

pub use config::EngineConfig;
pub use detection::{ClassificationResult, DetectionMethod};
pub use engine::Engine;
pub use window::{GeometryCache, OverlayAnchor, PlayableArea, WindowEvent, WindowGeometry};
