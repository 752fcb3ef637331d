//! Window geometry and the values derived from it.
//!
//! Everything here is plain data plus pure calculations, so it can be
//! exercised without a real window.

use serde::{Deserialize, Serialize};

/// Logical pixel-art grid width (background pixels horizontally).
pub const GRID_WIDTH: u32 = 192;
/// Logical pixel-art grid height (background pixels vertically).
pub const GRID_HEIGHT: u32 = 128;

/// Raw OS window handle value. Kept as an integer so geometry stays `Send` and comparable.
pub type WindowHandle = isize;

/// A rectangle in Win32 layout: right/bottom are exclusive.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Raw geometry of the located game window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WindowGeometry {
    pub handle: WindowHandle,
    /// Owning process id (informational).
    pub pid: u32,
    /// Window title at the time it was located (informational).
    pub title: String,
    /// Full window rectangle in screen coordinates, including decorations.
    pub window_rect: Rect,
    /// Client rectangle as reported by the OS (origin is always 0,0).
    pub client_rect: Rect,
    /// Screen position of the client area's top-left corner.
    pub client_screen_origin: Point,
}

impl WindowGeometry {
    /// Structural identity used for change detection.
    ///
    /// Only the handle and the two rectangles matter; pid/title/origin are
    /// ignored so that a title change alone never triggers recomputation.
    pub fn same_placement(&self, other: &WindowGeometry) -> bool {
        self.handle == other.handle
            && self.window_rect == other.window_rect
            && self.client_rect == other.client_rect
    }

    pub fn client_width(&self) -> i32 {
        self.client_rect.width()
    }

    pub fn client_height(&self) -> i32 {
        self.client_rect.height()
    }
}

/// The letterboxed 3:2 region of the client area that holds game content,
/// in screen coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlayableArea {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PlayableArea {
    /// Letterboxes a client area of `width`x`height` located at `origin` to 3:2.
    ///
    /// Wider than 3:2 fits the height and centers horizontally; otherwise the
    /// width is fitted and the area is centered vertically. Degenerate sizes
    /// produce a zeroed area.
    pub fn from_client(origin: Point, width: i32, height: i32) -> Self {
        if width <= 0 || height <= 0 {
            return Self::default();
        }

        // width / height > 3 / 2, in integers
        let (w, h) = (width as i64, height as i64);
        if w * 2 > h * 3 {
            let playable_width = (h * 3 / 2) as i32;
            Self {
                x: origin.x + (width - playable_width) / 2,
                y: origin.y,
                width: playable_width,
                height,
            }
        } else {
            let playable_height = (w * 2 / 3) as i32;
            if playable_height == 0 {
                return Self::default();
            }
            Self {
                x: origin.x,
                y: origin.y + (height - playable_height) / 2,
                width,
                height: playable_height,
            }
        }
    }

    /// Playable area of a located window.
    pub fn for_window(window: &WindowGeometry) -> Self {
        Self::from_client(
            window.client_screen_origin,
            window.client_width(),
            window.client_height(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// True when the screen point lies in `[x, x+width) x [y, y+height)`.
    pub fn contains(&self, screen_x: i32, screen_y: i32) -> bool {
        !self.is_empty()
            && screen_x >= self.x
            && screen_y >= self.y
            && screen_x < self.x + self.width
            && screen_y < self.y + self.height
    }
}

/// Screen pixels per logical grid pixel.
///
/// Takes the smaller of the two axis scales so logical pixels stay square,
/// rounded to 4 decimals to bound drift across the grid.
pub fn calculate_pixel_size(area: &PlayableArea) -> Option<f64> {
    if area.is_empty() {
        return None;
    }

    let pixel_size_x = area.width as f64 / GRID_WIDTH as f64;
    let pixel_size_y = area.height as f64 / GRID_HEIGHT as f64;
    let size = (pixel_size_x.min(pixel_size_y) * 10_000.0).round() / 10_000.0;

    if size > 0.0 { Some(size) } else { None }
}

/// Where the overlay UI docks: just right of the playable area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct OverlayAnchor {
    pub x: i32,
    pub y: i32,
    pub available_height: i32,
}

const OVERLAY_GAP: i32 = 3;
const OVERLAY_MIN_OFFSET_Y: i32 = 32;
const OVERLAY_BOTTOM_MARGIN: i32 = 100;

impl OverlayAnchor {
    pub fn calculate(window: &WindowGeometry, area: &PlayableArea) -> Option<Self> {
        if area.is_empty() {
            return None;
        }

        let offset_y = OVERLAY_MIN_OFFSET_Y.max(window.client_width() / 80);
        Some(Self {
            x: area.x + area.width + OVERLAY_GAP,
            y: window.client_screen_origin.y + offset_y,
            available_height: window.client_height() - offset_y - OVERLAY_BOTTOM_MARGIN,
        })
    }
}
