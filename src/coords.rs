//! Coordinate conversion utilities.
//!
//! Four spaces are involved:
//! - screen: absolute desktop pixels
//! - client: relative to the game window's client origin
//! - frame: relative to the playable area's top-left corner
//! - grid: the 192x128 pixel-art grid laid over the playable area
//!
//! Percentages (0.0-1.0 of the playable area) are the resolution-independent
//! form used by stored coordinates. All functions take the geometry they need
//! explicitly and never read global state.

use crate::window::{GRID_HEIGHT, GRID_WIDTH, PlayableArea, WindowGeometry};

pub fn screen_to_client(window: &WindowGeometry, screen_x: i32, screen_y: i32) -> (i32, i32) {
    (
        screen_x - window.client_screen_origin.x,
        screen_y - window.client_screen_origin.y,
    )
}

pub fn client_to_screen(window: &WindowGeometry, client_x: i32, client_y: i32) -> (i32, i32) {
    (
        client_x + window.client_screen_origin.x,
        client_y + window.client_screen_origin.y,
    )
}

/// Converts a screen point to frame-relative coordinates.
///
/// Returns `None` when the point is not on the playable area. Out-of-range
/// points are reported, never clamped.
pub fn screen_to_frame(area: &PlayableArea, screen_x: i32, screen_y: i32) -> Option<(i32, i32)> {
    if !area.contains(screen_x, screen_y) {
        return None;
    }
    Some((screen_x - area.x, screen_y - area.y))
}

pub fn frame_to_screen(area: &PlayableArea, frame_x: i32, frame_y: i32) -> (i32, i32) {
    (frame_x + area.x, frame_y + area.y)
}

pub fn client_to_frame(
    window: &WindowGeometry,
    area: &PlayableArea,
    client_x: i32,
    client_y: i32,
) -> Option<(i32, i32)> {
    let (screen_x, screen_y) = client_to_screen(window, client_x, client_y);
    screen_to_frame(area, screen_x, screen_y)
}

pub fn frame_to_client(
    window: &WindowGeometry,
    area: &PlayableArea,
    frame_x: i32,
    frame_y: i32,
) -> (i32, i32) {
    let (screen_x, screen_y) = frame_to_screen(area, frame_x, frame_y);
    screen_to_client(window, screen_x, screen_y)
}

/// Frame coordinates as fractions (0.0-1.0) of the playable area.
pub fn frame_to_percent(area: &PlayableArea, frame_x: i32, frame_y: i32) -> Option<(f64, f64)> {
    if area.is_empty() {
        return None;
    }
    Some((
        frame_x as f64 / area.width as f64,
        frame_y as f64 / area.height as f64,
    ))
}

pub fn percent_to_frame(area: &PlayableArea, percent_x: f64, percent_y: f64) -> (i32, i32) {
    (
        (percent_x * area.width as f64).round() as i32,
        (percent_y * area.height as f64).round() as i32,
    )
}

/// Grid cell containing a frame point, clamped to the 192x128 grid.
///
/// Clamping is safe here because the frame point was already validated as
/// on the playable area; it only absorbs rounding at the far edges.
pub fn frame_to_grid(pixel_size: f64, frame_x: i32, frame_y: i32) -> (u8, u8) {
    if pixel_size <= 0.0 {
        return (0, 0);
    }
    let grid_x = (frame_x as f64 / pixel_size).floor() as i64;
    let grid_y = (frame_y as f64 / pixel_size).floor() as i64;
    (
        grid_x.clamp(0, GRID_WIDTH as i64 - 1) as u8,
        grid_y.clamp(0, GRID_HEIGHT as i64 - 1) as u8,
    )
}

/// Frame position of a grid cell's top-left corner: the first whole pixel
/// that lies inside the cell, so `frame_to_grid` maps it back to the same cell.
pub fn grid_to_frame(pixel_size: f64, grid_x: u8, grid_y: u8) -> (i32, i32) {
    (
        (grid_x as f64 * pixel_size).ceil() as i32,
        (grid_y as f64 * pixel_size).ceil() as i32,
    )
}

pub fn screen_to_grid(
    area: &PlayableArea,
    pixel_size: f64,
    screen_x: i32,
    screen_y: i32,
) -> Option<(u8, u8)> {
    let (frame_x, frame_y) = screen_to_frame(area, screen_x, screen_y)?;
    Some(frame_to_grid(pixel_size, frame_x, frame_y))
}

/// Gets the current cursor position in screen coordinates.
#[cfg(windows)]
pub fn get_cursor_position() -> anyhow::Result<(i32, i32)> {
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::WindowsAndMessaging::GetCursorPos;

    let mut pt = POINT::default();
    unsafe {
        GetCursorPos(&mut pt)?;
    }
    Ok((pt.x, pt.y))
}
