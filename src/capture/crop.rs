use image::RgbImage;

use crate::window::{PlayableArea, WindowGeometry};

/// Crops a client-area capture down to the playable area.
///
/// The playable area is in screen coordinates, so it is shifted by the client
/// origin first. The crop is clamped to the image bounds; an empty area or an
/// area entirely outside the capture yields an empty image.
pub fn crop_playable_area(client_image: &RgbImage, window: &WindowGeometry, area: &PlayableArea) -> RgbImage {
    let (w, h) = client_image.dimensions();

    let offset_x = area.x - window.client_screen_origin.x;
    let offset_y = area.y - window.client_screen_origin.y;
    if area.is_empty() || offset_x < 0 || offset_y < 0 {
        return RgbImage::new(0, 0);
    }

    let x0 = (offset_x as u32).min(w);
    let y0 = (offset_y as u32).min(h);
    let cw = (area.width as u32).min(w - x0);
    let ch = (area.height as u32).min(h - y0);

    image::imageops::crop_imm(client_image, x0, y0, cw, ch).to_image()
}
