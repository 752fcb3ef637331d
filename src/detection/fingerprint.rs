//! Border color fingerprints.
//!
//! A frame is summarized by two thin vertical strips at its left and right
//! edges, each limited to the vertical center of the image where the border
//! band is stable. The strip geometry must be identical when the corpus is
//! built and when a live frame is classified, or distances mean nothing.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strip width as a fraction of image width.
pub const BORDER_INSET: f64 = 0.05;
/// Strip height as a fraction of image height, centered vertically.
pub const CENTER_STRIP: f64 = 0.20;
/// How many of the most frequent colors are kept per strip.
pub const DOMINANT_COLOR_COUNT: usize = 5;

/// Color summary of one border strip.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BorderSample {
    /// Per-channel mean, truncated to integers.
    pub average_color: [u8; 3],
    /// Most frequent colors, most frequent first.
    pub dominant_colors: Vec<[u8; 3]>,
    /// Population variance over every channel value in the strip.
    pub color_variance: f64,
}

/// The two sides of a live frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BorderFingerprint {
    pub left_border: BorderSample,
    pub right_border: BorderSample,
}

/// A corpus entry: a known frame and its border fingerprint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameFingerprint {
    pub frame_id: String,
    pub frame_name: String,
    pub left_border: BorderSample,
    pub right_border: BorderSample,
}

/// Pixel bounds of the two strips for an image of the given size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StripLayout {
    pub strip_width: u32,
    pub start_y: u32,
    pub strip_height: u32,
    pub right_start_x: u32,
}

impl StripLayout {
    pub fn for_size(width: u32, height: u32) -> Self {
        let strip_width = (width as f64 * BORDER_INSET) as u32;
        let strip_height = (height as f64 * CENTER_STRIP) as u32;
        let start_y = (height / 2).saturating_sub(strip_height / 2);
        Self {
            strip_width,
            start_y,
            strip_height,
            right_start_x: width - strip_width,
        }
    }
}

/// Extracts the left/right border fingerprint of a playable-area image.
pub fn extract(frame_image: &RgbImage) -> BorderFingerprint {
    let layout = StripLayout::for_size(frame_image.width(), frame_image.height());
    BorderFingerprint {
        left_border: sample_strip(frame_image, 0, &layout),
        right_border: sample_strip(frame_image, layout.right_start_x, &layout),
    }
}

fn sample_strip(img: &RgbImage, start_x: u32, layout: &StripLayout) -> BorderSample {
    let end_x = (start_x + layout.strip_width).min(img.width());
    let end_y = (layout.start_y + layout.strip_height).min(img.height());

    let mut pixel_count: u64 = 0;
    let mut channel_sums = [0u64; 3];
    let mut value_sum: f64 = 0.0;
    let mut value_sq_sum: f64 = 0.0;
    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();

    for y in layout.start_y..end_y {
        for x in start_x..end_x {
            let rgb = img.get_pixel(x, y).0;
            for (sum, &channel) in channel_sums.iter_mut().zip(rgb.iter()) {
                *sum += channel as u64;
                let v = channel as f64;
                value_sum += v;
                value_sq_sum += v * v;
            }
            *counts.entry(rgb).or_insert(0) += 1;
            pixel_count += 1;
        }
    }

    if pixel_count == 0 {
        return BorderSample::default();
    }

    let average_color = channel_sums.map(|sum| (sum / pixel_count) as u8);

    let value_count = (pixel_count * 3) as f64;
    let mean = value_sum / value_count;
    let color_variance = (value_sq_sum / value_count - mean * mean).max(0.0);

    BorderSample {
        average_color,
        dominant_colors: dominant_colors(counts),
        color_variance,
    }
}

/// Top colors by frequency; equal counts are ordered by color value so the
/// result never depends on hash iteration order.
fn dominant_colors(counts: HashMap<[u8; 3], u32>) -> Vec<[u8; 3]> {
    let mut by_frequency: Vec<([u8; 3], u32)> = counts.into_iter().collect();
    by_frequency.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    by_frequency
        .into_iter()
        .take(DOMINANT_COLOR_COUNT)
        .map(|(color, _)| color)
        .collect()
}
