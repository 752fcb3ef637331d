//! Button-probe tie-break for frames whose borders are identical.
//!
//! Widget Spinner and Gyroscope Fabricator share the same border art, so the
//! fingerprint classifier cannot tell them apart. Each has a differently
//! colored action button at a fixed position; sampling one pixel on each
//! button settles which frame is showing.

use image::RgbImage;

use super::classifier::{ClassificationResult, DetectionMethod};

/// Per-channel tolerance when matching a probe pixel to a palette color.
pub const PROBE_TOLERANCE: u8 = 15;
/// Confidence reported when exactly one probe is active.
pub const DISAMBIGUATED_CONFIDENCE: f64 = 0.98;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonColor {
    Red,
    Blue,
    Green,
    Yellow,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Default,
    Focus,
    Inactive,
}

impl ButtonColor {
    pub const ALL: [ButtonColor; 4] = [
        ButtonColor::Red,
        ButtonColor::Blue,
        ButtonColor::Green,
        ButtonColor::Yellow,
    ];

    /// RGB of this button in the given state.
    pub fn rgb(self, state: ButtonState) -> [u8; 3] {
        use ButtonColor::*;
        use ButtonState::*;
        match (self, state) {
            (Red, Default) => [199, 35, 21],
            (Red, Focus) => [251, 36, 18],
            (Red, Inactive) => [57, 23, 20],
            (Blue, Default) => [21, 87, 199],
            (Blue, Focus) => [18, 104, 251],
            (Blue, Inactive) => [20, 34, 57],
            (Green, Default) => [17, 162, 40],
            (Green, Focus) => [15, 204, 45],
            (Green, Inactive) => [16, 46, 22],
            (Yellow, Default) => [242, 151, 0],
            (Yellow, Focus) => [198, 125, 0],
            (Yellow, Inactive) => [60, 39, 8],
        }
    }
}

fn within_tolerance(pixel: [u8; 3], target: [u8; 3], tolerance: u8) -> bool {
    pixel
        .iter()
        .zip(target.iter())
        .all(|(&p, &t)| p.abs_diff(t) <= tolerance)
}

/// Identifies a sampled pixel as a button color and state, if it is one.
pub fn classify_probe_color(pixel: [u8; 3], tolerance: u8) -> Option<(ButtonColor, ButtonState)> {
    for color in ButtonColor::ALL {
        for state in [ButtonState::Default, ButtonState::Focus, ButtonState::Inactive] {
            if within_tolerance(pixel, color.rgb(state), tolerance) {
                return Some((color, state));
            }
        }
    }
    None
}

/// A frame in a collision group, identified by one button probe.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeTarget {
    pub frame_id: &'static str,
    pub frame_name: &'static str,
    /// Probe position as fractions of the playable area.
    pub probe: (f64, f64),
    pub button: ButtonColor,
}

/// Frames that share a border fingerprint. The first member is the default
/// when probes are inconclusive.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionGroup {
    pub members: Vec<ProbeTarget>,
}

impl CollisionGroup {
    /// Membership by frame name, or by id for corpora that renamed a frame.
    pub fn contains(&self, result: &ClassificationResult) -> bool {
        self.members
            .iter()
            .any(|m| m.frame_name == result.frame_name || m.frame_id == result.frame_id)
    }

    fn default_member(&self) -> Option<&ProbeTarget> {
        self.members.first()
    }
}

/// The known collision: Widget Spinner's red spin button and Gyroscope
/// Fabricator's green assemble button.
pub fn spinner_gyroscope_group() -> CollisionGroup {
    CollisionGroup {
        members: vec![
            ProbeTarget {
                frame_id: "2.4",
                frame_name: "Widget Spinner",
                probe: (0.25, 0.55),
                button: ButtonColor::Red,
            },
            ProbeTarget {
                frame_id: "2.3",
                frame_name: "Gyroscope Fabricator",
                probe: (0.50, 0.78),
                button: ButtonColor::Green,
            },
        ],
    }
}

pub struct DisambiguationResolver {
    groups: Vec<CollisionGroup>,
    tolerance: u8,
}

impl Default for DisambiguationResolver {
    fn default() -> Self {
        Self::new(PROBE_TOLERANCE)
    }
}

impl DisambiguationResolver {
    pub fn new(tolerance: u8) -> Self {
        Self {
            groups: vec![spinner_gyroscope_group()],
            tolerance,
        }
    }

    /// Re-examines a primary classification that landed in a collision group.
    ///
    /// Results outside every group pass through unchanged.
    pub fn resolve(&self, primary: ClassificationResult, frame_image: &RgbImage) -> ClassificationResult {
        let Some(group) = self.groups.iter().find(|g| g.contains(&primary)) else {
            return primary;
        };

        let active: Vec<&ProbeTarget> = group
            .members
            .iter()
            .filter(|m| self.probe_active(m, frame_image))
            .collect();

        if let [winner] = active.as_slice() {
            log::debug!(
                "Probe settled {} -> {} ({})",
                primary.frame_id,
                winner.frame_id,
                winner.frame_name
            );
            return ClassificationResult {
                frame_id: winner.frame_id.to_string(),
                frame_name: winner.frame_name.to_string(),
                confidence: DISAMBIGUATED_CONFIDENCE,
                detection_method: DetectionMethod::ProbeDisambiguation,
            };
        }

        let Some(fallback) = group.default_member() else {
            return primary;
        };
        log::debug!(
            "Probes inconclusive ({} active), defaulting to {}",
            active.len(),
            fallback.frame_name
        );
        ClassificationResult {
            frame_id: fallback.frame_id.to_string(),
            frame_name: fallback.frame_name.to_string(),
            confidence: primary.confidence,
            detection_method: DetectionMethod::DisambiguationDefault,
        }
    }

    /// A probe is active when the sampled pixel reads as its own button color
    /// in default or focus state.
    fn probe_active(&self, target: &ProbeTarget, frame_image: &RgbImage) -> bool {
        let Some(pixel) = sample_at(frame_image, target.probe) else {
            return false;
        };
        matches!(
            classify_probe_color(pixel, self.tolerance),
            Some((color, ButtonState::Default | ButtonState::Focus)) if color == target.button
        )
    }
}

fn sample_at(img: &RgbImage, (fx, fy): (f64, f64)) -> Option<[u8; 3]> {
    if img.width() == 0 || img.height() == 0 {
        return None;
    }
    let x = ((fx * img.width() as f64) as u32).min(img.width() - 1);
    let y = ((fy * img.height() as f64) as u32).min(img.height() - 1);
    Some(img.get_pixel(x, y).0)
}
