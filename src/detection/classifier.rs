//! Nearest-fingerprint frame classification.

use serde::Serialize;

use super::fingerprint::{BorderFingerprint, FrameFingerprint};

/// Default acceptance threshold on the combined border distance.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 100.0;
/// Default distance at which confidence reaches zero.
pub const DEFAULT_CONFIDENCE_SCALE: f64 = 200.0;

/// How a classification was reached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Nearest border fingerprint in the corpus.
    BorderFingerprint,
    /// A collision pair settled by a conclusive button probe.
    ProbeDisambiguation,
    /// A collision pair where the probes were inconclusive.
    DisambiguationDefault,
}

impl std::fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionMethod::BorderFingerprint => write!(f, "border fingerprint"),
            DetectionMethod::ProbeDisambiguation => write!(f, "probe disambiguation"),
            DetectionMethod::DisambiguationDefault => write!(f, "disambiguation default"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub frame_id: String,
    pub frame_name: String,
    /// Bounded closeness score in [0, 1]; not a calibrated probability.
    pub confidence: f64,
    pub detection_method: DetectionMethod,
}

/// Tunable thresholds for [`classify`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassifierSettings {
    /// Only scores strictly below this are accepted.
    pub match_threshold: f64,
    /// Confidence is `1 - score / confidence_scale`, clamped to [0, 1].
    pub confidence_scale: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            confidence_scale: DEFAULT_CONFIDENCE_SCALE,
        }
    }
}

/// Euclidean distance between two colors in RGB space.
pub fn color_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Combined distance: both borders must resemble the entry at once.
pub fn border_distance(live: &BorderFingerprint, entry: &FrameFingerprint) -> f64 {
    color_distance(
        live.left_border.average_color,
        entry.left_border.average_color,
    ) + color_distance(
        live.right_border.average_color,
        entry.right_border.average_color,
    )
}

/// Monotone non-increasing map from distance to [0, 1].
pub fn confidence_from_score(score: f64, confidence_scale: f64) -> f64 {
    if confidence_scale <= 0.0 {
        return if score <= 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - score / confidence_scale).clamp(0.0, 1.0)
}

/// Finds the closest corpus entry and accepts it only below the threshold.
///
/// Exact ties keep the first entry encountered, so callers that care pass a
/// corpus in a fixed order (the corpus store sorts by frame id on load).
pub fn classify(
    live: &BorderFingerprint,
    corpus: &[FrameFingerprint],
    settings: &ClassifierSettings,
) -> Option<ClassificationResult> {
    let mut best: Option<(&FrameFingerprint, f64)> = None;
    for entry in corpus {
        let score = border_distance(live, entry);
        if best.is_none_or(|(_, best_score)| score < best_score) {
            best = Some((entry, score));
        }
    }

    let (entry, score) = best?;
    if score >= settings.match_threshold {
        log::debug!(
            "Closest frame {} ({}) rejected: score {:.1} >= {:.1}",
            entry.frame_id,
            entry.frame_name,
            score,
            settings.match_threshold
        );
        return None;
    }

    Some(ClassificationResult {
        frame_id: entry.frame_id.clone(),
        frame_name: entry.frame_name.clone(),
        confidence: confidence_from_score(score, settings.confidence_scale),
        detection_method: DetectionMethod::BorderFingerprint,
    })
}
