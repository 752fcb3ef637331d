//! Rate-limited frame detection.
//!
//! Classification needs a screen capture, which is the expensive part, so the
//! detector remembers its last answer and only captures again once the
//! interval has passed. Absence of a match is cached the same way.

use anyhow::Result;
use image::RgbImage;
use std::time::{Duration, Instant};

use super::classifier::{ClassificationResult, ClassifierSettings, classify};
use super::corpus::Corpus;
use super::disambiguation::DisambiguationResolver;
use super::fingerprint;

pub const DEFAULT_DETECTION_INTERVAL: Duration = Duration::from_secs(2);

/// A timer tick that lands this close to the interval still counts as due,
/// so a late tick doesn't push the next capture back a whole interval.
const TICK_SLACK: Duration = Duration::from_millis(50);

struct LastDetection {
    at: Instant,
    result: Option<ClassificationResult>,
}

pub struct FrameDetector {
    settings: ClassifierSettings,
    resolver: DisambiguationResolver,
    interval: Duration,
    last: Option<LastDetection>,
}

impl FrameDetector {
    pub fn new(settings: ClassifierSettings, resolver: DisambiguationResolver, interval: Duration) -> Self {
        Self {
            settings,
            resolver,
            interval,
            last: None,
        }
    }

    /// Full pipeline on one playable-area image: fingerprint, nearest match,
    /// then collision tie-break. Uncached and side-effect free.
    pub fn classify_frame(&self, frame_image: &RgbImage, corpus: &Corpus) -> Option<ClassificationResult> {
        let live = fingerprint::extract(frame_image);
        let primary = classify(&live, corpus.entries(), &self.settings)?;
        Some(self.resolver.resolve(primary, frame_image))
    }

    /// Returns the cached result if it is younger than the interval (less the
    /// tick slack), else captures and classifies again.
    ///
    /// A capture failure counts as "no match" for this round.
    pub fn detect<F>(&mut self, now: Instant, corpus: &Corpus, capture: F) -> Option<ClassificationResult>
    where
        F: FnOnce() -> Result<RgbImage>,
    {
        if let Some(last) = &self.last
            && now.saturating_duration_since(last.at) < self.interval.saturating_sub(TICK_SLACK)
        {
            return last.result.clone();
        }
        self.detect_now(now, corpus, capture)
    }

    /// Captures and classifies regardless of the rate limit.
    pub fn detect_now<F>(&mut self, now: Instant, corpus: &Corpus, capture: F) -> Option<ClassificationResult>
    where
        F: FnOnce() -> Result<RgbImage>,
    {
        let result = match capture() {
            Ok(image) => self.classify_frame(&image, corpus),
            Err(e) => {
                log::warn!("Frame capture failed: {:#}", e);
                None
            }
        };

        let changed = self.last.as_ref().map(|l| &l.result) != Some(&result);
        if changed {
            match &result {
                Some(r) => log::info!(
                    "Frame detected: {} ({}) confidence {:.2} via {}",
                    r.frame_name,
                    r.frame_id,
                    r.confidence,
                    r.detection_method
                ),
                None => log::info!("No frame recognized"),
            }
        }

        self.last = Some(LastDetection {
            at: now,
            result: result.clone(),
        });
        result
    }

    /// Most recent result, regardless of age.
    pub fn last_result(&self) -> Option<&ClassificationResult> {
        self.last.as_ref().and_then(|l| l.result.as_ref())
    }

    /// Forgets the cached result, e.g. after the window was lost or resized.
    pub fn invalidate(&mut self) {
        self.last = None;
    }
}
