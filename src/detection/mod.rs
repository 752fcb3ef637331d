//! Frame identification from border colors.
//!
//! Pipeline: `fingerprint::extract` -> `classifier::classify` against the
//! corpus -> `DisambiguationResolver::resolve` for known look-alike frames.
//! `FrameDetector` wraps it with a result cache and rate limit.

pub mod classifier;
pub mod corpus;
pub mod detector;
pub mod disambiguation;
pub mod fingerprint;

pub use classifier::{ClassificationResult, ClassifierSettings, DetectionMethod, classify};
pub use corpus::{Corpus, CorpusError, CorpusPaths, CorpusSource, FrameCorpusStore};
pub use detector::{DEFAULT_DETECTION_INTERVAL, FrameDetector};
pub use disambiguation::{ButtonColor, ButtonState, DisambiguationResolver};
pub use fingerprint::{BorderFingerprint, BorderSample, FrameFingerprint};
