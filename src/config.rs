//! Engine configuration.
//!
//! Loaded from config.json next to the executable at startup. Every field has
//! a default, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::detection::ClassifierSettings;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable name of the game process
    pub process_name: String,
    /// Substring the game window title must contain
    pub window_title: String,
    /// Geometry revalidation tick (milliseconds)
    pub revalidate_interval_ms: u64,
    /// Minimum time between frame classifications (milliseconds)
    pub classify_interval_ms: u64,
    /// Border distance below which a corpus match is accepted
    pub match_threshold: f64,
    /// Border distance at which confidence reaches zero
    pub confidence_scale: f64,
    /// Per-channel tolerance for disambiguation probes
    pub probe_tolerance: u8,
    /// Mirror the geometry cache to logs/cache/cache.cache
    pub debug_cache_dump: bool,
    /// error, warn, info, debug or trace
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            process_name: "WidgetInc.exe".to_string(),
            window_title: "WidgetInc".to_string(),
            revalidate_interval_ms: 500,
            classify_interval_ms: 2000,
            match_threshold: 100.0,
            confidence_scale: 200.0,
            probe_tolerance: 15,
            debug_cache_dump: true,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            match_threshold: self.match_threshold,
            confidence_scale: self.confidence_scale,
        }
    }

    pub fn revalidate_interval(&self) -> Duration {
        Duration::from_millis(self.revalidate_interval_ms)
    }

    pub fn classify_interval(&self) -> Duration {
        Duration::from_millis(self.classify_interval_ms)
    }
}

/// Loads configuration from `config_path` or returns defaults.
///
/// Runs before the logger is installed, so it reports what happened in the
/// returned message instead of logging it.
pub fn load_config(config_path: &Path) -> (EngineConfig, String) {
    if !config_path.exists() {
        return (
            EngineConfig::default(),
            format!("{} not found. Using default config.", config_path.display()),
        );
    }

    match fs::read_to_string(config_path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => (
                config,
                format!("Config loaded from {}", config_path.display()),
            ),
            Err(e) => (
                EngineConfig::default(),
                format!("Failed to parse {}: {}. Using defaults.", config_path.display(), e),
            ),
        },
        Err(e) => (
            EngineConfig::default(),
            format!("Failed to read {}: {}. Using defaults.", config_path.display(), e),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, message) = load_config(&dir.path().join("config.json"));
        assert_eq!(config, EngineConfig::default());
        assert!(message.contains("not found"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "match_threshold": 80.0, "log_level": "debug" }"#).unwrap();

        let (config, _) = load_config(&path);
        assert_eq!(config.match_threshold, 80.0);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.process_name, "WidgetInc.exe");
        assert_eq!(config.classify_interval(), Duration::from_secs(2));
        assert_eq!(config.revalidate_interval(), Duration::from_millis(500));
        assert_eq!(config.classifier_settings().confidence_scale, 200.0);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let (config, message) = load_config(&path);
        assert_eq!(config, EngineConfig::default());
        assert!(message.starts_with("Failed to parse"));
    }
}
