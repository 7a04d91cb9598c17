// Coordinator tuning: observation cadence and buffer thresholds

use crate::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default progress sampling interval (milliseconds)
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 250;

/// Allowed progress sampling interval range (milliseconds)
pub const PROGRESS_INTERVAL_RANGE_MS: (u64, u64) = (50, 1000);

/// Buffered-ahead duration required to resume after a stall (seconds)
pub const DEFAULT_RESUME_AHEAD_SECS: f64 = 3.0;

/// Buffered-ahead duration at which the playhead has caught the loaded edge (seconds)
pub const DEFAULT_STALL_AHEAD_SECS: f64 = 0.1;

/// Stall and resume thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPolicy {
    pub resume_ahead_secs: f64,
    pub stall_ahead_secs: f64,
    /// Minimum change in normalized loaded progress between reports
    pub min_load_delta: f64,
}

impl Default for BufferPolicy {
    fn default() -> Self {
        Self {
            resume_ahead_secs: DEFAULT_RESUME_AHEAD_SECS,
            stall_ahead_secs: DEFAULT_STALL_AHEAD_SECS,
            min_load_delta: 0.001,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub progress_interval_ms: u64,
    pub buffer: BufferPolicy,
    pub playback_rate: f32,
    pub initial_volume: f32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            buffer: BufferPolicy::default(),
            playback_rate: 1.0,
            initial_volume: 1.0,
        }
    }
}

impl CoordinatorConfig {
    /// Parse and validate a TOML document; missing keys take defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CoordinatorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        log::debug!("Loaded coordinator config from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        let (min, max) = PROGRESS_INTERVAL_RANGE_MS;
        if !(min..=max).contains(&self.progress_interval_ms) {
            return Err(PlayerError::Config(format!(
                "progress_interval_ms must be within {}..={}, got {}",
                min, max, self.progress_interval_ms
            )));
        }

        let buffer = &self.buffer;
        if !buffer.resume_ahead_secs.is_finite() || buffer.resume_ahead_secs < 0.0 {
            return Err(PlayerError::Config(format!(
                "buffer.resume_ahead_secs must be >= 0, got {}",
                buffer.resume_ahead_secs
            )));
        }
        if !buffer.stall_ahead_secs.is_finite()
            || buffer.stall_ahead_secs < 0.0
            || (buffer.stall_ahead_secs >= buffer.resume_ahead_secs
                && buffer.resume_ahead_secs > 0.0)
            || buffer.stall_ahead_secs > buffer.resume_ahead_secs
        {
            return Err(PlayerError::Config(format!(
                "buffer.stall_ahead_secs must be >= 0 and below resume_ahead_secs, got {}",
                buffer.stall_ahead_secs
            )));
        }
        if !(0.0..1.0).contains(&buffer.min_load_delta) {
            return Err(PlayerError::Config(format!(
                "buffer.min_load_delta must be within [0, 1), got {}",
                buffer.min_load_delta
            )));
        }
        if !self.playback_rate.is_finite() || self.playback_rate <= 0.0 {
            return Err(PlayerError::Config(format!(
                "playback_rate must be > 0, got {}",
                self.playback_rate
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.progress_interval(), Duration::from_millis(250));
        assert_eq!(config.buffer.resume_ahead_secs, 3.0);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = CoordinatorConfig::from_toml_str(
            r#"
            progress_interval_ms = 100

            [buffer]
            resume_ahead_secs = 5.0
            "#,
        )
        .unwrap();

        assert_eq!(config.progress_interval_ms, 100);
        assert_eq!(config.buffer.resume_ahead_secs, 5.0);
        assert_eq!(config.buffer.stall_ahead_secs, DEFAULT_STALL_AHEAD_SECS);
        assert_eq!(config.playback_rate, 1.0);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let err = CoordinatorConfig::from_toml_str("progress_interval_ms = 5").unwrap_err();
        assert!(matches!(err, PlayerError::Config(_)));

        let err = CoordinatorConfig::from_toml_str(
            "[buffer]\nresume_ahead_secs = 1.0\nstall_ahead_secs = 2.0",
        )
        .unwrap_err();
        assert!(matches!(err, PlayerError::Config(_)));

        let err = CoordinatorConfig::from_toml_str("playback_rate = 0.0").unwrap_err();
        assert!(matches!(err, PlayerError::Config(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = CoordinatorConfig::from_toml_str("progress_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, PlayerError::Config(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = CoordinatorConfig::load("/nonexistent/podium-playback.toml").unwrap_err();
        assert!(matches!(err, PlayerError::Io(_)));
    }
}
