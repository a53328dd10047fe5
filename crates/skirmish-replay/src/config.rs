//! Replay engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::clock::PlaybackSpeed;
use crate::error::{Error, Result};

/// Queued batch count at which playback is considered safely buffered.
pub const DEFAULT_GREEN_THRESHOLD: usize = 20;

/// Tick interval at [`PlaybackSpeed::Normal`].
pub const DEFAULT_BASE_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for a [`ReplayEngine`](crate::ReplayEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Index of the recording to request from the producer.
    pub recording: u32,

    /// Minimum queued batches for the Green phase.
    /// Below this, more data is requested.
    pub green_threshold: usize,

    /// Tick interval at normal speed.
    #[serde(rename = "base_interval_ms", with = "millis")]
    pub base_interval: Duration,

    /// Initial playback speed.
    pub speed: PlaybackSpeed,

    /// Start in the playing mode rather than paused.
    pub autoplay: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            recording: 0,
            green_threshold: DEFAULT_GREEN_THRESHOLD,
            base_interval: DEFAULT_BASE_INTERVAL,
            speed: PlaybackSpeed::Normal,
            autoplay: true,
        }
    }
}

impl ReplayConfig {
    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can drive playback.
    pub fn validate(&self) -> Result<()> {
        if self.green_threshold == 0 {
            return Err(Error::Config("green_threshold must be at least 1".into()));
        }
        if self.base_interval.is_zero() {
            return Err(Error::Config("base_interval_ms must be non-zero".into()));
        }
        Ok(())
    }

    /// Select the recording to play.
    #[must_use]
    pub fn with_recording(mut self, recording: u32) -> Self {
        self.recording = recording;
        self
    }

    /// Set the buffering threshold.
    #[must_use]
    pub fn with_green_threshold(mut self, threshold: usize) -> Self {
        self.green_threshold = threshold;
        self
    }

    /// Set the tick interval at normal speed.
    #[must_use]
    pub fn with_base_interval(mut self, interval: Duration) -> Self {
        self.base_interval = interval;
        self
    }

    /// Set the initial playback speed.
    #[must_use]
    pub fn with_speed(mut self, speed: PlaybackSpeed) -> Self {
        self.speed = speed;
        self
    }

    /// Start paused instead of playing.
    #[must_use]
    pub fn paused(mut self) -> Self {
        self.autoplay = false;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
