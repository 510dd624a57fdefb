use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::media::BackendKind;

/// Tuning for publishing and reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drift (seconds) a native guest tolerates before seeking
    pub native_drift_threshold: f64,
    /// Drift (seconds) a YouTube guest tolerates before seeking. Looser than
    /// native since both sampling and command latency are coarser.
    pub youtube_drift_threshold: f64,
    /// Minimum gap between two continuous-playback publishes
    pub publish_interval_ms: u64,
    /// How far a host sample may stray from the extrapolated position before
    /// it counts as a seek
    pub seek_tolerance: f64,
    /// Status polling interval inside the YouTube embed page
    pub youtube_poll_interval_ms: u64,
    /// Bounded wait for an adapter to report ready
    pub ready_timeout_ms: u64,
    /// Tick interval for software media elements
    pub tick_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            native_drift_threshold: 2.0,
            youtube_drift_threshold: 3.0,
            publish_interval_ms: 500,
            seek_tolerance: 1.0,
            youtube_poll_interval_ms: 500,
            ready_timeout_ms: 15_000,
            tick_interval_ms: 250,
        }
    }
}

impl SyncConfig {
    /// Load a config from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        let config: SyncConfig = serde_json::from_str(&raw)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.native_drift_threshold > 0.0) || !(self.youtube_drift_threshold > 0.0) {
            return Err(SyncError::Config("drift thresholds must be positive".into()));
        }
        if self.seek_tolerance < 0.0 {
            return Err(SyncError::Config("seek_tolerance must not be negative".into()));
        }
        if self.publish_interval_ms == 0
            || self.youtube_poll_interval_ms == 0
            || self.tick_interval_ms == 0
        {
            return Err(SyncError::Config("intervals must be non-zero".into()));
        }
        Ok(())
    }

    /// Drift threshold for a given backend. Tubi never reconciles so it has none.
    pub fn drift_threshold(&self, backend: BackendKind) -> Option<f64> {
        match backend {
            BackendKind::Native => Some(self.native_drift_threshold),
            BackendKind::YouTube => Some(self.youtube_drift_threshold),
            BackendKind::Tubi => None,
        }
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms)
    }

    pub fn youtube_poll_interval(&self) -> Duration {
        Duration::from_millis(self.youtube_poll_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
