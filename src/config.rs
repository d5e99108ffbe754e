use crate::connection::AutoStartManifest;
use crate::error::{GuardianError, Result};
use crate::types::DecayWindow;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Polling slower than this lets a quick head turn exceed 180° between samples
const MAX_SAFE_POLL_INTERVAL_MS: u64 = 250;

/// Settings for the monitoring core
///
/// Every field has a default, so an empty TOML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Observer sampling interval
    pub poll_interval_ms: u64,
    /// Cadence of automatic re-open and companion-process checks
    pub maintenance_interval_ms: u64,
    /// Consecutive failed runtime initializations before giving up
    pub init_attempt_limit: u32,
    /// How long a remembered half-turn count stays valid (0 = forever, −1 = never)
    pub turn_memory_minutes: i32,
    pub notify_connection_lost: bool,
    /// Also alert when the runtime itself asked us to quit
    pub notify_on_api_quit: bool,
    pub play_jingle_on_interaction: bool,
    pub oculus_home_process: String,
    pub steamvr_process: String,
    pub autostart: AutoStartManifest,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 150,
            maintenance_interval_ms: 3000,
            init_attempt_limit: 10,
            turn_memory_minutes: 0,
            notify_connection_lost: true,
            notify_on_api_quit: false,
            play_jingle_on_interaction: false,
            oculus_home_process: "oculusclient".to_string(),
            steamvr_process: "vrserver".to_string(),
            autostart: AutoStartManifest::default(),
        }
    }
}

impl MonitorConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Loading monitor config");
        Self::from_toml_str(&text)
    }

    /// Reject values the monitor cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be greater than zero"));
        }
        if self.maintenance_interval_ms == 0 {
            return Err(invalid("maintenance_interval_ms", "must be greater than zero"));
        }
        if self.init_attempt_limit == 0 {
            return Err(invalid("init_attempt_limit", "must be at least 1"));
        }
        if DecayWindow::from_minutes(self.turn_memory_minutes).is_none() {
            return Err(invalid(
                "turn_memory_minutes",
                &format!("{} is not 0, -1 or a positive number of minutes", self.turn_memory_minutes),
            ));
        }
        if self.oculus_home_process.trim().is_empty() {
            return Err(invalid("oculus_home_process", "must not be empty"));
        }
        if self.steamvr_process.trim().is_empty() {
            return Err(invalid("steamvr_process", "must not be empty"));
        }
        if self.poll_interval_ms > MAX_SAFE_POLL_INTERVAL_MS {
            tracing::warn!(
                poll_interval_ms = self.poll_interval_ms,
                "Poll interval above {} ms; fast head turns may be miscounted",
                MAX_SAFE_POLL_INTERVAL_MS
            );
        }
        Ok(())
    }

    /// Observer tick interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Interval between connection maintenance passes
    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms)
    }

    /// Decay window for remembered counts; unbounded if the value is out of range
    pub fn decay_window(&self) -> DecayWindow {
        DecayWindow::from_minutes(self.turn_memory_minutes).unwrap_or(DecayWindow::Unbounded)
    }
}

fn invalid(field: &str, reason: &str) -> GuardianError {
    GuardianError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
