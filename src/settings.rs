//! Flasher tunables with JSON persistence.
//!
//! Every field has a default matching the mbed interface firmware's observed
//! timing, so a settings file only needs the values it overrides.
//!
//! ## Extensibility
//!
//! To add a setting:
//! 1. Add the field to `FlasherSettings` and its default to `Default`
//! 2. Thread it to the component that needs it in `FlashOrchestrator::new`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::flasher::config::{
    BREAK_DURATION, DEFAULT_LOG_TARGET, MOUNT_POLL_ATTEMPTS, MOUNT_POLL_INTERVAL,
    POST_WRITE_RESET_DELAY, PRE_WRITE_RESET_DELAY, PROBE_RESET_DELAY, REMOUNT_POLL_INTERVAL,
    REMOUNT_TIMEOUT, SETTLE_DELAY,
};

/// Timing and policy knobs for a flash run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FlasherSettings {
    /// Wait between writing the image and re-identifying the board.
    pub settle_delay_ms: u64,

    /// Upper bound on the remount wait.
    pub remount_timeout_ms: u64,

    /// Interval between listings of the mount point.
    pub remount_poll_interval_ms: u64,

    /// Mount-table scans before a block device is declared lost.
    pub mount_poll_attempts: u32,

    /// Interval between mount-table scans.
    pub mount_poll_interval_ms: u64,

    /// How long the break is held on the serial line.
    pub break_duration_ms: u64,

    /// Pause after the reset before the write.
    pub pre_write_reset_delay_ms: u64,

    /// Pause after the reset after the remount.
    pub post_write_reset_delay_ms: u64,

    /// Pause before each debug-probe reset.
    pub probe_reset_delay_ms: u64,

    /// Report `Timeout` instead of `Success` when the remount wait timed out.
    pub strict_remount: bool,

    /// `log` target used for flasher diagnostics.
    pub log_target: String,
}

impl Default for FlasherSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: millis(SETTLE_DELAY),
            remount_timeout_ms: millis(REMOUNT_TIMEOUT),
            remount_poll_interval_ms: millis(REMOUNT_POLL_INTERVAL),
            mount_poll_attempts: MOUNT_POLL_ATTEMPTS,
            mount_poll_interval_ms: millis(MOUNT_POLL_INTERVAL),
            break_duration_ms: millis(BREAK_DURATION),
            pre_write_reset_delay_ms: millis(PRE_WRITE_RESET_DELAY),
            post_write_reset_delay_ms: millis(POST_WRITE_RESET_DELAY),
            probe_reset_delay_ms: millis(PROBE_RESET_DELAY),
            strict_remount: false,
            log_target: DEFAULT_LOG_TARGET.to_string(),
        }
    }
}

impl FlasherSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn remount_timeout(&self) -> Duration {
        Duration::from_millis(self.remount_timeout_ms)
    }

    pub fn remount_poll_interval(&self) -> Duration {
        Duration::from_millis(self.remount_poll_interval_ms)
    }

    pub fn mount_poll_interval(&self) -> Duration {
        Duration::from_millis(self.mount_poll_interval_ms)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_millis(self.break_duration_ms)
    }

    pub fn pre_write_reset_delay(&self) -> Duration {
        Duration::from_millis(self.pre_write_reset_delay_ms)
    }

    pub fn post_write_reset_delay(&self) -> Duration {
        Duration::from_millis(self.post_write_reset_delay_ms)
    }

    pub fn probe_reset_delay(&self) -> Duration {
        Duration::from_millis(self.probe_reset_delay_ms)
    }

    /// Check if these settings differ from defaults.
    pub fn has_non_default_settings(&self) -> bool {
        *self != Self::default()
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Manages persistence of flasher settings to a JSON file.
pub struct SettingsManager {
    settings_file_path: PathBuf,
}

impl SettingsManager {
    pub fn new(settings_file_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_file_path: settings_file_path.into(),
        }
    }

    /// Load settings from disk, returning defaults if file doesn't exist.
    pub fn load(&self) -> Result<FlasherSettings, String> {
        if !self.settings_file_path.exists() {
            return Ok(FlasherSettings::default());
        }

        let contents = fs::read_to_string(&self.settings_file_path)
            .map_err(|e| format!("Failed to read settings file: {}", e))?;

        // Handle empty file gracefully
        if contents.trim().is_empty() {
            return Ok(FlasherSettings::default());
        }

        serde_json::from_str(&contents)
            .map_err(|e| format!("Failed to parse settings JSON: {}", e))
    }

    /// Save settings to disk.
    pub fn save(&self, settings: &FlasherSettings) -> Result<(), String> {
        if let Some(parent) = self.settings_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create settings directory: {}", e))?;
            }
        }

        let contents = serde_json::to_string_pretty(settings)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        fs::write(&self.settings_file_path, contents)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }

    /// Get the path where settings are stored.
    pub fn settings_path(&self) -> &Path {
        &self.settings_file_path
    }
}
