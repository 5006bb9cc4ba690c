use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use log::Level;

use crate::flasher::error::{IdentityError, ResetError};
use crate::flasher::identity::IdentityResolver;
use crate::flasher::target::TargetDescriptor;
use crate::settings::FlasherSettings;
use crate::traits::{LogSink, SerialReset};

pub const TEST_TARGET_ID: &str = "0240000032044e4500257009997b00386781000097969900";

/// Settings with every delay shrunk so a full flash runs in well under a second.
pub fn fast_settings() -> FlasherSettings {
    FlasherSettings {
        settle_delay_ms: 0,
        remount_timeout_ms: 200,
        remount_poll_interval_ms: 20,
        mount_poll_attempts: 2,
        mount_poll_interval_ms: 10,
        break_duration_ms: 0,
        pre_write_reset_delay_ms: 0,
        post_write_reset_delay_ms: 0,
        probe_reset_delay_ms: 0,
        ..FlasherSettings::default()
    }
}

/// Builder for creating test TargetDescriptor instances
pub struct TargetBuilder {
    target_id: String,
    serial_port: Option<String>,
    mount_point: PathBuf,
    dev_point: Option<PathBuf>,
}

impl TargetBuilder {
    pub fn new() -> Self {
        Self {
            target_id: TEST_TARGET_ID.to_string(),
            serial_port: None,
            mount_point: PathBuf::from("/media/user/DAPLINK"),
            dev_point: None,
        }
    }

    pub fn target_id(mut self, target_id: &str) -> Self {
        self.target_id = target_id.to_string();
        self
    }

    pub fn serial_port(mut self, port: &str) -> Self {
        self.serial_port = Some(port.to_string());
        self
    }

    pub fn mount_point(mut self, mount_point: impl Into<PathBuf>) -> Self {
        self.mount_point = mount_point.into();
        self
    }

    pub fn dev_point(mut self, dev_point: impl Into<PathBuf>) -> Self {
        self.dev_point = Some(dev_point.into());
        self
    }

    pub fn build(self) -> TargetDescriptor {
        TargetDescriptor {
            target_id: self.target_id,
            serial_port: self.serial_port,
            mount_point: self.mount_point,
            dev_point: self.dev_point,
        }
    }
}

impl Default for TargetBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Log sink that keeps every message for later assertions.
#[derive(Default)]
pub struct RecordingLog {
    entries: Mutex<Vec<(Level, String)>>,
}

impl RecordingLog {
    pub fn entries(&self) -> Vec<(Level, String)> {
        self.entries.lock().unwrap().clone()
    }

    /// True if some message at `level` contains `needle`.
    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }
}

impl LogSink for RecordingLog {
    fn log(&self, level: Level, message: &str) {
        self.entries.lock().unwrap().push((level, message.to_string()));
    }
}

/// Serial resetter that only records the ports it was asked to reset.
#[derive(Default)]
pub struct FakeResetter {
    calls: Mutex<Vec<String>>,
}

impl FakeResetter {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl SerialReset for FakeResetter {
    fn reset(&self, serial_port: &str) -> Result<(), ResetError> {
        self.calls.lock().unwrap().push(serial_port.to_string());
        Ok(())
    }
}

/// What a simulated board does with an image dropped on its drive.
#[derive(Debug, Clone)]
pub enum BoardBehavior {
    /// Flash it, remove it and show the status page.
    Consume,
    /// Flash it and remove it, but never show a status page.
    ConsumeSilently,
    /// Reject it with FAIL.TXT.
    Fail(String),
    /// Hit an assertion and write ASSERT.TXT.
    Assert(String),
    /// Leave the image untouched.
    Ignore,
    /// Consume it and re-enumerate on a new port and drive.
    Move {
        serial_port: String,
        mount_point: PathBuf,
    },
}

/// Identity resolver that plays the board's part during the settle window.
///
/// The drive is modified when the orchestrator asks for the board's
/// identity, which is after the write and before the remount wait.
pub struct SimulatedBoard {
    behavior: BoardBehavior,
    resolve_calls: AtomicUsize,
}

impl SimulatedBoard {
    pub fn new(behavior: BoardBehavior) -> Self {
        Self {
            behavior,
            resolve_calls: AtomicUsize::new(0),
        }
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

impl IdentityResolver for SimulatedBoard {
    fn resolve(&self, previous: &TargetDescriptor) -> Result<TargetDescriptor, IdentityError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let drive = previous.mount_point.as_path();

        match &self.behavior {
            BoardBehavior::Consume => {
                remove_images(drive)?;
                fs::write(drive.join("MBED.HTM"), "<html></html>")?;
            }
            BoardBehavior::ConsumeSilently => {
                remove_images(drive)?;
                fs::write(drive.join("DETAILS.TXT"), "Version: 0254")?;
            }
            BoardBehavior::Fail(reason) => {
                remove_images(drive)?;
                fs::write(drive.join("FAIL.TXT"), reason)?;
                fs::write(drive.join("MBED.HTM"), "<html></html>")?;
            }
            BoardBehavior::Assert(reason) => {
                remove_images(drive)?;
                fs::write(drive.join("ASSERT.TXT"), reason)?;
                fs::write(drive.join("MBED.HTM"), "<html></html>")?;
            }
            BoardBehavior::Ignore => {}
            BoardBehavior::Move {
                serial_port,
                mount_point,
            } => {
                remove_images(drive)?;
                fs::write(mount_point.join("MBED.HTM"), "<html></html>")?;
                return Ok(TargetDescriptor {
                    serial_port: Some(serial_port.clone()),
                    mount_point: mount_point.clone(),
                    ..previous.clone()
                });
            }
        }

        Ok(previous.clone())
    }
}

fn remove_images(drive: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(drive)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("bin") || e.eq_ignore_ascii_case("hex"))
            .unwrap_or(false);
        if is_image {
            fs::remove_file(path)?;
        }
    }
    Ok(())
}
