//! Board identity and flash request types.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A board as currently known to the caller.
///
/// The descriptor may go stale once the board remounts; the flasher never
/// mutates the caller's copy and hands back a fresh one instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Opaque board identifier (the interface chip's USB serial number).
    pub target_id: String,
    /// Serial port path (e.g., "/dev/ttyACM0" or "COM3").
    #[serde(default)]
    pub serial_port: Option<String>,
    /// Where the board's drive is mounted.
    pub mount_point: PathBuf,
    /// Block device backing the drive, when known.
    #[serde(default)]
    pub dev_point: Option<PathBuf>,
}

impl TargetDescriptor {
    pub fn new(target_id: impl Into<String>, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            target_id: target_id.into(),
            serial_port: None,
            mount_point: mount_point.into(),
            dev_point: None,
        }
    }

    pub fn with_serial_port(mut self, serial_port: impl Into<String>) -> Self {
        self.serial_port = Some(serial_port.into());
        self
    }

    pub fn with_dev_point(mut self, dev_point: impl Into<PathBuf>) -> Self {
        self.dev_point = Some(dev_point.into());
        self
    }
}

/// How the image reaches the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FlashMethod {
    /// Copy the image onto the board's mass-storage drive.
    #[default]
    DirectCopy,
    /// Program through a debug probe.
    DebugProbe,
}

/// One flash invocation. Immutable for its duration.
#[derive(Debug, Clone)]
pub struct FlashRequest {
    /// Path to the firmware image.
    pub source: PathBuf,
    pub target: TargetDescriptor,
    pub method: FlashMethod,
    /// Skip both serial resets.
    pub suppress_reset: bool,
}

impl FlashRequest {
    pub fn new(source: impl Into<PathBuf>, target: TargetDescriptor) -> Self {
        Self {
            source: source.into(),
            target,
            method: FlashMethod::DirectCopy,
            suppress_reset: false,
        }
    }

    pub fn method(mut self, method: FlashMethod) -> Self {
        self.method = method;
        self
    }

    pub fn suppress_reset(mut self, suppress: bool) -> Self {
        self.suppress_reset = suppress;
        self
    }

    /// File name the image is written under on the board's drive.
    pub fn image_filename(&self) -> Option<&OsStr> {
        self.source.file_name()
    }
}

/// Destination of an image on a mounted drive.
pub fn destination_path(mount_point: &Path, filename: &OsStr) -> PathBuf {
    mount_point.join(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_filename_is_basename() {
        let request = FlashRequest::new(
            "/home/user/build/blinky.bin",
            TargetDescriptor::new("0240", "/media/DAPLINK"),
        );
        assert_eq!(request.image_filename(), Some(OsStr::new("blinky.bin")));
        assert_eq!(
            destination_path(&request.target.mount_point, OsStr::new("blinky.bin")),
            PathBuf::from("/media/DAPLINK/blinky.bin")
        );
    }

    #[test]
    fn test_request_defaults() {
        let request = FlashRequest::new("a.bin", TargetDescriptor::new("0240", "/mnt"));
        assert_eq!(request.method, FlashMethod::DirectCopy);
        assert!(!request.suppress_reset);
    }

    #[test]
    fn test_descriptor_deserializes_without_optional_fields() {
        let json = r#"{"target_id": "0240", "mount_point": "/media/DAPLINK"}"#;
        let target: TargetDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(target, TargetDescriptor::new("0240", "/media/DAPLINK"));
    }

    #[test]
    fn test_flash_method_serde_names() {
        let method: FlashMethod = serde_json::from_str("\"debug-probe\"").unwrap();
        assert_eq!(method, FlashMethod::DebugProbe);
        assert_eq!(
            serde_json::to_string(&FlashMethod::DirectCopy).unwrap(),
            "\"direct-copy\""
        );
    }
}
