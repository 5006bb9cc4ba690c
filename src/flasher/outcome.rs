//! Terminal results of a flash attempt.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Serialize, Serializer};

use super::error::{IdentityError, ProbeError};
use super::remount::RemountResult;
use super::target::TargetDescriptor;

/// Result of one flash attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum FlashOutcome {
    /// The board consumed the image and reported no error.
    Success,
    /// The board wrote FAIL.TXT or ASSERT.TXT; carries its trimmed contents.
    DeviceReportedFailure(String),
    /// No error file, but the image is still on the drive.
    FileStillPresent,
    /// Tooling-side I/O failure, with the OS error kind preserved.
    IoError(#[serde(serialize_with = "serialize_error_kind")] io::ErrorKind),
    /// The board could not be mapped to a single identity.
    IdentityConflict(String),
    /// The board did not come back within its budget.
    Timeout,
}

impl FlashOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FlashOutcome::Success)
    }

    /// Short machine-friendly name.
    pub fn label(&self) -> &'static str {
        match self {
            FlashOutcome::Success => "success",
            FlashOutcome::DeviceReportedFailure(_) => "device_reported_failure",
            FlashOutcome::FileStillPresent => "file_still_present",
            FlashOutcome::IoError(_) => "io_error",
            FlashOutcome::IdentityConflict(_) => "identity_conflict",
            FlashOutcome::Timeout => "timeout",
        }
    }

    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            FlashOutcome::Success => 0,
            FlashOutcome::DeviceReportedFailure(_) => 4,
            FlashOutcome::IoError(io::ErrorKind::Unsupported) => 7,
            FlashOutcome::IdentityConflict(_) => 10,
            FlashOutcome::Timeout => 12,
            FlashOutcome::IoError(_) => 14,
            FlashOutcome::FileStillPresent => 15,
        }
    }
}

impl fmt::Display for FlashOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashOutcome::Success => write!(f, "flashing succeeded"),
            FlashOutcome::DeviceReportedFailure(message) => {
                write!(f, "board reported failure: {}", message)
            }
            FlashOutcome::FileStillPresent => write!(f, "file still present in mount point"),
            FlashOutcome::IoError(kind) => write!(f, "I/O error: {}", kind),
            FlashOutcome::IdentityConflict(reason) => write!(f, "identity conflict: {}", reason),
            FlashOutcome::Timeout => write!(f, "board did not remount in time"),
        }
    }
}

impl From<IdentityError> for FlashOutcome {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::AmbiguousIdentity { .. } => {
                FlashOutcome::IdentityConflict(err.to_string())
            }
            IdentityError::RemountNotObserved { .. } => FlashOutcome::Timeout,
            IdentityError::Io(e) => FlashOutcome::IoError(e.kind()),
        }
    }
}

impl From<ProbeError> for FlashOutcome {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::Connectivity(_) => FlashOutcome::IoError(io::ErrorKind::NotConnected),
            ProbeError::Failed(message) => FlashOutcome::DeviceReportedFailure(message),
        }
    }
}

impl From<io::Error> for FlashOutcome {
    fn from(err: io::Error) -> Self {
        FlashOutcome::IoError(err.kind())
    }
}

fn serialize_error_kind<S: Serializer>(kind: &io::ErrorKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{:?}", kind))
}

/// Everything observed during one flash attempt.
#[derive(Debug, Clone, Serialize)]
pub struct FlashReport {
    pub target_id: String,
    pub outcome: FlashOutcome,
    /// The board's identity after remount, when resolution ran.
    pub resolved_target: Option<TargetDescriptor>,
    /// Where the image was written.
    pub destination: Option<PathBuf>,
    /// SHA-256 of the bytes written, hex encoded.
    pub image_sha256: Option<String>,
    pub image_size: Option<usize>,
    pub remount: Option<RemountResult>,
    /// RFC 3339 start time.
    pub started_at: String,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl FlashReport {
    pub(crate) fn new(target_id: &str) -> Self {
        Self {
            target_id: target_id.to_string(),
            outcome: FlashOutcome::Success,
            resolved_target: None,
            destination: None,
            image_sha256: None,
            image_size: None,
            remount: None,
            started_at: chrono::Utc::now().to_rfc3339(),
            elapsed: Duration::ZERO,
        }
    }
}

fn serialize_millis<S: Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(elapsed.as_millis() as u64)
}
