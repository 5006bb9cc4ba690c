//! Error types for the flashing pipeline.
//!
//! None of these leave the orchestrator: each is folded into a
//! [`FlashOutcome`](super::outcome::FlashOutcome) or logged and dropped.

use std::io;

use thiserror::Error;

/// Errors raised while resetting a board over its serial line.
///
/// Always non-fatal to a flash: the caller logs and carries on.
#[derive(Debug, Error)]
pub enum ResetError {
    /// The line could not be opened; the board is likely gone or the port is
    /// held by another program.
    #[error("Serial port '{port}' unavailable: {reason}")]
    PortUnavailable { port: String, reason: String },

    /// The line opened but the break could not be set or cleared.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

/// Errors raised while re-identifying a board after it remounted.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// More than one device node in a namespace carries the target id.
    #[error("target_id {target_id} has more than one {namespace} entry in the system")]
    AmbiguousIdentity {
        target_id: String,
        namespace: &'static str,
    },

    /// The block device never showed up in the mount table.
    #[error("{fs_type} mount point for {target_id} ({dev_point}) did not re-appear after {attempts} attempts")]
    RemountNotObserved {
        target_id: String,
        dev_point: String,
        fs_type: &'static str,
        attempts: u32,
    },

    /// A namespace directory or the mount table could not be read.
    #[error("I/O error while resolving identity: {0}")]
    Io(#[from] io::Error),
}

/// Errors reported by the debug-probe collaborator.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The probe could not reach the board.
    #[error("Probe connectivity error: {0}")]
    Connectivity(String),

    /// The probe reached the board but the operation failed.
    #[error("Probe operation failed: {0}")]
    Failed(String),
}
