use std::path::Path;

use crate::flasher::error::ProbeError;

#[cfg(test)]
use mockall::automock;

/// Debug-probe flashing collaborator.
///
/// The probe path is a black box: the orchestrator only connects to a board,
/// resets it, hands it the image and resets it again.
#[cfg_attr(test, automock)]
pub trait DebugProbe: Send + Sync {
    /// Attach to the board identified by `target_id`.
    fn connect(&self, target_id: &str) -> Result<Box<dyn BoardHandle>, ProbeError>;
}

/// A connected board, released when dropped.
#[cfg_attr(test, automock)]
pub trait BoardHandle: Send {
    fn reset(&mut self) -> Result<(), ProbeError>;

    fn flash(&mut self, source: &Path) -> Result<(), ProbeError>;
}
