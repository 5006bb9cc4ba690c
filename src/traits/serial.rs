use crate::flasher::error::ResetError;

#[cfg(test)]
use mockall::automock;

/// Abstraction over the serial-line reset primitive.
/// This allows counting and faking resets in tests.
#[cfg_attr(test, automock)]
pub trait SerialReset: Send + Sync {
    /// Open the line, send a break, close it.
    fn reset(&self, serial_port: &str) -> Result<(), ResetError>;
}
