pub mod enumerator;
pub mod log_sink;
pub mod probe;
pub mod serial;

pub use enumerator::{DeviceEnumerator, SerialPortEnumerator};
pub use log_sink::{FacadeLog, LogSink};
pub use probe::{BoardHandle, DebugProbe};
pub use serial::SerialReset;

#[cfg(test)]
pub use enumerator::MockDeviceEnumerator;
#[cfg(test)]
pub use probe::{MockBoardHandle, MockDebugProbe};
#[cfg(test)]
pub use serial::MockSerialReset;
