//! Serial-line board reset.
//!
//! mbed interface firmware resets the target MCU when it sees a break
//! condition on the virtual COM port.

use std::sync::Arc;
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use super::config::{BREAK_DURATION, RESET_BAUD_RATE, SERIAL_READ_TIMEOUT};
use super::error::ResetError;
use crate::traits::{FacadeLog, LogSink, SerialReset};

/// Resets a board by sending a break on its serial line.
pub struct SerialResetter {
    break_duration: Duration,
    log: Arc<dyn LogSink>,
}

impl SerialResetter {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self {
            break_duration: BREAK_DURATION,
            log,
        }
    }

    pub fn with_break_duration(mut self, break_duration: Duration) -> Self {
        self.break_duration = break_duration;
        self
    }

    fn open(&self, port_name: &str) -> Result<Box<dyn SerialPort>, ResetError> {
        let normalized = normalize_port_name(port_name);

        serialport::new(&normalized, RESET_BAUD_RATE)
            .timeout(SERIAL_READ_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| ResetError::PortUnavailable {
                port: port_name.to_string(),
                reason: describe_open_error(&e),
            })
    }

    /// Hold a break on the line for `break_duration`.
    fn send_break(&self, port: &dyn SerialPort) -> Result<(), ResetError> {
        port.set_break()?;
        std::thread::sleep(self.break_duration);
        port.clear_break()?;
        Ok(())
    }
}

impl Default for SerialResetter {
    fn default() -> Self {
        Self::new(Arc::new(FacadeLog::default()))
    }
}

impl SerialReset for SerialResetter {
    fn reset(&self, serial_port: &str) -> Result<(), ResetError> {
        let port = match self.open(serial_port) {
            Ok(port) => port,
            Err(e) => {
                self.log.info("reset could not be sent");
                self.log.error(&e.to_string());
                return Err(e);
            }
        };

        // Stale bytes from a previous session are irrelevant to the reset.
        if let Err(e) = port.clear(ClearBuffer::All) {
            self.log.debug(&format!("could not flush {}: {}", serial_port, e));
        }

        self.log.info("sendBreak to device to reboot");
        match self.send_break(&*port) {
            Ok(()) => self.log.info("reset completed"),
            // Not fatal: the board still restarts when it remounts.
            Err(e) => self.log.warn(&format!("reset failed on {}: {}", serial_port, e)),
        }

        drop(port);
        Ok(())
    }
}

fn describe_open_error(e: &serialport::Error) -> String {
    let err_str = e.to_string().to_lowercase();
    match e.kind() {
        serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
            "permission denied".to_string()
        }
        serialport::ErrorKind::Io(std::io::ErrorKind::NotFound)
        | serialport::ErrorKind::NoDevice => "device not found".to_string(),
        _ if err_str.contains("busy") || err_str.contains("in use") => {
            "port is busy; close other serial connections to the device".to_string()
        }
        _ => e.to_string(),
    }
}

/// Normalize a port name for cross-platform compatibility.
pub fn normalize_port_name(name: &str) -> String {
    #[cfg(target_os = "macos")]
    {
        // Prefer cu. over tty. for better compatibility
        if name.starts_with("/dev/tty.") {
            return name.replace("/dev/tty.", "/dev/cu.");
        }
    }

    #[cfg(target_os = "windows")]
    {
        // COM ports > 9 need \\.\\ prefix
        if let Some(number) = name.strip_prefix("COM") {
            if let Ok(n) = number.parse::<u32>() {
                if n > 9 {
                    return format!("\\\\.\\{}", name);
                }
            }
        }
    }

    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingLog;

    #[test]
    fn test_normalize_port_name_passthrough() {
        assert_eq!(normalize_port_name("/dev/ttyACM0"), "/dev/ttyACM0");
        assert_eq!(normalize_port_name("COM1"), "COM1");
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_normalize_port_name_macos_tty_to_cu() {
        assert_eq!(
            normalize_port_name("/dev/tty.usbmodem1234"),
            "/dev/cu.usbmodem1234"
        );
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn test_normalize_port_name_windows_high_com() {
        assert_eq!(normalize_port_name("COM9"), "COM9");
        assert_eq!(normalize_port_name("COM10"), "\\\\.\\COM10");
    }

    #[cfg(unix)]
    #[test]
    fn test_reset_missing_port_is_unavailable() {
        let log = Arc::new(RecordingLog::default());
        let resetter = SerialResetter::new(log.clone());

        let result = resetter.reset("/dev/mbed-flasher-no-such-port");

        assert!(matches!(
            result,
            Err(ResetError::PortUnavailable { ref port, .. }) if port == "/dev/mbed-flasher-no-such-port"
        ));
        assert!(log.contains(log::Level::Info, "reset could not be sent"));
    }
}
