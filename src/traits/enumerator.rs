//! Device enumeration seam.
//!
//! Discovery itself belongs to the caller; the flasher only needs to ask
//! which serial port a known board is currently attached to.

use serialport::{available_ports, SerialPortType};

#[cfg(test)]
use mockall::automock;

/// Looks up the current serial port of a board by its target id.
#[cfg_attr(test, automock)]
pub trait DeviceEnumerator: Send + Sync {
    /// Return the port name the board is attached to, if it is present.
    fn serial_port_for(&self, target_id: &str) -> Option<String>;
}

/// Enumerates USB serial ports through the OS device-management APIs.
///
/// mbed interface chips report the target id as their USB serial number.
#[derive(Debug, Default)]
pub struct SerialPortEnumerator;

impl DeviceEnumerator for SerialPortEnumerator {
    fn serial_port_for(&self, target_id: &str) -> Option<String> {
        let ports = match available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                log::debug!("serial port enumeration failed: {}", e);
                return None;
            }
        };

        ports.into_iter().find_map(|port| {
            // Each USB serial device appears as both /dev/cu.* and /dev/tty.*
            #[cfg(target_os = "macos")]
            if port.port_name.contains("/dev/tty.") {
                return None;
            }

            match &port.port_type {
                SerialPortType::UsbPort(usb_info)
                    if serial_matches(usb_info.serial_number.as_deref(), target_id) =>
                {
                    Some(port.port_name.clone())
                }
                _ => None,
            }
        })
    }
}

/// Some hosts truncate the reported serial number, so a prefix match in
/// either direction counts.
fn serial_matches(serial_number: Option<&str>, target_id: &str) -> bool {
    match serial_number {
        Some(serial) if !serial.is_empty() && !target_id.is_empty() => {
            serial.eq_ignore_ascii_case(target_id)
                || target_id.starts_with(serial)
                || serial.starts_with(target_id)
        }
        _ => false,
    }
}
