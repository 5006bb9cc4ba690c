//! Configuration constants for flashing mbed boards over their USB drive.

use std::time::Duration;

// ============================================================================
// Serial Reset
// ============================================================================

/// Baud rate used when opening the board's serial line for a reset.
pub const RESET_BAUD_RATE: u32 = 115_200;

/// Read timeout of the reset line.
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// How long the break condition is held on the line.
pub const BREAK_DURATION: Duration = Duration::from_millis(250);

/// Pause after the reset issued before writing the image.
pub const PRE_WRITE_RESET_DELAY: Duration = Duration::from_millis(100);

/// Pause after the reset issued once the image has been consumed.
pub const POST_WRITE_RESET_DELAY: Duration = Duration::from_millis(400);

// ============================================================================
// Mass-Storage Protocol
// ============================================================================

/// Written by the interface firmware when programming failed.
pub const FAIL_MARKER: &str = "FAIL.TXT";

/// Written by the interface firmware when it hit an internal assertion.
pub const ASSERT_MARKER: &str = "ASSERT.TXT";

/// Extension of the transient status page shown after a remount.
pub const STATUS_PAGE_EXTENSION: &str = "HTM";

/// Time given to the bootloader to notice the new file before it detaches.
pub const SETTLE_DELAY: Duration = Duration::from_millis(4000);

// ============================================================================
// Remount Detection
// ============================================================================

/// Interval between directory listings of the mount point.
pub const REMOUNT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Upper bound on waiting for the board to remount.
/// Matches the verification timeout of the mbed tooling.
pub const REMOUNT_TIMEOUT: Duration = Duration::from_secs(100);

/// Number of mount-table scans before giving up on a block device.
pub const MOUNT_POLL_ATTEMPTS: u32 = 10;

/// Interval between mount-table scans.
pub const MOUNT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Filesystem type the interface firmware exposes.
pub const MASS_STORAGE_FS_TYPE: &str = "vfat";

// ============================================================================
// Debug Probe
// ============================================================================

/// Pause before each probe reset; slower hosts need it.
pub const PROBE_RESET_DELAY: Duration = Duration::from_millis(500);

// ============================================================================
// Platform Paths
// ============================================================================

/// Stable serial-port symlinks, keyed by USB identity.
pub const SERIAL_BY_ID_DIR: &str = "/dev/serial/by-id";

/// Stable block-device symlinks, keyed by USB identity.
pub const DISK_BY_ID_DIR: &str = "/dev/disk/by-id";

/// Kernel mount table.
pub const MOUNT_TABLE_PATH: &str = "/proc/mounts";

/// Directory device nodes live in.
pub const DEV_DIR: &str = "/dev";

/// Log target used when the caller does not choose one.
pub const DEFAULT_LOG_TARGET: &str = "mbed_flasher";

// ============================================================================
// Helper Functions
// ============================================================================

/// Check whether a directory entry is the board's status page.
pub fn is_status_page(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(STATUS_PAGE_EXTENSION))
}

/// Check whether a directory entry names the given file.
///
/// FAT is case-insensitive, so listings may not preserve the case we wrote.
pub fn is_same_entry(entry: &str, filename: &str) -> bool {
    entry.eq_ignore_ascii_case(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_status_page() {
        assert!(is_status_page("MBED.HTM"));
        assert!(is_status_page("details.htm"));
        assert!(!is_status_page("DETAILS.TXT"));
        assert!(!is_status_page("HTM"));
        assert!(!is_status_page("firmware.bin"));
    }

    #[test]
    fn test_is_same_entry_ignores_case() {
        assert!(is_same_entry("BLINKY.BIN", "blinky.bin"));
        assert!(!is_same_entry("BLINKY.BIN", "blinky.hex"));
    }

    #[test]
    fn test_remount_timings_are_ordered() {
        assert!(REMOUNT_POLL_INTERVAL < REMOUNT_TIMEOUT);
        assert!(MOUNT_POLL_INTERVAL * MOUNT_POLL_ATTEMPTS < REMOUNT_TIMEOUT);
    }
}
