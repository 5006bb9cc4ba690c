//! Mount table parsing.
//!
//! Only this module knows the textual layout of `/proc/mounts`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One row of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: PathBuf,
    pub mount_point: PathBuf,
    pub fs_type: String,
}

/// Read and parse a mount table file.
pub fn read_mount_table(path: &Path) -> io::Result<Vec<MountEntry>> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_mount_table(&contents))
}

/// Parse mount table text in fstab format.
///
/// Malformed lines are skipped.
pub fn parse_mount_table(contents: &str) -> Vec<MountEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let device = fields.next()?;
            let mount_point = fields.next()?;
            let fs_type = fields.next()?;
            Some(MountEntry {
                device: PathBuf::from(unescape_octal(device)),
                mount_point: PathBuf::from(unescape_octal(mount_point)),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Find where `device` is mounted with the given filesystem type.
pub fn find_mount<'a>(
    entries: &'a [MountEntry],
    device: &Path,
    fs_type: &str,
) -> Option<&'a MountEntry> {
    entries
        .iter()
        .find(|entry| entry.fs_type == fs_type && entry.device == device)
}

/// Undo the kernel's `\ooo` escaping of whitespace and backslashes.
fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() && is_octal_triplet(&bytes[i + 1..i + 4]) {
            let value = (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn is_octal_triplet(digits: &[u8]) -> bool {
    digits.len() == 3 && digits[0] <= b'3' && digits.iter().all(|d| (b'0'..=b'7').contains(d))
}
