//! Firmware image handling: reading, hashing and writing to the board.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Read a whole firmware image.
///
/// An empty image is rejected: the board would silently ignore it.
pub fn read_image(path: &Path) -> io::Result<Vec<u8>> {
    let data = fs::read(path)?;
    if data.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("firmware image {} is empty", path.display()),
        ));
    }
    Ok(data)
}

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Write `data` to `destination`, bypassing the page cache where possible.
///
/// Returns only once the bytes have reached the board's drive.
pub fn write_image(destination: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = open_unbuffered(destination)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(unix)]
fn open_unbuffered(destination: &Path) -> io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .custom_flags(libc::O_SYNC)
        .open(destination)
}

#[cfg(windows)]
fn open_unbuffered(destination: &Path) -> io::Result<fs::File> {
    use std::os::windows::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .custom_flags(winapi::um::winbase::FILE_FLAG_WRITE_THROUGH)
        .open(destination)
}

#[cfg(not(any(unix, windows)))]
fn open_unbuffered(destination: &Path) -> io::Result<fs::File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestContext;

    #[test]
    fn test_sha256_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_read_empty_image_fails() {
        let ctx = TestContext::new();
        let path = ctx.touch("empty.bin");

        let err = read_image(&path).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_read_missing_image_fails() {
        let ctx = TestContext::new();
        let err = read_image(&ctx.path("missing.bin")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_written_image_reads_back_identically() {
        let ctx = TestContext::new();
        let image: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let source = ctx.create_file_bytes("build/blinky.bin", &image);
        let mount = ctx.create_mount_point("DAPLINK");
        let destination = mount.join("blinky.bin");

        let data = read_image(&source).unwrap();
        write_image(&destination, &data).unwrap();

        let readback = fs::read(&destination).unwrap();
        assert_eq!(readback, image);
        assert_eq!(sha256_hex(&readback), sha256_hex(&data));
    }

    #[test]
    fn test_write_truncates_previous_image() {
        let ctx = TestContext::new();
        let destination = ctx.create_file_bytes("DAPLINK/blinky.bin", &[0xAA; 64]);

        write_image(&destination, &[1, 2, 3]).unwrap();

        assert_eq!(fs::read(&destination).unwrap(), vec![1, 2, 3]);
    }
}
