//! Flashing for mbed boards that expose a USB mass-storage drive.
//!
//! The board's interface firmware programs the target when an image file is
//! copied onto its drive, then re-attaches the drive with a status page and
//! optionally a `FAIL.TXT` or `ASSERT.TXT` describing what went wrong. The
//! board may come back on a different serial port and drive, so its identity
//! is resolved again from its target id before the result is read.
//!
//! # Flow Overview
//!
//! 1. **Reset** - Serial break on the board's port
//! 2. **Write** - Image copied to the drive, bypassing the page cache
//! 3. **Settle** - Fixed wait for the bootloader to notice the file
//! 4. **Resolve** - Serial port and drive re-discovered by target id
//! 5. **Remount** - Drive polled until the status page appears
//! 6. **Reset** - Serial break on the possibly new port
//! 7. **Verify** - Marker files and the leftover image inspected
//!
//! # Example
//!
//! ```ignore
//! use mbed_flasher::flasher::{FlashOrchestrator, FlashRequest, TargetDescriptor};
//!
//! let target = TargetDescriptor::new("0240000032044e45", "/media/user/DAPLINK")
//!     .with_serial_port("/dev/ttyACM0");
//! let orchestrator = FlashOrchestrator::system(Default::default());
//! let outcome = orchestrator.flash(&FlashRequest::new("blinky.bin", target));
//! std::process::exit(outcome.exit_code());
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod image;
pub mod mounts;
pub mod orchestrator;
pub mod outcome;
pub mod remount;
pub mod reset;
pub mod target;

pub use error::{IdentityError, ProbeError, ResetError};
pub use identity::{
    platform_resolver, ByIdResolver, EnumeratorResolver, IdentityResolver, PassthroughResolver,
};
pub use orchestrator::FlashOrchestrator;
pub use outcome::{FlashOutcome, FlashReport};
pub use remount::{CancelToken, RemountResult, RemountStatus, RemountWatcher};
pub use reset::SerialResetter;
pub use target::{FlashMethod, FlashRequest, TargetDescriptor};
