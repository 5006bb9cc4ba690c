//! Command handlers behind the `mbed-flasher` CLI.
//!
//! Each handler takes already-parsed arguments and returns data for the
//! caller to print, so they can be driven from tests without a terminal.

pub mod flash;
pub mod reset;
pub mod settings;
