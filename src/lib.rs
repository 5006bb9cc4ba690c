//! Flash firmware onto mbed boards exposed as USB mass-storage drives.

pub mod commands;
pub mod flasher;
pub mod settings;
pub mod traits;

#[cfg(test)]
mod test_helpers;
