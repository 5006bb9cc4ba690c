//! Stand-alone serial reset of a board.

use std::sync::Arc;

use crate::flasher::SerialResetter;
use crate::settings::FlasherSettings;
use crate::traits::{FacadeLog, SerialReset};

/// Send a break on `serial_port` without flashing anything.
pub async fn reset_board(settings: FlasherSettings, serial_port: String) -> Result<(), String> {
    tokio::task::spawn_blocking(move || {
        let log = Arc::new(FacadeLog::new(settings.log_target.clone()));
        SerialResetter::new(log)
            .with_break_duration(settings.break_duration())
            .reset(&serial_port)
            .map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| format!("Reset task failed: {}", e))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reset_unknown_port_reports_port() {
        let err = reset_board(FlasherSettings::default(), "/dev/mbed-flasher-missing".into())
            .await
            .unwrap_err();

        assert!(err.contains("/dev/mbed-flasher-missing"));
    }
}
