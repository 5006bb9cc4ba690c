//! End-to-end flash sequence for one board.
//!
//! Direct copy:
//! 1. Serial reset (unless suppressed)
//! 2. Read the image and hash it
//! 3. Write it to the board's drive, bypassing the page cache
//! 4. Settle delay so the bootloader notices the file
//! 5. Re-resolve the board's identity
//! 6. Wait for the remount (advisory)
//! 7. Serial reset on the possibly new port (unless suppressed)
//! 8. Inspect the drive for FAIL.TXT, ASSERT.TXT or the leftover image
//!
//! Debug probe: connect, reset, flash, reset; nothing else applies.

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use super::config::{ASSERT_MARKER, FAIL_MARKER};
use super::error::ProbeError;
use super::identity::{platform_resolver, IdentityResolver};
use super::image::{read_image, sha256_hex, write_image};
use super::outcome::{FlashOutcome, FlashReport};
use super::remount::{CancelToken, RemountResult, RemountWatcher};
use super::reset::SerialResetter;
use super::target::{destination_path, FlashMethod, FlashRequest, TargetDescriptor};
use crate::settings::FlasherSettings;
use crate::traits::{DebugProbe, FacadeLog, LogSink, SerialReset};

/// Drives one flash attempt at a time for one board.
///
/// Instances share no mutable state, so boards can be flashed in parallel
/// with one orchestrator each.
pub struct FlashOrchestrator {
    settings: FlasherSettings,
    resetter: Arc<dyn SerialReset>,
    resolver: Arc<dyn IdentityResolver>,
    probe: Option<Arc<dyn DebugProbe>>,
    cancel: CancelToken,
    log: Arc<dyn LogSink>,
}

impl FlashOrchestrator {
    pub fn new(
        settings: FlasherSettings,
        resetter: Arc<dyn SerialReset>,
        resolver: Arc<dyn IdentityResolver>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            settings,
            resetter,
            resolver,
            probe: None,
            cancel: CancelToken::new(),
            log,
        }
    }

    /// Orchestrator wired to the real serial line and the platform's
    /// identity strategy.
    pub fn system(settings: FlasherSettings) -> Self {
        let log: Arc<dyn LogSink> = Arc::new(FacadeLog::new(settings.log_target.clone()));
        let resetter = Arc::new(
            SerialResetter::new(Arc::clone(&log)).with_break_duration(settings.break_duration()),
        );
        let resolver = platform_resolver(&settings, Arc::clone(&log));
        Self::new(settings, resetter, resolver, log)
    }

    /// Enable the debug-probe method.
    pub fn with_probe(mut self, probe: Arc<dyn DebugProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Abandon remount waits when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that abandons the current (or next) remount wait.
    ///
    /// Each cancellation is consumed by the wait it abandons.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &FlasherSettings {
        &self.settings
    }

    /// Flash and return only the outcome.
    pub fn flash(&self, request: &FlashRequest) -> FlashOutcome {
        self.flash_detailed(request).outcome
    }

    /// Flash and return everything observed along the way.
    pub fn flash_detailed(&self, request: &FlashRequest) -> FlashReport {
        let started = Instant::now();
        let mut report = FlashReport::new(&request.target.target_id);

        report.outcome = match request.method {
            FlashMethod::DebugProbe => self.flash_with_probe(request),
            FlashMethod::DirectCopy => self.flash_direct(request, &mut report),
        };
        report.elapsed = started.elapsed();

        let tid = &request.target.target_id;
        if report.outcome.is_success() {
            self.log.info(&format!("flashing {} succeeded. tid={}", request.source.display(), tid));
        } else {
            self.log
                .error(&format!("Flashing failed: {}. tid={}", report.outcome, tid));
        }
        report
    }

    fn flash_direct(&self, request: &FlashRequest, report: &mut FlashReport) -> FlashOutcome {
        let target = &request.target;
        let tid = target.target_id.as_str();

        let filename: OsString = match request.image_filename() {
            Some(name) => name.to_owned(),
            None => {
                self.log.error(&format!(
                    "source {} has no file name. tid={}",
                    request.source.display(),
                    tid
                ));
                return FlashOutcome::IoError(io::ErrorKind::InvalidInput);
            }
        };

        if !request.suppress_reset {
            self.reset_board(target.serial_port.as_deref(), tid);
            std::thread::sleep(self.settings.pre_write_reset_delay());
        }

        self.log.debug("read source file");
        let data = match read_image(&request.source) {
            Ok(data) => data,
            Err(e) => {
                self.log
                    .error(&format!("File couldn't be read: {}. tid={}", e, tid));
                return e.into();
            }
        };
        let sha256 = sha256_hex(&data);
        self.log.debug(&format!("SHA256: {}", sha256));
        report.image_sha256 = Some(sha256);
        report.image_size = Some(data.len());

        let destination = destination_path(&target.mount_point, &filename);
        self.log.debug(&format!(
            "writing binary: {} (size={} bytes)",
            destination.display(),
            data.len()
        ));
        if let Err(e) = write_image(&destination, &data) {
            self.log.error(&format!("Write failed: {}. tid={}", e, tid));
            return e.into();
        }
        self.log.debug("copy finished");
        report.destination = Some(destination);
        drop(data);

        std::thread::sleep(self.settings.settle_delay());

        let resolved = match self.resolver.resolve(target) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.log.error(&format!("{}. tid={}", e, tid));
                return e.into();
            }
        };
        report.resolved_target = Some(resolved.clone());

        let remount = self.wait_for_remount(&resolved, &filename);
        report.remount = Some(remount);

        if !request.suppress_reset {
            self.reset_board(resolved.serial_port.as_deref(), tid);
            std::thread::sleep(self.settings.post_write_reset_delay());
        }

        self.log.debug("verifying flash");
        let outcome = match verify_mount_point(&resolved.mount_point, &filename) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.log.error(&format!(
                    "could not inspect {}: {}. tid={}",
                    resolved.mount_point.display(),
                    e,
                    tid
                ));
                return e.into();
            }
        };

        if outcome.is_success() && remount == RemountResult::TimedOut && self.settings.strict_remount {
            return FlashOutcome::Timeout;
        }
        if outcome.is_success() {
            self.log.debug("ready");
        }
        outcome
    }

    /// Run the watcher on its own thread and block until it is done.
    fn wait_for_remount(&self, target: &TargetDescriptor, filename: &OsString) -> RemountResult {
        let watcher = RemountWatcher::new(Arc::clone(&self.log))
            .with_poll_interval(self.settings.remount_poll_interval())
            .with_cancel(self.cancel.clone());

        let handle = watcher.spawn(
            target.mount_point.clone(),
            filename.to_string_lossy().into_owned(),
            self.settings.remount_timeout(),
        );
        let result = handle.wait();

        // A cancellation ends this wait only.
        if result == RemountResult::Abandoned {
            self.cancel.reset();
        }

        match result {
            RemountResult::Settled => {}
            RemountResult::TimedOut => self.log.warn(&format!(
                "no remount observed on {} within {:?}; verifying anyway. tid={}",
                target.mount_point.display(),
                self.settings.remount_timeout(),
                target.target_id
            )),
            RemountResult::Abandoned => self.log.warn(&format!(
                "remount wait on {} abandoned; verifying anyway. tid={}",
                target.mount_point.display(),
                target.target_id
            )),
        }
        result
    }

    /// Best-effort reset; failures are logged and swallowed.
    fn reset_board(&self, serial_port: Option<&str>, tid: &str) {
        let Some(port) = serial_port else {
            self.log
                .debug(&format!("no serial port known, skipping reset. tid={}", tid));
            return;
        };

        if let Err(e) = self.resetter.reset(port) {
            self.log.warn(&format!(
                "reset could not be given ({}); continuing without it. tid={}",
                e, tid
            ));
        }
    }

    fn flash_with_probe(&self, request: &FlashRequest) -> FlashOutcome {
        let tid = request.target.target_id.as_str();

        let Some(probe) = &self.probe else {
            self.log.error(&format!(
                "debug probe flashing requested but no probe is available. tid={}",
                tid
            ));
            return FlashOutcome::IoError(io::ErrorKind::Unsupported);
        };

        self.log.debug("debug probe selected for flashing");
        match self.run_probe(probe.as_ref(), tid, &request.source) {
            Ok(()) => FlashOutcome::Success,
            Err(e) => {
                self.log.error(&format!("{}. tid={}", e, tid));
                e.into()
            }
        }
    }

    fn run_probe(&self, probe: &dyn DebugProbe, tid: &str, source: &Path) -> Result<(), ProbeError> {
        let mut board = probe.connect(tid)?;

        self.log.debug(&format!("resetting device: {}", tid));
        std::thread::sleep(self.settings.probe_reset_delay());
        board.reset()?;

        self.log.debug(&format!("flashing device: {}", tid));
        board.flash(source)?;

        self.log.debug(&format!("resetting device: {}", tid));
        std::thread::sleep(self.settings.probe_reset_delay());
        board.reset()?;

        Ok(())
    }
}

/// Decide the outcome from what the board left on its drive.
///
/// FAIL.TXT wins over ASSERT.TXT, which wins over a leftover image. A drive
/// that cannot be listed is an error, never a clean drive.
pub fn verify_mount_point(mount_point: &Path, filename: &OsString) -> io::Result<FlashOutcome> {
    fs::read_dir(mount_point)?;

    for marker in [FAIL_MARKER, ASSERT_MARKER] {
        let path = mount_point.join(marker);
        if file_exists(&path)? {
            let contents = fs::read(&path)?;
            let message = String::from_utf8_lossy(&contents).trim().to_string();
            return Ok(FlashOutcome::DeviceReportedFailure(message));
        }
    }

    if file_exists(&mount_point.join(filename))? {
        return Ok(FlashOutcome::FileStillPresent);
    }

    Ok(FlashOutcome::Success)
}

/// Only `NotFound` means absent; any other failure is reported.
fn file_exists(path: &Path) -> io::Result<bool> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(metadata.is_file()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
