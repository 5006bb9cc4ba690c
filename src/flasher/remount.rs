//! Remount detection.
//!
//! After consuming an image the interface firmware detaches its drive and
//! re-attaches it with a status page (`*.HTM`) and without the image file.
//! The watcher polls the mount point's listing until that happens.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::config::{is_same_entry, is_status_page, REMOUNT_POLL_INTERVAL};
use crate::traits::{FacadeLog, LogSink};

/// Granularity at which a sleeping watcher notices cancellation.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// How a remount wait ended. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemountResult {
    /// The board consumed the image and remounted.
    Settled,
    /// The timeout elapsed first.
    TimedOut,
    /// The wait was cancelled from outside.
    Abandoned,
}

/// Progress of one wait.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemountStatus {
    pub elapsed: Duration,
    /// The last listing contained a status page.
    pub status_file_seen: bool,
    /// The last listing no longer contained the written image.
    pub status_file_cleared: bool,
}

impl RemountStatus {
    fn observe(&mut self, entries: &[String], expected_filename: &str) {
        self.status_file_seen = entries.iter().any(|e| is_status_page(e));
        self.status_file_cleared = !entries.iter().any(|e| is_same_entry(e, expected_filename));
    }

    fn settled(&self) -> bool {
        self.status_file_seen && self.status_file_cleared
    }
}

/// Shared flag used to abandon a wait from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Re-arm the token after the wait it cancelled has ended.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Polls a mount point until the board has remounted.
#[derive(Clone)]
pub struct RemountWatcher {
    poll_interval: Duration,
    cancel: CancelToken,
    log: Arc<dyn LogSink>,
}

impl RemountWatcher {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self {
            poll_interval: REMOUNT_POLL_INTERVAL,
            cancel: CancelToken::new(),
            log,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Abandon the wait when `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Block until the board remounts, the timeout elapses or the wait is
    /// cancelled.
    pub fn watch(&self, mount_point: &Path, expected_filename: &str, timeout: Duration) -> RemountResult {
        let start = Instant::now();
        let mut status = RemountStatus::default();

        loop {
            if !self.sleep_unless_cancelled(self.poll_interval) {
                self.log
                    .debug(&format!("re-mount check abandoned for {}", mount_point.display()));
                return RemountResult::Abandoned;
            }

            match list_entries(mount_point) {
                Ok(entries) => {
                    status.observe(&entries, expected_filename);
                    if status.settled() {
                        self.log.debug(&format!(
                            "{} remounted with status page after {:?}",
                            mount_point.display(),
                            start.elapsed()
                        ));
                        return RemountResult::Settled;
                    }
                    // Some hosts briefly report an empty drive while it
                    // re-attaches; confirm with a fresh listing.
                    if entries.is_empty() && auxiliary_drive_check(mount_point, expected_filename) {
                        self.log.debug(&format!(
                            "{} remounted after empty listing",
                            mount_point.display()
                        ));
                        return RemountResult::Settled;
                    }
                }
                Err(e) => {
                    // Expected while the drive is detached.
                    log::trace!("listing {} failed: {}", mount_point.display(), e);
                }
            }

            status.elapsed = start.elapsed();
            if status.elapsed > timeout {
                self.log
                    .debug(&format!("re-mount check timed out for {}", mount_point.display()));
                return RemountResult::TimedOut;
            }
        }
    }

    /// Run [`watch`](Self::watch) on its own thread.
    pub fn spawn(&self, mount_point: PathBuf, expected_filename: String, timeout: Duration) -> RemountHandle {
        let watcher = self.clone();
        let cancel = self.cancel.clone();
        let join = thread::spawn(move || watcher.watch(&mount_point, &expected_filename, timeout));
        RemountHandle {
            join,
            cancel,
            log: Arc::clone(&self.log),
        }
    }

    /// Sleep for `duration`; returns false if cancelled meanwhile.
    fn sleep_unless_cancelled(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep(CANCEL_CHECK_INTERVAL.min(deadline - now));
        }
    }
}

impl Default for RemountWatcher {
    fn default() -> Self {
        Self::new(Arc::new(FacadeLog::default()))
    }
}

/// A wait running on a background thread.
pub struct RemountHandle {
    join: JoinHandle<RemountResult>,
    cancel: CancelToken,
    log: Arc<dyn LogSink>,
}

impl RemountHandle {
    /// Ask the watcher to stop at its next check.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Block until the watcher returns.
    pub fn wait(self) -> RemountResult {
        match self.join.join() {
            Ok(result) => result,
            Err(_) => {
                self.log.error("remount watcher panicked");
                RemountResult::Abandoned
            }
        }
    }
}

/// Names of the entries directly under `dir`.
pub fn list_entries(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        names.push(entry?.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Fresh listing shows a status page and no image.
fn auxiliary_drive_check(mount_point: &Path, expected_filename: &str) -> bool {
    match list_entries(mount_point) {
        Ok(entries) => {
            let mut status = RemountStatus::default();
            status.observe(&entries, expected_filename);
            status.settled()
        }
        Err(_) => false,
    }
}
