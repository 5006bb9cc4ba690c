//! Re-identification of a board after it remounted.
//!
//! A board that consumed an image detaches and re-attaches its USB
//! interfaces, and the OS may hand it a different serial port, block device
//! or mount point. One strategy per platform family recovers the new
//! identity; [`platform_resolver`] picks it once at startup.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use super::config::{
    DEV_DIR, DISK_BY_ID_DIR, MASS_STORAGE_FS_TYPE, MOUNT_POLL_ATTEMPTS, MOUNT_POLL_INTERVAL,
    MOUNT_TABLE_PATH, SERIAL_BY_ID_DIR,
};
use super::error::IdentityError;
use super::mounts::{find_mount, read_mount_table};
use super::target::TargetDescriptor;
use crate::settings::FlasherSettings;
use crate::traits::{DeviceEnumerator, LogSink, SerialPortEnumerator};

/// Recovers a board's current identity from a possibly stale descriptor.
#[cfg_attr(test, automock)]
pub trait IdentityResolver: Send + Sync {
    /// Return `previous` with every field that changed updated.
    /// `target_id` is always carried over unchanged.
    fn resolve(&self, previous: &TargetDescriptor) -> Result<TargetDescriptor, IdentityError>;
}

/// Select the resolver for the platform this binary was built for.
pub fn platform_resolver(
    settings: &FlasherSettings,
    log: Arc<dyn LogSink>,
) -> Arc<dyn IdentityResolver> {
    #[cfg(target_os = "windows")]
    {
        let _ = settings;
        Arc::new(EnumeratorResolver::new(Arc::new(SerialPortEnumerator), log))
    }

    #[cfg(target_os = "linux")]
    {
        Arc::new(
            ByIdResolver::system(log)
                .with_mount_polling(settings.mount_poll_attempts, settings.mount_poll_interval()),
        )
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    {
        let _ = (settings, log);
        Arc::new(PassthroughResolver)
    }
}

// ============================================================================
// Device-management strategy
// ============================================================================

/// Asks the enumeration collaborator which port the board is on now.
pub struct EnumeratorResolver {
    enumerator: Arc<dyn DeviceEnumerator>,
    log: Arc<dyn LogSink>,
}

impl EnumeratorResolver {
    pub fn new(enumerator: Arc<dyn DeviceEnumerator>, log: Arc<dyn LogSink>) -> Self {
        Self { enumerator, log }
    }

    /// Resolver backed by the OS serial-port enumeration.
    pub fn system(log: Arc<dyn LogSink>) -> Self {
        Self::new(Arc::new(SerialPortEnumerator), log)
    }
}

impl IdentityResolver for EnumeratorResolver {
    fn resolve(&self, previous: &TargetDescriptor) -> Result<TargetDescriptor, IdentityError> {
        let serial_port = self.enumerator.serial_port_for(&previous.target_id);
        Ok(merge_identity(
            previous,
            IdentityUpdate {
                serial_port,
                ..IdentityUpdate::default()
            },
            self.log.as_ref(),
        ))
    }
}

// ============================================================================
// Stable-symlink strategy
// ============================================================================

/// Scans the by-id symlink namespaces and the mount table.
pub struct ByIdResolver {
    serial_by_id: PathBuf,
    disk_by_id: PathBuf,
    mount_table: PathBuf,
    dev_dir: PathBuf,
    poll_attempts: u32,
    poll_interval: Duration,
    log: Arc<dyn LogSink>,
}

impl ByIdResolver {
    pub fn new(
        serial_by_id: impl Into<PathBuf>,
        disk_by_id: impl Into<PathBuf>,
        mount_table: impl Into<PathBuf>,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            serial_by_id: serial_by_id.into(),
            disk_by_id: disk_by_id.into(),
            mount_table: mount_table.into(),
            dev_dir: PathBuf::from(DEV_DIR),
            poll_attempts: MOUNT_POLL_ATTEMPTS,
            poll_interval: MOUNT_POLL_INTERVAL,
            log,
        }
    }

    /// Resolver over the live udev namespaces and kernel mount table.
    pub fn system(log: Arc<dyn LogSink>) -> Self {
        Self::new(SERIAL_BY_ID_DIR, DISK_BY_ID_DIR, MOUNT_TABLE_PATH, log)
    }

    pub fn with_mount_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts;
        self.poll_interval = interval;
        self
    }

    /// Directory device node paths are reported under.
    pub fn with_dev_dir(mut self, dev_dir: impl Into<PathBuf>) -> Self {
        self.dev_dir = dev_dir.into();
        self
    }

    /// Find the single device node in `namespace` whose link name carries
    /// `target_id`.
    fn lookup(
        &self,
        namespace_dir: &Path,
        namespace: &'static str,
        target_id: &str,
    ) -> Result<Option<PathBuf>, IdentityError> {
        let mut matches = scan_namespace(namespace_dir, target_id)?
            .into_iter()
            .map(|link| self.device_node(&link));

        let first = matches.next();
        if matches.next().is_some() {
            self.log.error(&format!(
                "target_id {} has more than 1 {} entry in the system",
                target_id, namespace
            ));
            return Err(IdentityError::AmbiguousIdentity {
                target_id: target_id.to_string(),
                namespace,
            });
        }
        Ok(first)
    }

    /// Map a by-id symlink to the device node it points at.
    fn device_node(&self, link: &Path) -> PathBuf {
        let target = match fs::read_link(link) {
            Ok(target) => target,
            Err(e) => {
                self.log.debug(&format!(
                    "could not follow {} ({}); using its name as the device node",
                    link.display(),
                    e
                ));
                link.to_path_buf()
            }
        };
        match target.file_name() {
            Some(name) => self.dev_dir.join(name),
            None => target,
        }
    }

    /// Poll the mount table until `dev_point` shows up as a FAT mount.
    fn wait_for_mount(&self, target_id: &str, dev_point: &Path) -> Result<PathBuf, IdentityError> {
        for attempt in 1..=self.poll_attempts {
            let entries = read_mount_table(&self.mount_table)?;
            if let Some(entry) = find_mount(&entries, dev_point, MASS_STORAGE_FS_TYPE) {
                return Ok(entry.mount_point.clone());
            }
            if attempt < self.poll_attempts {
                std::thread::sleep(self.poll_interval);
            }
        }

        self.log.error(&format!(
            "{} mount point for {} did not re-appear in the system after {} attempts",
            MASS_STORAGE_FS_TYPE, target_id, self.poll_attempts
        ));
        Err(IdentityError::RemountNotObserved {
            target_id: target_id.to_string(),
            dev_point: dev_point.display().to_string(),
            fs_type: MASS_STORAGE_FS_TYPE,
            attempts: self.poll_attempts,
        })
    }
}

impl IdentityResolver for ByIdResolver {
    fn resolve(&self, previous: &TargetDescriptor) -> Result<TargetDescriptor, IdentityError> {
        let target_id = previous.target_id.as_str();

        let serial_port = self
            .lookup(&self.serial_by_id, "serial", target_id)?
            .map(|node| node.display().to_string());
        let dev_point = self.lookup(&self.disk_by_id, "disk", target_id)?;

        let mount_point = match &dev_point {
            Some(dev) => Some(self.wait_for_mount(target_id, dev)?),
            None => None,
        };

        Ok(merge_identity(
            previous,
            IdentityUpdate {
                serial_port,
                mount_point,
                dev_point,
            },
            self.log.as_ref(),
        ))
    }
}

/// List the entries of a by-id directory whose names contain `target_id`.
///
/// A missing directory means no device of that kind is attached.
fn scan_namespace(dir: &Path, target_id: &str) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().contains(target_id) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

// ============================================================================
// No-op strategy
// ============================================================================

/// For platforms without a reliable way to re-identify a board.
#[derive(Debug, Default)]
pub struct PassthroughResolver;

impl IdentityResolver for PassthroughResolver {
    fn resolve(&self, previous: &TargetDescriptor) -> Result<TargetDescriptor, IdentityError> {
        Ok(previous.clone())
    }
}

// ============================================================================
// Merging
// ============================================================================

/// Freshly observed identity fields; `None` means "not observed".
#[derive(Debug, Default)]
pub struct IdentityUpdate {
    pub serial_port: Option<String>,
    pub mount_point: Option<PathBuf>,
    pub dev_point: Option<PathBuf>,
}

/// Overlay observed fields onto `previous`, logging each change.
pub fn merge_identity(
    previous: &TargetDescriptor,
    update: IdentityUpdate,
    log: &dyn LogSink,
) -> TargetDescriptor {
    let mut merged = previous.clone();

    match update.serial_port {
        Some(port) if previous.serial_port.as_deref() != Some(port.as_str()) => {
            log.debug(&format!(
                "serial port {} has changed to {}",
                previous.serial_port.as_deref().unwrap_or("<none>"),
                port
            ));
            merged.serial_port = Some(port);
        }
        _ => {
            if let Some(port) = &previous.serial_port {
                log.debug(&format!("serial port {} has not changed", port));
            }
        }
    }

    match update.mount_point {
        Some(mount) if mount != previous.mount_point => {
            log.debug(&format!(
                "mount point {} has changed to {}",
                previous.mount_point.display(),
                mount.display()
            ));
            merged.mount_point = mount;
        }
        _ => log.debug(&format!(
            "mount point {} has not changed",
            previous.mount_point.display()
        )),
    }

    if let Some(dev) = update.dev_point {
        if previous.dev_point.as_ref() != Some(&dev) {
            log.debug(&format!(
                "block device {} has changed to {}",
                previous
                    .dev_point
                    .as_ref()
                    .map(|d| d.display().to_string())
                    .unwrap_or_else(|| "<none>".to_string()),
                dev.display()
            ));
            merged.dev_point = Some(dev);
        }
    }

    merged
}
