//! Filesystem-backed [`DeviceBus`].

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use gz302_core::constants::{DEFAULT_MOUNTS_PATH, DEFAULT_SYSFS_ROOT};

use crate::error::{HardwareError, Result};
use crate::traits::DeviceBus;

/// [`DeviceBus`] over a real sysfs mount.
///
/// The root is configurable so the same code can run against a copied or
/// synthetic tree.
///
/// # Examples
///
/// ```no_run
/// use gz302_hardware::{DeviceBus, SysfsBus};
///
/// let bus = SysfsBus::default();
/// let class = bus.read_attr("bus/pci/devices/0000:c6:00.0/class")?;
/// # Ok::<(), gz302_hardware::HardwareError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SysfsBus {
    root: PathBuf,
    mounts_path: PathBuf,
}

impl SysfsBus {
    /// Create a bus rooted at `root`, reading mounts from `mounts_path`.
    pub fn new(root: impl Into<PathBuf>, mounts_path: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounts_path: mounts_path.into(),
        }
    }

    /// Sysfs root this bus resolves paths against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Default for SysfsBus {
    fn default() -> Self {
        Self::new(DEFAULT_SYSFS_ROOT, DEFAULT_MOUNTS_PATH)
    }
}

impl DeviceBus for SysfsBus {
    fn read_attr(&self, path: &str) -> Result<String> {
        fs::read_to_string(self.resolve(path))
            .map(|s| s.trim().to_string())
            .map_err(|e| HardwareError::from_io(path, e))
    }

    fn write_attr(&self, path: &str, value: &str) -> Result<()> {
        // Never create: a missing attribute means the device is gone.
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(self.resolve(path))
            .map_err(|e| HardwareError::from_io(path, e))?;
        file.write_all(value.as_bytes())
            .map_err(|e| HardwareError::write_rejected(path, e.to_string()))
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        let entries =
            fs::read_dir(self.resolve(path)).map_err(|e| HardwareError::from_io(path, e))?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    fn link_name(&self, path: &str) -> Result<Option<String>> {
        match fs::read_link(self.resolve(path)) {
            Ok(target) => Ok(target
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            // EINVAL: present but not a symlink
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(None),
            Err(e) => Err(HardwareError::from_io(path, e)),
        }
    }

    fn exists(&self, path: &str) -> bool {
        fs::symlink_metadata(self.resolve(path)).is_ok()
    }

    fn mount_table(&self) -> Result<String> {
        fs::read_to_string(&self.mounts_path)
            .map_err(|e| HardwareError::from_io(self.mounts_path.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, SysfsBus) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("sys");
        let dev = root.join("bus/pci/devices/0000:c7:00.5");
        fs::create_dir_all(dev.join("power")).unwrap();
        fs::write(dev.join("class"), "0x0c0340\n").unwrap();
        fs::write(dev.join("power/wakeup"), "enabled\n").unwrap();

        let drivers = root.join("bus/pci/drivers/thunderbolt");
        fs::create_dir_all(&drivers).unwrap();
        symlink(&drivers, dev.join("driver")).unwrap();

        let mounts = dir.path().join("mounts");
        fs::write(&mounts, "/dev/nvme0n1p2 / ext4 rw 0 0\n").unwrap();

        let bus = SysfsBus::new(root, mounts);
        (dir, bus)
    }

    #[test]
    fn test_read_attr_trims() {
        let (_dir, bus) = fixture();
        assert_eq!(
            bus.read_attr("bus/pci/devices/0000:c7:00.5/class").unwrap(),
            "0x0c0340"
        );
    }

    #[test]
    fn test_read_missing_attr() {
        let (_dir, bus) = fixture();
        let err = bus.read_attr("bus/pci/devices/0000:00:00.0/class").unwrap_err();
        assert!(matches!(err, HardwareError::NotFound { .. }));
    }

    #[test]
    fn test_write_attr_replaces_content() {
        let (_dir, bus) = fixture();
        let path = "bus/pci/devices/0000:c7:00.5/power/wakeup";
        bus.write_attr(path, "disabled").unwrap();
        assert_eq!(bus.read_attr(path).unwrap(), "disabled");
    }

    #[test]
    fn test_write_never_creates() {
        let (_dir, bus) = fixture();
        let path = "bus/pci/devices/0000:c7:00.5/power/control";
        assert!(bus.write_attr(path, "auto").is_err());
        assert!(!bus.exists(path));
    }

    #[test]
    fn test_list_sorted() {
        let (_dir, bus) = fixture();
        let names = bus.list("bus/pci/devices/0000:c7:00.5").unwrap();
        assert_eq!(names, vec!["class", "driver", "power"]);
    }

    #[test]
    fn test_link_name() {
        let (_dir, bus) = fixture();
        assert_eq!(
            bus.link_name("bus/pci/devices/0000:c7:00.5/driver").unwrap(),
            Some("thunderbolt".to_string())
        );
        // regular file, not a link
        assert_eq!(bus.link_name("bus/pci/devices/0000:c7:00.5/class").unwrap(), None);
        assert_eq!(bus.link_name("bus/pci/devices/0000:c7:00.5/nothing").unwrap(), None);
    }

    #[test]
    fn test_mount_table() {
        let (_dir, bus) = fixture();
        assert!(bus.mount_table().unwrap().contains("/dev/nvme0n1p2"));
    }
}
