//! Bus access trait.
//!
//! Everything the hook reads or writes goes through [`DeviceBus`], which
//! exposes sysfs as a tree of small text attributes addressed by paths
//! relative to the sysfs root (for example `bus/pci/devices/0000:c6:00.0/class`).
//! [`SysfsBus`](crate::sysfs::SysfsBus) backs it with the real filesystem and
//! [`MockBus`](crate::mock::MockBus) with an in-memory tree that simulates the
//! kernel's bind/unbind behaviour.
//!
//! Methods are blocking. Sysfs attribute I/O completes in microseconds and
//! the hook has no other work to overlap it with.

use crate::error::Result;

/// Read/write access to sysfs and the live mount table.
pub trait DeviceBus {
    /// Read an attribute, with surrounding whitespace trimmed.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::NotFound` if the attribute does not exist.
    fn read_attr(&self, path: &str) -> Result<String>;

    /// Write `value` to an existing attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute is missing or the kernel rejects the
    /// write.
    fn write_attr(&self, path: &str, value: &str) -> Result<()>;

    /// List the entry names of a directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::NotFound` if the directory does not exist.
    fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Final path component of the symlink at `path`, or `None` if no link
    /// exists there.
    ///
    /// # Errors
    ///
    /// Returns an error if the link exists but cannot be read.
    fn link_name(&self, path: &str) -> Result<Option<String>>;

    /// Whether anything exists at `path`.
    fn exists(&self, path: &str) -> bool;

    /// Raw contents of the live mount table (`/proc/self/mounts` format).
    ///
    /// # Errors
    ///
    /// Returns an error if the mount table cannot be read.
    fn mount_table(&self) -> Result<String>;
}

impl<B: DeviceBus + ?Sized> DeviceBus for &B {
    fn read_attr(&self, path: &str) -> Result<String> {
        (**self).read_attr(path)
    }

    fn write_attr(&self, path: &str, value: &str) -> Result<()> {
        (**self).write_attr(path, value)
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        (**self).list(path)
    }

    fn link_name(&self, path: &str) -> Result<Option<String>> {
        (**self).link_name(path)
    }

    fn exists(&self, path: &str) -> bool {
        (**self).exists(path)
    }

    fn mount_table(&self) -> Result<String> {
        (**self).mount_table()
    }
}
