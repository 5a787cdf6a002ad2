//! In-memory [`DeviceBus`] for testing and development.
//!
//! [`MockBus`] holds a sysfs-shaped tree of attributes, directories and
//! driver links, and reproduces the parts of kernel behaviour the hook
//! depends on:
//!
//! - writing a device id to `bus/<bus>/drivers/<drv>/unbind` removes the
//!   device's `driver` link, and fails if the device is not bound to `<drv>`
//! - writing to `.../bind` creates the link, and fails if the device is
//!   absent or already bound
//! - every other write replaces the attribute value, and fails if the
//!   attribute does not exist
//!
//! Every attempted write is appended to a log that tests inspect.
//!
//! # Examples
//!
//! ```
//! use gz302_hardware::{DeviceBus, MockBus};
//!
//! let bus = MockBus::new();
//! bus.add_hid_device("0003:0B05:1A30.0001", Some("hid_asus"));
//!
//! bus.write_attr("bus/hid/drivers/hid_asus/unbind", "0003:0B05:1A30.0001").unwrap();
//! assert_eq!(bus.driver_of("hid", "0003:0B05:1A30.0001"), None);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use gz302_core::UsbId;

use crate::error::{HardwareError, Result};
use crate::traits::DeviceBus;

#[derive(Debug, Default)]
struct MockState {
    attrs: BTreeMap<String, String>,
    links: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
    rejected: BTreeSet<String>,
    writes: Vec<(String, String)>,
    mounts: String,
}

impl MockState {
    fn register_parents(&mut self, path: &str) {
        let mut current = path;
        while let Some((parent, _)) = current.rsplit_once('/') {
            self.dirs.insert(parent.to_string());
            current = parent;
        }
    }

    fn add_dir(&mut self, path: &str) {
        self.dirs.insert(path.to_string());
        self.register_parents(path);
    }

    fn add_attr(&mut self, path: &str, value: &str) {
        self.attrs.insert(path.to_string(), value.to_string());
        self.register_parents(path);
    }

    fn add_link(&mut self, path: &str, target_name: &str) {
        self.links.insert(path.to_string(), target_name.to_string());
        self.register_parents(path);
    }

    fn bind(&mut self, bus: &str, driver: &str, id: &str) {
        self.add_link(&format!("bus/{bus}/devices/{id}/driver"), driver);
        self.add_link(&format!("bus/{bus}/drivers/{driver}/{id}"), id);
    }

    fn unbind(&mut self, bus: &str, driver: &str, id: &str) {
        self.links.remove(&format!("bus/{bus}/devices/{id}/driver"));
        self.links.remove(&format!("bus/{bus}/drivers/{driver}/{id}"));
    }

    fn ensure_driver(&mut self, bus: &str, driver: &str) {
        self.add_attr(&format!("bus/{bus}/drivers/{driver}/bind"), "");
        self.add_attr(&format!("bus/{bus}/drivers/{driver}/unbind"), "");
    }
}

/// Driver bind/unbind control file, split into its parts.
fn parse_driver_control(path: &str) -> Option<(&str, &str, &str)> {
    let rest = path.strip_prefix("bus/")?;
    let mut parts = rest.split('/');
    let bus = parts.next()?;
    if parts.next()? != "drivers" {
        return None;
    }
    let driver = parts.next()?;
    let action = parts.next()?;
    if parts.next().is_some() || !matches!(action, "bind" | "unbind") {
        return None;
    }
    Some((bus, driver, action))
}

/// In-memory sysfs tree with kernel-like bind semantics.
#[derive(Debug, Default)]
pub struct MockBus {
    state: Mutex<MockState>,
}

impl MockBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a raw attribute.
    pub fn add_attr(&self, path: &str, value: &str) {
        self.state().add_attr(path, value);
    }

    /// Add a PCI function with the given class code and wakeup value.
    pub fn add_pci_device(&self, address: &str, class: u32, wakeup: &str) {
        let mut state = self.state();
        let dir = format!("bus/pci/devices/{address}");
        state.add_attr(&format!("{dir}/class"), &format!("0x{class:06x}"));
        state.add_attr(&format!("{dir}/power/wakeup"), wakeup);
    }

    /// Add a HID device, optionally bound to `driver`.
    pub fn add_hid_device(&self, id: &str, driver: Option<&str>) {
        let mut state = self.state();
        state.add_attr(&format!("bus/hid/devices/{id}/uevent"), "");
        if let Some(driver) = driver {
            state.ensure_driver("hid", driver);
            state.bind("hid", driver, id);
        }
    }

    /// Add a HID driver with no devices bound.
    pub fn add_hid_driver(&self, driver: &str) {
        self.state().ensure_driver("hid", driver);
    }

    /// Add an MMC card bound to mmcblk, exposing the given block devices.
    pub fn add_mmc_device(&self, id: &str, blocks: &[&str]) {
        let mut state = self.state();
        state.ensure_driver("mmc", "mmcblk");
        state.add_attr(&format!("bus/mmc/devices/{id}/type"), "SD");
        state.add_dir(&format!("bus/mmc/devices/{id}/block"));
        for block in blocks {
            state.add_dir(&format!("bus/mmc/devices/{id}/block/{block}"));
        }
        state.bind("mmc", "mmcblk", id);
    }

    /// Add a USB device with the given vendor:product pair.
    pub fn add_usb_device(&self, path: &str, id: UsbId) {
        let mut state = self.state();
        let dir = format!("bus/usb/devices/{path}");
        state.add_attr(&format!("{dir}/idVendor"), &format!("{:04x}", id.vendor));
        state.add_attr(&format!("{dir}/idProduct"), &format!("{:04x}", id.product));
        state.add_attr(&format!("{dir}/authorized"), "1");
    }

    /// Replace the mount table contents.
    pub fn set_mounts(&self, mounts: &str) {
        self.state().mounts = mounts.to_string();
    }

    /// Make every write to `path` fail.
    pub fn reject_writes(&self, path: &str) {
        self.state().rejected.insert(path.to_string());
    }

    /// Bind a device behind the hook's back, as the kernel does on
    /// re-enumeration.
    pub fn kernel_bind(&self, bus: &str, driver: &str, id: &str) {
        let mut state = self.state();
        state.ensure_driver(bus, driver);
        state.bind(bus, driver, id);
    }

    /// Current value of an attribute.
    pub fn attr(&self, path: &str) -> Option<String> {
        self.state().attrs.get(path).cloned()
    }

    /// Driver currently bound to a device.
    pub fn driver_of(&self, bus: &str, id: &str) -> Option<String> {
        self.state()
            .links
            .get(&format!("bus/{bus}/devices/{id}/driver"))
            .cloned()
    }

    /// Every write attempted so far, in order.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.state().writes.clone()
    }

    /// Forget the write log.
    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }
}

impl DeviceBus for MockBus {
    fn read_attr(&self, path: &str) -> Result<String> {
        self.state()
            .attrs
            .get(path)
            .map(|v| v.trim().to_string())
            .ok_or_else(|| HardwareError::not_found(path))
    }

    fn write_attr(&self, path: &str, value: &str) -> Result<()> {
        let mut state = self.state();
        state.writes.push((path.to_string(), value.to_string()));

        if state.rejected.contains(path) {
            return Err(HardwareError::write_rejected(path, "rejected by mock"));
        }

        if let Some((bus, driver, action)) = parse_driver_control(path) {
            let id = value.trim();
            let current = state
                .links
                .get(&format!("bus/{bus}/devices/{id}/driver"))
                .cloned();
            return match (action, current) {
                ("unbind", Some(bound)) if bound == driver => {
                    state.unbind(bus, driver, id);
                    Ok(())
                }
                ("unbind", _) => Err(HardwareError::write_rejected(path, "no such device")),
                ("bind", Some(_)) => Err(HardwareError::write_rejected(path, "device busy")),
                ("bind", None) if state.dirs.contains(&format!("bus/{bus}/devices/{id}")) => {
                    state.bind(bus, driver, id);
                    Ok(())
                }
                _ => Err(HardwareError::write_rejected(path, "no such device")),
            };
        }

        match state.attrs.get_mut(path) {
            Some(slot) => {
                *slot = value.to_string();
                Ok(())
            }
            None => Err(HardwareError::not_found(path)),
        }
    }

    fn list(&self, path: &str) -> Result<Vec<String>> {
        let state = self.state();
        if !state.dirs.contains(path) {
            return Err(HardwareError::not_found(path));
        }
        let prefix = format!("{path}/");
        let children: BTreeSet<String> = state
            .dirs
            .iter()
            .chain(state.attrs.keys())
            .chain(state.links.keys())
            .filter_map(|p| p.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(str::to_string)
            .collect();
        Ok(children.into_iter().collect())
    }

    fn link_name(&self, path: &str) -> Result<Option<String>> {
        Ok(self.state().links.get(path).cloned())
    }

    fn exists(&self, path: &str) -> bool {
        let state = self.state();
        state.dirs.contains(path)
            || state.attrs.contains_key(path)
            || state.links.contains_key(path)
    }

    fn mount_table(&self) -> Result<String> {
        Ok(self.state().mounts.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pci_device_attrs() {
        let bus = MockBus::new();
        bus.add_pci_device("0000:c7:00.5", 0x0c0340, "enabled");

        assert_eq!(
            bus.read_attr("bus/pci/devices/0000:c7:00.5/class").unwrap(),
            "0x0c0340"
        );
        assert_eq!(bus.list("bus/pci/devices").unwrap(), vec!["0000:c7:00.5"]);
    }

    #[test]
    fn test_unbind_then_bind() {
        let bus = MockBus::new();
        bus.add_hid_device("0003:0B05:1A30.0001", Some("hid_asus"));

        bus.write_attr("bus/hid/drivers/hid_asus/unbind", "0003:0B05:1A30.0001")
            .unwrap();
        assert_eq!(bus.driver_of("hid", "0003:0B05:1A30.0001"), None);

        bus.write_attr("bus/hid/drivers/hid_asus/bind", "0003:0B05:1A30.0001")
            .unwrap();
        assert_eq!(
            bus.driver_of("hid", "0003:0B05:1A30.0001").as_deref(),
            Some("hid_asus")
        );
    }

    #[test]
    fn test_bind_when_bound_is_busy() {
        let bus = MockBus::new();
        bus.add_hid_device("0003:0B05:1A30.0001", Some("hid_asus"));

        let err = bus
            .write_attr("bus/hid/drivers/hid_asus/bind", "0003:0B05:1A30.0001")
            .unwrap_err();
        assert!(err.to_string().contains("device busy"));
    }

    #[test]
    fn test_unbind_wrong_driver_rejected() {
        let bus = MockBus::new();
        bus.add_hid_device("0003:0B05:1A30.0001", Some("hid_asus"));
        bus.add_hid_driver("hid_generic");

        assert!(
            bus.write_attr("bus/hid/drivers/hid_generic/unbind", "0003:0B05:1A30.0001")
                .is_err()
        );
        assert!(bus.driver_of("hid", "0003:0B05:1A30.0001").is_some());
    }

    #[test]
    fn test_write_missing_attr_fails() {
        let bus = MockBus::new();
        assert!(matches!(
            bus.write_attr("bus/pci/devices/x/power/wakeup", "disabled"),
            Err(HardwareError::NotFound { .. })
        ));
        assert_eq!(bus.writes().len(), 1);
    }

    #[test]
    fn test_rejected_write_leaves_value() {
        let bus = MockBus::new();
        bus.add_pci_device("0000:c7:00.5", 0x0c0340, "enabled");
        bus.reject_writes("bus/pci/devices/0000:c7:00.5/power/wakeup");

        assert!(
            bus.write_attr("bus/pci/devices/0000:c7:00.5/power/wakeup", "disabled")
                .is_err()
        );
        assert_eq!(
            bus.attr("bus/pci/devices/0000:c7:00.5/power/wakeup").as_deref(),
            Some("enabled")
        );
    }

    #[test]
    fn test_driver_dir_lists_bound_devices() {
        let bus = MockBus::new();
        bus.add_mmc_device("mmc0:0001", &["mmcblk0"]);

        let entries = bus.list("bus/mmc/drivers/mmcblk").unwrap();
        assert_eq!(entries, vec!["bind", "mmc0:0001", "unbind"]);
        assert_eq!(
            bus.list("bus/mmc/devices/mmc0:0001/block").unwrap(),
            vec!["mmcblk0"]
        );
    }

    #[test]
    fn test_parse_driver_control() {
        assert_eq!(
            parse_driver_control("bus/hid/drivers/hid_asus/bind"),
            Some(("hid", "hid_asus", "bind"))
        );
        assert_eq!(parse_driver_control("bus/hid/devices/x/driver"), None);
        assert_eq!(parse_driver_control("bus/hid/drivers/hid_asus/uevent"), None);
    }
}
