//! Best-effort device operations.
//!
//! Each operation performs at most one sysfs write and reports what happened
//! as an [`OpOutcome`] instead of an error. Failures are never retried: the
//! sleep framework bounds the hook's run time and will suspend regardless,
//! so the only useful thing to do with a failure is log it and move on.
//!
//! Every operation emits exactly one log line with the device identifier.

use std::fmt;

use gz302_core::DeviceRecord;
use gz302_core::constants::{WAKEUP_DISABLED, WAKEUP_ENABLED};
use tracing::{debug, info, warn};

use crate::error::{HardwareError, Result};
use crate::traits::DeviceBus;

/// Result of one best-effort device operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpOutcome {
    /// The write was accepted.
    Applied,
    /// Nothing needed doing.
    Skipped(String),
    /// The write was attempted and failed.
    Failed(String),
}

impl OpOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }

    fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Applied,
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for OpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => write!(f, "applied"),
            Self::Skipped(reason) => write!(f, "skipped ({reason})"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
        }
    }
}

/// Action names used in log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    DisableWakeup,
    EnableWakeup,
    Unbind,
    Bind,
    Deauthorize,
    Authorize,
}

impl fmt::Display for DeviceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action_str = match self {
            Self::DisableWakeup => "disable_wakeup",
            Self::EnableWakeup => "enable_wakeup",
            Self::Unbind => "unbind",
            Self::Bind => "bind",
            Self::Deauthorize => "deauthorize",
            Self::Authorize => "authorize",
        };
        write!(f, "{}", action_str)
    }
}

/// Parsed `power/wakeup` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeupState {
    Enabled,
    Disabled,
}

impl WakeupState {
    /// Parse an attribute value.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::InvalidData` for anything other than
    /// `enabled` or `disabled` (devices without wakeup support read empty).
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim() {
            WAKEUP_ENABLED => Ok(Self::Enabled),
            WAKEUP_DISABLED => Ok(Self::Disabled),
            other => Err(HardwareError::invalid_data(format!(
                "unexpected wakeup value: {other:?}"
            ))),
        }
    }
}

fn log_outcome(action: DeviceAction, target: &str, outcome: &OpOutcome) {
    match outcome {
        OpOutcome::Applied => info!(action = %action, device = %target, "Device operation applied"),
        OpOutcome::Skipped(reason) => {
            debug!(action = %action, device = %target, reason = %reason, "Device operation skipped")
        }
        OpOutcome::Failed(reason) => {
            warn!(action = %action, device = %target, error = %reason, "Device operation failed")
        }
    }
}

/// Device operations over a [`DeviceBus`].
pub struct DeviceOps<'a, B: DeviceBus> {
    bus: &'a B,
}

impl<'a, B: DeviceBus> DeviceOps<'a, B> {
    pub fn new(bus: &'a B) -> Self {
        Self { bus }
    }

    fn wakeup_path(record: &DeviceRecord) -> String {
        format!("{}/power/wakeup", record.sysfs_dir())
    }

    /// Read a device's wakeup flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute is missing or unrecognised.
    pub fn wakeup_state(&self, record: &DeviceRecord) -> Result<WakeupState> {
        let raw = self.bus.read_attr(&Self::wakeup_path(record))?;
        WakeupState::parse(&raw)
    }

    /// Disable wakeup if it currently reads enabled.
    ///
    /// Returns `Applied` only when the flag was flipped, which is the caller's
    /// cue to record the device for re-enabling.
    pub fn disable_wakeup_if_enabled(&self, record: &DeviceRecord) -> OpOutcome {
        let outcome = match self.wakeup_state(record) {
            Ok(WakeupState::Enabled) => OpOutcome::from_result(
                self.bus.write_attr(&Self::wakeup_path(record), WAKEUP_DISABLED),
            ),
            Ok(WakeupState::Disabled) => OpOutcome::Skipped("already disabled".to_string()),
            Err(e) => OpOutcome::Skipped(format!("wakeup unreadable: {e}")),
        };
        log_outcome(DeviceAction::DisableWakeup, &record.bus_address, &outcome);
        outcome
    }

    /// Write `enabled` to the wakeup flag unconditionally.
    pub fn enable_wakeup(&self, record: &DeviceRecord) -> OpOutcome {
        let outcome =
            OpOutcome::from_result(self.bus.write_attr(&Self::wakeup_path(record), WAKEUP_ENABLED));
        log_outcome(DeviceAction::EnableWakeup, &record.bus_address, &outcome);
        outcome
    }

    /// Unbind a device from `driver`.
    pub fn unbind(&self, record: &DeviceRecord, driver: &str) -> OpOutcome {
        let path = format!("bus/{}/drivers/{driver}/unbind", record.category.bus());
        let outcome = OpOutcome::from_result(self.bus.write_attr(&path, &record.bus_address));
        log_outcome(DeviceAction::Unbind, &record.bus_address, &outcome);
        outcome
    }

    /// Bind a device to `driver`.
    pub fn bind(&self, record: &DeviceRecord, driver: &str) -> OpOutcome {
        let path = format!("bus/{}/drivers/{driver}/bind", record.category.bus());
        let outcome = OpOutcome::from_result(self.bus.write_attr(&path, &record.bus_address));
        log_outcome(DeviceAction::Bind, &record.bus_address, &outcome);
        outcome
    }

    /// Bind a device to `driver` only if it is visible and currently has no
    /// driver. Guards against racing the kernel's own rebind.
    pub fn bind_if_unbound(&self, record: &DeviceRecord, driver: &str) -> OpOutcome {
        let dir = record.sysfs_dir();
        if !self.bus.exists(&dir) {
            let outcome = OpOutcome::Skipped("device not present".to_string());
            log_outcome(DeviceAction::Bind, &record.bus_address, &outcome);
            return outcome;
        }
        match self.bus.link_name(&format!("{dir}/driver")) {
            Ok(Some(current)) => {
                let outcome = OpOutcome::Skipped(format!("already bound to {current}"));
                log_outcome(DeviceAction::Bind, &record.bus_address, &outcome);
                outcome
            }
            Ok(None) => self.bind(record, driver),
            Err(e) => {
                let outcome = OpOutcome::Skipped(format!("driver link unreadable: {e}"));
                log_outcome(DeviceAction::Bind, &record.bus_address, &outcome);
                outcome
            }
        }
    }

    /// Write the USB `authorized` attribute of `bus/usb/devices/<path>`.
    pub fn set_usb_authorized(&self, usb_path: &str, authorized: bool) -> OpOutcome {
        let attr = format!("bus/usb/devices/{usb_path}/authorized");
        let value = if authorized { "1" } else { "0" };
        let outcome = OpOutcome::from_result(self.bus.write_attr(&attr, value));
        let action = if authorized {
            DeviceAction::Authorize
        } else {
            DeviceAction::Deauthorize
        };
        log_outcome(action, usb_path, &outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBus;
    use gz302_core::DeviceCategory;
    use gz302_core::constants::KEYBOARD_USB_ID;

    fn nhi(address: &str) -> DeviceRecord {
        DeviceRecord::new(DeviceCategory::ThunderboltNhi, address)
    }

    fn hid(id: &str) -> DeviceRecord {
        DeviceRecord::new(DeviceCategory::AsusHid, id)
    }

    #[test]
    fn test_wakeup_parse() {
        assert_eq!(WakeupState::parse("enabled\n").unwrap(), WakeupState::Enabled);
        assert_eq!(WakeupState::parse("disabled").unwrap(), WakeupState::Disabled);
        assert!(WakeupState::parse("").is_err());
    }

    #[test]
    fn test_disable_enabled_device() {
        let bus = MockBus::new();
        bus.add_pci_device("0000:c7:00.5", 0x0c0340, "enabled");
        let ops = DeviceOps::new(&bus);

        assert_eq!(ops.disable_wakeup_if_enabled(&nhi("0000:c7:00.5")), OpOutcome::Applied);
        assert_eq!(
            bus.attr("bus/pci/devices/0000:c7:00.5/power/wakeup").as_deref(),
            Some("disabled")
        );
    }

    #[test]
    fn test_disable_already_disabled_no_write() {
        let bus = MockBus::new();
        bus.add_pci_device("0000:c7:00.5", 0x0c0340, "disabled");
        let ops = DeviceOps::new(&bus);

        let outcome = ops.disable_wakeup_if_enabled(&nhi("0000:c7:00.5"));
        assert!(matches!(outcome, OpOutcome::Skipped(_)));
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_disable_rejected_write_fails() {
        let bus = MockBus::new();
        bus.add_pci_device("0000:c7:00.5", 0x0c0340, "enabled");
        bus.reject_writes("bus/pci/devices/0000:c7:00.5/power/wakeup");
        let ops = DeviceOps::new(&bus);

        assert!(matches!(
            ops.disable_wakeup_if_enabled(&nhi("0000:c7:00.5")),
            OpOutcome::Failed(_)
        ));
    }

    #[test]
    fn test_enable_vanished_device_fails() {
        let bus = MockBus::new();
        let ops = DeviceOps::new(&bus);
        assert!(matches!(ops.enable_wakeup(&nhi("0000:c7:00.5")), OpOutcome::Failed(_)));
    }

    #[test]
    fn test_bind_if_unbound_binds() {
        let bus = MockBus::new();
        bus.add_hid_device("0003:0B05:1A30.0001", None);
        bus.add_hid_driver("hid_asus");
        let ops = DeviceOps::new(&bus);

        assert_eq!(
            ops.bind_if_unbound(&hid("0003:0B05:1A30.0001"), "hid_asus"),
            OpOutcome::Applied
        );
        assert_eq!(
            bus.driver_of("hid", "0003:0B05:1A30.0001").as_deref(),
            Some("hid_asus")
        );
    }

    #[test]
    fn test_bind_if_unbound_skips_bound_device() {
        let bus = MockBus::new();
        bus.add_hid_device("0003:0B05:1A30.0001", Some("hid_asus"));
        let ops = DeviceOps::new(&bus);

        let outcome = ops.bind_if_unbound(&hid("0003:0B05:1A30.0001"), "hid_asus");
        assert_eq!(outcome, OpOutcome::Skipped("already bound to hid_asus".to_string()));
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_bind_if_unbound_skips_missing_device() {
        let bus = MockBus::new();
        let ops = DeviceOps::new(&bus);

        let outcome = ops.bind_if_unbound(&hid("0003:0B05:1A30.0001"), "hid_asus");
        assert_eq!(outcome, OpOutcome::Skipped("device not present".to_string()));
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn test_usb_authorize_cycle() {
        let bus = MockBus::new();
        bus.add_usb_device("1-2", KEYBOARD_USB_ID);
        let ops = DeviceOps::new(&bus);

        assert!(ops.set_usb_authorized("1-2", false).is_applied());
        assert!(ops.set_usb_authorized("1-2", true).is_applied());
        assert_eq!(
            bus.writes(),
            vec![
                ("bus/usb/devices/1-2/authorized".to_string(), "0".to_string()),
                ("bus/usb/devices/1-2/authorized".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(OpOutcome::Applied.to_string(), "applied");
        assert_eq!(OpOutcome::Skipped("x".into()).to_string(), "skipped (x)");
        assert_eq!(OpOutcome::Failed("y".into()).to_string(), "failed (y)");
    }
}
