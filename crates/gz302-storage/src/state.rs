//! Transition state value type and its line encoding.
//!
//! A [`TransitionState`] lists every action pre-suspend took, per category,
//! in the order it took them. Each category is stored as its own
//! newline-delimited file:
//!
//! | File | Line format |
//! |------|-------------|
//! | `nhi_disabled` | `<pci address>` |
//! | `xhci_disabled` | `<pci address>` |
//! | `hid_unbound` | `<hid id> <driver>` |
//! | `mmc_unbound` | `<mmc device>` |
//!
//! Identifiers never contain whitespace, so a single space is an unambiguous
//! separator.
//!
//! The cycle metadata next to them is a small TOML table.

use chrono::{DateTime, Utc};
use gz302_core::{DeviceCategory, DeviceRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{StorageError, StorageResult};

/// One persisted category of the transition state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateCategory {
    NhiDisabled,
    XhciDisabled,
    HidUnbound,
    MmcUnbound,
}

impl StateCategory {
    pub const ALL: [StateCategory; 4] = [
        Self::NhiDisabled,
        Self::XhciDisabled,
        Self::HidUnbound,
        Self::MmcUnbound,
    ];

    /// File name inside the store directory.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::NhiDisabled => "nhi_disabled",
            Self::XhciDisabled => "xhci_disabled",
            Self::HidUnbound => "hid_unbound",
            Self::MmcUnbound => "mmc_unbound",
        }
    }

    /// Device category the entries belong to.
    #[must_use]
    pub fn device_category(&self) -> DeviceCategory {
        match self {
            Self::NhiDisabled => DeviceCategory::ThunderboltNhi,
            Self::XhciDisabled => DeviceCategory::UsbHostController,
            Self::HidUnbound => DeviceCategory::AsusHid,
            Self::MmcUnbound => DeviceCategory::MmcBlock,
        }
    }
}

/// Record of everything one pre-suspend run changed.
///
/// Entries are insertion-ordered and unique per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionState {
    nhi_disabled: Vec<DeviceRecord>,
    xhci_disabled: Vec<DeviceRecord>,
    hid_unbound: Vec<(DeviceRecord, String)>,
    mmc_unbound: Vec<DeviceRecord>,
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) -> bool {
    if list.contains(&item) {
        return false;
    }
    list.push(item);
    true
}

impl TransitionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a Thunderbolt controller whose wakeup was disabled.
    ///
    /// Returns `false` if it was already recorded.
    pub fn record_nhi_disabled(&mut self, device: DeviceRecord) -> bool {
        push_unique(&mut self.nhi_disabled, device)
    }

    /// Record a USB host controller whose wakeup was disabled.
    pub fn record_xhci_disabled(&mut self, device: DeviceRecord) -> bool {
        push_unique(&mut self.xhci_disabled, device)
    }

    /// Record a HID device unbound from `driver`.
    pub fn record_hid_unbound(&mut self, device: DeviceRecord, driver: impl Into<String>) -> bool {
        let driver = driver.into();
        let device = device.with_driver(driver.clone());
        push_unique(&mut self.hid_unbound, (device, driver))
    }

    /// Record an MMC device unbound from mmcblk.
    pub fn record_mmc_unbound(&mut self, device: DeviceRecord) -> bool {
        push_unique(&mut self.mmc_unbound, device)
    }

    pub fn nhi_disabled(&self) -> &[DeviceRecord] {
        &self.nhi_disabled
    }

    pub fn xhci_disabled(&self) -> &[DeviceRecord] {
        &self.xhci_disabled
    }

    pub fn hid_unbound(&self) -> &[(DeviceRecord, String)] {
        &self.hid_unbound
    }

    pub fn mmc_unbound(&self) -> &[DeviceRecord] {
        &self.mmc_unbound
    }

    /// Number of entries in `category`.
    pub fn len_of(&self, category: StateCategory) -> usize {
        match category {
            StateCategory::NhiDisabled => self.nhi_disabled.len(),
            StateCategory::XhciDisabled => self.xhci_disabled.len(),
            StateCategory::HidUnbound => self.hid_unbound.len(),
            StateCategory::MmcUnbound => self.mmc_unbound.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        StateCategory::ALL.iter().all(|c| self.len_of(*c) == 0)
    }

    /// Encode one category as file content.
    pub fn encode(&self, category: StateCategory) -> String {
        let lines: Vec<String> = match category {
            StateCategory::NhiDisabled => addresses(&self.nhi_disabled),
            StateCategory::XhciDisabled => addresses(&self.xhci_disabled),
            StateCategory::HidUnbound => self
                .hid_unbound
                .iter()
                .map(|(device, driver)| format!("{} {}", device.bus_address, driver))
                .collect(),
            StateCategory::MmcUnbound => addresses(&self.mmc_unbound),
        };
        lines.iter().map(|line| format!("{line}\n")).collect()
    }

    /// Decode file content into `category`, appending to what is already
    /// there. Malformed lines are skipped and returned as errors.
    pub fn decode_into(&mut self, category: StateCategory, content: &str) -> Vec<StorageError> {
        let mut errors = Vec::new();
        for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Err(e) = self.decode_line(category, line) {
                errors.push(e);
            }
        }
        errors
    }

    fn decode_line(&mut self, category: StateCategory, line: &str) -> StorageResult<()> {
        let invalid = || StorageError::InvalidRecord {
            file: category.file_name().to_string(),
            line: line.to_string(),
        };
        let mut fields = line.split_whitespace();
        let id = fields.next().ok_or_else(invalid)?;
        let device = DeviceRecord::new(category.device_category(), id);
        match category {
            StateCategory::HidUnbound => {
                let driver = fields.next().ok_or_else(invalid)?;
                if fields.next().is_some() {
                    return Err(invalid());
                }
                self.record_hid_unbound(device, driver);
            }
            _ => {
                if fields.next().is_some() {
                    return Err(invalid());
                }
                match category {
                    StateCategory::NhiDisabled => self.record_nhi_disabled(device),
                    StateCategory::XhciDisabled => self.record_xhci_disabled(device),
                    _ => self.record_mmc_unbound(device),
                };
            }
        }
        Ok(())
    }
}

fn addresses(devices: &[DeviceRecord]) -> Vec<String> {
    devices.iter().map(|d| d.bus_address.clone()).collect()
}

/// Metadata about the cycle a stored state belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleInfo {
    /// Kernel boot id at pre-suspend time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot_id: Option<String>,

    /// When pre-suspend first persisted the state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub armed_at: Option<DateTime<Utc>>,
}

impl CycleInfo {
    pub fn new(boot_id: Option<String>, armed_at: DateTime<Utc>) -> Self {
        Self {
            boot_id,
            armed_at: Some(armed_at),
        }
    }

    /// Encode as a TOML table. Absent fields are left out.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Encode` if serialization fails.
    pub fn encode(&self) -> StorageResult<String> {
        Ok(toml::to_string(self)?)
    }

    /// Decode a TOML table. Unknown keys are ignored; unparsable content
    /// yields empty metadata.
    pub fn decode(content: &str) -> Self {
        toml::from_str(content).unwrap_or_else(|e| {
            warn!(error = %e, "Ignoring malformed cycle metadata");
            Self::default()
        })
    }

    /// Whether this cycle was armed during a different boot than `current`.
    ///
    /// Unknown boot ids on either side never count as stale.
    pub fn is_from_other_boot(&self, current: Option<&str>) -> bool {
        match (self.boot_id.as_deref(), current) {
            (Some(stored), Some(current)) => stored != current,
            _ => false,
        }
    }
}
