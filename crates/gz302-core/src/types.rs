use crate::{Result, error::Error};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Managed hardware category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    /// Thunderbolt/USB4 NHI PCI function.
    ThunderboltNhi,
    /// xHCI USB host controller PCI function.
    UsbHostController,
    /// ASUS device on the HID bus.
    AsusHid,
    /// MMC card bound to the mmcblk driver.
    MmcBlock,
}

impl DeviceCategory {
    /// All categories, in the order the pre-suspend transition visits them.
    pub const ALL: [DeviceCategory; 4] = [
        Self::ThunderboltNhi,
        Self::UsbHostController,
        Self::AsusHid,
        Self::MmcBlock,
    ];

    /// Stable lowercase name used in log fields.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThunderboltNhi => "thunderbolt_nhi",
            Self::UsbHostController => "usb_host_controller",
            Self::AsusHid => "asus_hid",
            Self::MmcBlock => "mmc_block",
        }
    }

    /// Sysfs bus the category's devices live on.
    #[must_use]
    pub fn bus(&self) -> &'static str {
        match self {
            Self::ThunderboltNhi | Self::UsbHostController => "pci",
            Self::AsusHid => "hid",
            Self::MmcBlock => "mmc",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One managed hardware entity observed in the live enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Category the classifier assigned.
    pub category: DeviceCategory,

    /// Bus-specific identifier (PCI address, HID id, MMC device name).
    pub bus_address: String,

    /// Kernel driver bound at observation time. Only tracked for HID devices.
    pub driver_name: Option<String>,
}

impl DeviceRecord {
    /// Create a record with no driver.
    pub fn new(category: DeviceCategory, bus_address: impl Into<String>) -> Self {
        Self {
            category,
            bus_address: bus_address.into(),
            driver_name: None,
        }
    }

    /// Set the bound driver name.
    pub fn with_driver(mut self, driver_name: impl Into<String>) -> Self {
        self.driver_name = Some(driver_name.into());
        self
    }

    /// Sysfs directory of this device, relative to the sysfs root.
    #[must_use]
    pub fn sysfs_dir(&self) -> String {
        format!("bus/{}/devices/{}", self.category.bus(), self.bus_address)
    }
}

impl fmt::Display for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.driver_name {
            Some(driver) => write!(f, "{}:{}@{}", self.category, self.bus_address, driver),
            None => write!(f, "{}:{}", self.category, self.bus_address),
        }
    }
}

/// USB vendor:product pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsbId {
    pub vendor: u16,
    pub product: u16,
}

impl UsbId {
    #[must_use]
    pub const fn new(vendor: u16, product: u16) -> Self {
        Self { vendor, product }
    }

    /// Compare against the raw `idVendor`/`idProduct` sysfs attribute values.
    ///
    /// Attribute values are four hex digits without a prefix, possibly with
    /// a trailing newline.
    #[must_use]
    pub fn matches_attrs(&self, id_vendor: &str, id_product: &str) -> bool {
        let parse = |s: &str| u16::from_str_radix(s.trim(), 16).ok();
        parse(id_vendor) == Some(self.vendor) && parse(id_product) == Some(self.product)
    }
}

impl fmt::Display for UsbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor, self.product)
    }
}

impl std::str::FromStr for UsbId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (vendor, product) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidIdentifier(format!("expected vendor:product, got {s}")))?;
        let parse = |part: &str| {
            u16::from_str_radix(part, 16)
                .map_err(|_| Error::InvalidIdentifier(format!("invalid hex id: {part}")))
        };
        Ok(Self::new(parse(vendor)?, parse(product)?))
    }
}

/// Parse a PCI `class` attribute value such as `0x0c0330`.
///
/// # Errors
/// Returns `Error::InvalidIdentifier` if the value is not a hex number.
pub fn parse_pci_class(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    u32::from_str_radix(digits, 16)
        .map_err(|_| Error::InvalidIdentifier(format!("invalid PCI class: {trimmed}")))
}
