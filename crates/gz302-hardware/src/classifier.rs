//! Device classification.
//!
//! Walks the PCI, HID and USB device namespaces plus the mmcblk driver
//! namespace and picks out the devices the hook manages:
//!
//! | Category | Source | Rule |
//! |----------|--------|------|
//! | `ThunderboltNhi` | `bus/pci/devices/*/class` | equals `0x0c0340` |
//! | `UsbHostController` | `bus/pci/devices/*/class` | equals `0x0c0330` |
//! | `AsusHid` | `bus/hid/devices/*` | id starts with `0003:0B05` |
//! | `MmcBlock` | `bus/mmc/drivers/mmcblk/*` | bound card not backing a mount |
//!
//! Classification is a pure read. A device whose attributes cannot be read
//! (permission, hot-unplug race) is skipped.

use gz302_core::constants::{
    ASUS_HID_BUS_VENDOR, MMC_BLOCK_DRIVER, PCI_CLASS_USB4_NHI, PCI_CLASS_XHCI,
};
use gz302_core::{DeviceCategory, DeviceRecord, UsbId, parse_pci_class};
use tracing::debug;

use crate::mounts::MountTable;
use crate::traits::DeviceBus;

const PCI_DEVICES: &str = "bus/pci/devices";
const HID_DEVICES: &str = "bus/hid/devices";
const USB_DEVICES: &str = "bus/usb/devices";

/// Classifies devices visible on a [`DeviceBus`].
///
/// # Examples
///
/// ```
/// use gz302_core::DeviceCategory;
/// use gz302_hardware::{Classifier, MockBus, MountTable};
///
/// let bus = MockBus::new();
/// bus.add_pci_device("0000:c7:00.5", 0x0c0340, "enabled");
///
/// let devices = Classifier::new(&bus).classify(&MountTable::default());
/// assert_eq!(devices[0].category, DeviceCategory::ThunderboltNhi);
/// ```
pub struct Classifier<'a, B: DeviceBus> {
    bus: &'a B,
}

impl<'a, B: DeviceBus> Classifier<'a, B> {
    pub fn new(bus: &'a B) -> Self {
        Self { bus }
    }

    /// Every managed device, grouped by category in [`DeviceCategory::ALL`]
    /// order.
    pub fn classify(&self, mounts: &MountTable) -> Vec<DeviceRecord> {
        let mut devices = self.thunderbolt_controllers();
        devices.extend(self.usb_host_controllers());
        devices.extend(self.asus_hid_devices());
        devices.extend(self.mmc_block_devices(mounts));
        devices
    }

    /// PCI functions with the USB4/Thunderbolt NHI class code.
    pub fn thunderbolt_controllers(&self) -> Vec<DeviceRecord> {
        self.pci_by_class(PCI_CLASS_USB4_NHI, DeviceCategory::ThunderboltNhi)
    }

    /// PCI functions with the xHCI class code, including the keyboard host.
    pub fn usb_host_controllers(&self) -> Vec<DeviceRecord> {
        self.pci_by_class(PCI_CLASS_XHCI, DeviceCategory::UsbHostController)
    }

    fn pci_by_class(&self, class: u32, category: DeviceCategory) -> Vec<DeviceRecord> {
        self.list_or_empty(PCI_DEVICES)
            .into_iter()
            .filter(|address| {
                let path = format!("{PCI_DEVICES}/{address}/class");
                match self.bus.read_attr(&path).map(|raw| parse_pci_class(&raw)) {
                    Ok(Ok(value)) => value == class,
                    Ok(Err(e)) => {
                        debug!(device = %address, error = %e, "Skipping PCI device");
                        false
                    }
                    Err(e) => {
                        debug!(device = %address, error = %e, "Skipping PCI device");
                        false
                    }
                }
            })
            .map(|address| DeviceRecord::new(category, address))
            .collect()
    }

    /// ASUS HID devices, with their currently bound driver if any.
    pub fn asus_hid_devices(&self) -> Vec<DeviceRecord> {
        self.list_or_empty(HID_DEVICES)
            .into_iter()
            .filter(|id| is_asus_hid(id))
            .map(|id| {
                let link = format!("{HID_DEVICES}/{id}/driver");
                let driver = match self.bus.link_name(&link) {
                    Ok(driver) => driver,
                    Err(e) => {
                        debug!(device = %id, error = %e, "Cannot read HID driver link");
                        None
                    }
                };
                let record = DeviceRecord::new(DeviceCategory::AsusHid, id);
                match driver {
                    Some(driver) => record.with_driver(driver),
                    None => record,
                }
            })
            .collect()
    }

    /// MMC cards bound to mmcblk whose block devices back no mounted
    /// filesystem.
    ///
    /// A card whose block children cannot be listed is treated as possibly
    /// mounted and left out.
    pub fn mmc_block_devices(&self, mounts: &MountTable) -> Vec<DeviceRecord> {
        let driver_dir = format!("bus/mmc/drivers/{MMC_BLOCK_DRIVER}");
        self.list_or_empty(&driver_dir)
            .into_iter()
            .filter(|name| name.starts_with("mmc") && name.contains(':'))
            .filter(|id| {
                let block_dir = format!("bus/mmc/devices/{id}/block");
                match self.bus.list(&block_dir) {
                    Ok(blocks) => {
                        let mounted = blocks.iter().find(|block| mounts.backs_mount(block));
                        if let Some(block) = mounted {
                            debug!(
                                device = %id,
                                block = %block,
                                "MMC device is mounted, keeping it bound"
                            );
                        }
                        mounted.is_none()
                    }
                    Err(e) => {
                        debug!(
                            device = %id,
                            error = %e,
                            "Cannot list MMC block devices, keeping it bound"
                        );
                        false
                    }
                }
            })
            .map(|id| DeviceRecord::new(DeviceCategory::MmcBlock, id))
            .collect()
    }

    /// Paths under `bus/usb/devices` of every USB device matching `id`.
    pub fn usb_devices_matching(&self, id: UsbId) -> Vec<String> {
        self.list_or_empty(USB_DEVICES)
            .into_iter()
            .filter(|path| {
                let vendor = self.bus.read_attr(&format!("{USB_DEVICES}/{path}/idVendor"));
                let product = self.bus.read_attr(&format!("{USB_DEVICES}/{path}/idProduct"));
                match (vendor, product) {
                    (Ok(vendor), Ok(product)) => id.matches_attrs(&vendor, &product),
                    // interfaces and root hubs without ids
                    _ => false,
                }
            })
            .collect()
    }

    fn list_or_empty(&self, path: &str) -> Vec<String> {
        self.bus.list(path).unwrap_or_else(|e| {
            debug!(path = %path, error = %e, "Namespace not readable");
            Vec::new()
        })
    }
}

/// HID ids look like `0003:0B05:1A30.0001`; the bus/vendor tuple is compared
/// case-insensitively.
fn is_asus_hid(id: &str) -> bool {
    id.get(..ASUS_HID_BUS_VENDOR.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(ASUS_HID_BUS_VENDOR))
        && id[ASUS_HID_BUS_VENDOR.len()..].starts_with(':')
}
