//! Fixed hardware identifiers and defaults for the GZ302 sleep hook.
//!
//! The identifiers in this module describe real silicon and firmware on the
//! ASUS ROG Flow Z13 (GZ302). They are part of the hook's external contract:
//! a transposed digit here silently disables wakeup on the wrong controller
//! or resets the wrong USB device, so every value is pinned by a unit test.
//!
//! # Identifier Summary
//!
//! | Constant | Value | Matches |
//! |----------|-------|---------|
//! | [`PCI_CLASS_USB4_NHI`] | `0x0c0340` | Thunderbolt/USB4 host interface |
//! | [`PCI_CLASS_XHCI`] | `0x0c0330` | USB 3.x xHCI host controller |
//! | [`ASUS_HID_BUS_VENDOR`] | `0003:0B05` | ASUS devices on the HID-over-USB bus |
//! | [`KEYBOARD_USB_ID`] | `0b05:1a30` | keyboard/touchpad composite device |
//! | [`LIGHTBAR_USB_ID`] | `0b05:18c6` | rear window lightbar |
//! | [`KEYBOARD_XHCI_ADDRESS`] | `0000:c6:00.0` | controller that must stay wakeup-capable |

use crate::types::UsbId;

// ============================================================================
// PCI Class Codes
// ============================================================================

/// PCI class code of a USB4/Thunderbolt Native Host Interface.
///
/// Base class `0x0c` (serial bus), subclass `0x03` (USB), prog-if `0x40`
/// (USB4 host interface). Read from `/sys/bus/pci/devices/<addr>/class`.
pub const PCI_CLASS_USB4_NHI: u32 = 0x0c_03_40;

/// PCI class code of an xHCI USB host controller.
///
/// Base class `0x0c`, subclass `0x03`, prog-if `0x30` (xHCI).
pub const PCI_CLASS_XHCI: u32 = 0x0c_03_30;

// ============================================================================
// HID / USB Identifiers
// ============================================================================

/// HID bus type for USB (`BUS_USB` in the kernel's input headers).
pub const HID_BUS_USB: u16 = 0x0003;

/// ASUSTeK USB vendor id.
pub const ASUS_VENDOR_ID: u16 = 0x0b05;

/// Prefix of every ASUS HID device id under `/sys/bus/hid/devices`.
///
/// HID device names have the form `BBBB:VVVV:PPPP.NNNN`; the first two fields
/// are the bus type and vendor id in uppercase hex.
pub const ASUS_HID_BUS_VENDOR: &str = "0003:0B05";

/// Keyboard/touchpad composite USB device (N-KEY keyboard).
pub const KEYBOARD_USB_ID: UsbId = UsbId::new(ASUS_VENDOR_ID, 0x1a30);

/// Rear window lightbar USB device.
pub const LIGHTBAR_USB_ID: UsbId = UsbId::new(ASUS_VENDOR_ID, 0x18c6);

/// USB devices reauthorized on every resume, in reset order.
pub const RESET_ON_RESUME: [UsbId; 2] = [KEYBOARD_USB_ID, LIGHTBAR_USB_ID];

/// PCI address of the xHCI controller hosting the internal keyboard.
///
/// This controller is never placed in the disabled-wakeup set so the
/// keyboard can always wake the machine.
pub const KEYBOARD_XHCI_ADDRESS: &str = "0000:c6:00.0";

// ============================================================================
// Sysfs Attribute Values
// ============================================================================

/// Value of `power/wakeup` when the device may wake the system.
pub const WAKEUP_ENABLED: &str = "enabled";

/// Value of `power/wakeup` when the device may not wake the system.
pub const WAKEUP_DISABLED: &str = "disabled";

/// Kernel driver that owns MMC block devices.
pub const MMC_BLOCK_DRIVER: &str = "mmcblk";

// ============================================================================
// Paths
// ============================================================================

/// Root of the sysfs mount.
pub const DEFAULT_SYSFS_ROOT: &str = "/sys";

/// Live mount table of the calling process.
pub const DEFAULT_MOUNTS_PATH: &str = "/proc/self/mounts";

/// Random id regenerated by the kernel on every boot.
pub const DEFAULT_BOOT_ID_PATH: &str = "/proc/sys/kernel/random/boot_id";

/// State store directory. `/run` is a tmpfs cleared at boot.
pub const DEFAULT_STATE_DIR: &str = "/run/gz302-sleep";

/// Lighting restore program, invoked with no arguments after resume.
pub const DEFAULT_RESTORE_PROGRAM: &str = "/usr/local/bin/gz302-rgb-restore";

/// Optional configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/gz302/sleep-hook.toml";

/// Tag attached to every system log line.
pub const LOG_TAG: &str = "gz302-sleep";

// ============================================================================
// Settle Delays (milliseconds)
// ============================================================================

/// Pause after every device-control write.
pub const DEFAULT_WRITE_SETTLE_MS: u64 = 50;

/// Pause between deauthorizing and reauthorizing a USB device.
pub const DEFAULT_USB_RESET_PAUSE_MS: u64 = 500;

/// Wait for USB re-enumeration before rebinding HID devices.
pub const DEFAULT_HID_SETTLE_MS: u64 = 2000;

/// Wait after HID rebinding before restoring lighting.
pub const DEFAULT_RESTORE_SETTLE_MS: u64 = 1000;

/// Upper bound on waiting for the lighting restore program.
pub const DEFAULT_RESTORE_TIMEOUT_MS: u64 = 5000;
