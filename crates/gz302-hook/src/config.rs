//! Hook configuration.
//!
//! Every field has a default matching a stock GZ302 install, so the file is
//! optional. A present file only needs the keys it overrides:
//!
//! ```toml
//! hid_settle_ms = 3000
//! keyboard_controller = "0000:c6:00.0"
//! ```
//!
//! Hardware identifiers other than the keyboard controller address are not
//! configurable; they live in [`gz302_core::constants`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use gz302_core::constants::{
    DEFAULT_BOOT_ID_PATH, DEFAULT_CONFIG_PATH, DEFAULT_HID_SETTLE_MS, DEFAULT_MOUNTS_PATH,
    DEFAULT_RESTORE_PROGRAM, DEFAULT_RESTORE_SETTLE_MS, DEFAULT_RESTORE_TIMEOUT_MS,
    DEFAULT_STATE_DIR, DEFAULT_SYSFS_ROOT, DEFAULT_USB_RESET_PAUSE_MS, DEFAULT_WRITE_SETTLE_MS,
    KEYBOARD_XHCI_ADDRESS,
};
use serde::Deserialize;
use tracing::{debug, warn};

/// Runtime configuration for the sleep hook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HookConfig {
    /// Root of the sysfs mount
    pub sysfs_root: PathBuf,

    /// Mount table used to find mounted MMC cards
    pub mounts_path: PathBuf,

    /// Kernel boot id, used to detect a state store from another boot
    pub boot_id_path: PathBuf,

    /// State store directory
    pub state_dir: PathBuf,

    /// Lighting restore program
    pub restore_program: PathBuf,

    /// PCI address of the xHCI controller that keeps wakeup enabled
    pub keyboard_controller: String,

    /// Pause after each device-control write
    pub write_settle_ms: u64,

    /// Pause between USB deauthorize and reauthorize
    pub usb_reset_pause_ms: u64,

    /// Wait before rebinding HID devices
    pub hid_settle_ms: u64,

    /// Wait before invoking the lighting restore program
    pub restore_settle_ms: u64,

    /// Upper bound on waiting for the lighting restore program
    pub restore_timeout_ms: u64,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            mounts_path: PathBuf::from(DEFAULT_MOUNTS_PATH),
            boot_id_path: PathBuf::from(DEFAULT_BOOT_ID_PATH),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            restore_program: PathBuf::from(DEFAULT_RESTORE_PROGRAM),
            keyboard_controller: KEYBOARD_XHCI_ADDRESS.to_string(),
            write_settle_ms: DEFAULT_WRITE_SETTLE_MS,
            usb_reset_pause_ms: DEFAULT_USB_RESET_PAUSE_MS,
            hid_settle_ms: DEFAULT_HID_SETTLE_MS,
            restore_settle_ms: DEFAULT_RESTORE_SETTLE_MS,
            restore_timeout_ms: DEFAULT_RESTORE_TIMEOUT_MS,
        }
    }
}

impl HookConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error on invalid TOML or unknown keys.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("invalid hook configuration")
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load `explicit`, or the default path if none was given, falling back
    /// to defaults on any problem.
    ///
    /// A missing default file is normal and logged at debug level; anything
    /// else is logged as a warning. Never fails.
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = explicit.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
        if explicit.is_none() && !path.exists() {
            debug!(path = %path.display(), "No configuration file, using defaults");
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                debug!(path = %path.display(), "Configuration loaded");
                config
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{e:#}"),
                    "Configuration ignored, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Set the sysfs root
    pub fn sysfs_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_root = root.into();
        self
    }

    /// Set the state store directory
    pub fn state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    /// Set the boot id path
    pub fn boot_id_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.boot_id_path = path.into();
        self
    }

    /// Set every settle delay to zero
    pub fn without_delays(mut self) -> Self {
        self.write_settle_ms = 0;
        self.usb_reset_pause_ms = 0;
        self.hid_settle_ms = 0;
        self.restore_settle_ms = 0;
        self
    }

    /// Whether `address` is the keyboard-hosting controller.
    ///
    /// Compares the full PCI address case-insensitively.
    pub fn is_keyboard_controller(&self, address: &str) -> bool {
        address.eq_ignore_ascii_case(self.keyboard_controller.trim())
    }

    pub fn write_settle(&self) -> Duration {
        Duration::from_millis(self.write_settle_ms)
    }

    pub fn usb_reset_pause(&self) -> Duration {
        Duration::from_millis(self.usb_reset_pause_ms)
    }

    pub fn hid_settle(&self) -> Duration {
        Duration::from_millis(self.hid_settle_ms)
    }

    pub fn restore_settle(&self) -> Duration {
        Duration::from_millis(self.restore_settle_ms)
    }

    pub fn restore_timeout(&self) -> Duration {
        Duration::from_millis(self.restore_timeout_ms)
    }
}
