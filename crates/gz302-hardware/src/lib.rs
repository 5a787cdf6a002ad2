//! Sysfs device layer for the GZ302 sleep hook.
//!
//! This crate provides the [`DeviceBus`] abstraction over sysfs, a real
//! filesystem-backed implementation and an in-memory mock, plus the two
//! pieces of logic that sit directly on top of the bus:
//!
//! - [`Classifier`] finds the Thunderbolt NHI controllers, xHCI controllers,
//!   ASUS HID devices and unmounted MMC cards the hook manages.
//! - [`DeviceOps`] performs the individual wakeup, bind/unbind and USB
//!   reauthorize writes, each reported as an [`OpOutcome`].
//!
//! # Example
//!
//! ```
//! use gz302_hardware::{Classifier, DeviceOps, MockBus, MountTable};
//!
//! let bus = MockBus::new();
//! bus.add_pci_device("0000:c7:00.5", 0x0c0340, "enabled");
//!
//! let classifier = Classifier::new(&bus);
//! let ops = DeviceOps::new(&bus);
//! for nhi in classifier.thunderbolt_controllers() {
//!     assert!(ops.disable_wakeup_if_enabled(&nhi).is_applied());
//! }
//! ```
//!
//! # Error Handling
//!
//! Bus methods return [`Result<T>`][error::Result] with [`HardwareError`].
//! [`DeviceOps`] folds those errors into [`OpOutcome::Failed`] so callers
//! never abort a transition on a single device.

pub mod classifier;
pub mod error;
pub mod mock;
pub mod mounts;
pub mod ops;
pub mod sysfs;
pub mod traits;

pub use classifier::Classifier;
pub use error::{HardwareError, Result};
pub use mock::MockBus;
pub use mounts::{MountEntry, MountTable};
pub use ops::{DeviceAction, DeviceOps, OpOutcome, WakeupState};
pub use sysfs::SysfsBus;
pub use traits::DeviceBus;
