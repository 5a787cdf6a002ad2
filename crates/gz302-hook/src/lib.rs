//! Sleep hook for the ASUS ROG Flow Z13 (GZ302).
//!
//! `systemd-sleep` runs the `gz302-sleep-hook` binary twice per cycle. Before
//! sleep it quiets the devices that otherwise wake the machine or hang it on
//! resume; after resume it puts them back and restores keyboard lighting.
//!
//! The library half exists so the coordinator can be driven against a
//! [`MockBus`](gz302_hardware::MockBus) and a [`MockRestore`] in tests.
//!
//! # Example
//!
//! ```
//! use gz302_hardware::MockBus;
//! use gz302_hook::{Coordinator, HookConfig, MockRestore};
//! use gz302_storage::StateStore;
//!
//! # async fn example(state_dir: &std::path::Path) {
//! let bus = MockBus::new();
//! bus.add_pci_device("0000:c7:00.5", 0x0c0340, "enabled");
//!
//! let config = HookConfig::default().state_dir(state_dir).without_delays();
//! let restore = MockRestore::default();
//! let mut hook = Coordinator::new(&bus, StateStore::new(state_dir), &restore, config);
//!
//! let state = hook.run_pre().await;
//! assert_eq!(state.nhi_disabled().len(), 1);
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod logging;
pub mod restore;

pub use cli::{Cli, HookPhase, SleepAction};
pub use config::HookConfig;
pub use coordinator::{Coordinator, PostReport};
pub use restore::{LightingRestore, MockRestore, ProgramRestore, RestoreOutcome};
