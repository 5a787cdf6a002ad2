//! State store for the GZ302 sleep hook.
//!
//! Pre-suspend and post-resume run as separate processes. This crate provides
//! the only thing they share: a [`TransitionState`] value describing what
//! pre-suspend changed, and a [`StateStore`] that persists it under `/run`
//! (a tmpfs, so nothing survives a reboot).
//!
//! # Example
//!
//! ```no_run
//! use chrono::Utc;
//! use gz302_core::{DeviceCategory, DeviceRecord};
//! use gz302_storage::{CycleInfo, StateStore, TransitionState};
//!
//! # fn example() -> Result<(), gz302_storage::StorageError> {
//! let store = StateStore::default();
//!
//! let mut state = TransitionState::new();
//! state.record_nhi_disabled(DeviceRecord::new(DeviceCategory::ThunderboltNhi, "0000:c7:00.5"));
//! store.save(&state, &CycleInfo::new(None, Utc::now()))?;
//!
//! if let Some(stored) = store.load()? {
//!     assert_eq!(stored.state.nhi_disabled().len(), 1);
//! }
//! store.clear()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod state;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use state::{CycleInfo, StateCategory, TransitionState};
pub use store::{StateStore, StoredCycle};
