//! Shared vocabulary for the GZ302 sleep hook.
//!
//! Holds the fixed hardware identifiers the hook is built around, the device
//! record and cycle phase types exchanged between crates, and the core error
//! type.

pub mod constants;
pub mod error;
pub mod phase;
pub mod types;

pub use error::{Error, Result};
pub use phase::{CyclePhase, PhaseTracker};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
