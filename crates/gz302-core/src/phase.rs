//! Suspend cycle phase tracking.
//!
//! A suspend cycle moves through three phases:
//!
//! - `Idle`: no state store exists
//! - `Armed`: pre-suspend persisted its record, the machine may sleep
//! - `Resuming`: post-resume loaded the record and is reversing it
//!
//! # Valid Transitions
//!
//! - Idle → Armed (pre-suspend persisted)
//! - Armed → Resuming (post-resume loaded the record)
//! - Resuming → Idle (record deleted)
//!
//! The two hook invocations run in separate processes, so each one seeds a
//! [`PhaseTracker`] from the phase implied by the state store on disk.
//!
//! # Examples
//!
//! ```
//! use gz302_core::{CyclePhase, PhaseTracker};
//!
//! let mut tracker = PhaseTracker::starting_at(CyclePhase::Armed);
//! tracker.transition_to(CyclePhase::Resuming).unwrap();
//! tracker.transition_to(CyclePhase::Idle).unwrap();
//!
//! assert!(tracker.transition_to(CyclePhase::Resuming).is_err());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Phase of one suspend cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Idle,
    Armed,
    Resuming,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase_str = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Armed => "armed",
            CyclePhase::Resuming => "resuming",
        };
        write!(f, "{}", phase_str)
    }
}

impl CyclePhase {
    /// Check if transition to `target` is valid from this phase.
    ///
    /// # Examples
    ///
    /// ```
    /// use gz302_core::CyclePhase;
    ///
    /// assert!(CyclePhase::Idle.can_transition_to(&CyclePhase::Armed));
    /// assert!(!CyclePhase::Idle.can_transition_to(&CyclePhase::Resuming));
    /// ```
    pub fn can_transition_to(&self, target: &CyclePhase) -> bool {
        matches!(
            (self, target),
            (CyclePhase::Idle, CyclePhase::Armed)
                | (CyclePhase::Armed, CyclePhase::Resuming)
                | (CyclePhase::Resuming, CyclePhase::Idle)
        )
    }
}

/// Tracks the current phase of this process.
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: CyclePhase,
}

impl PhaseTracker {
    /// Start tracking from a phase observed on disk.
    pub fn starting_at(phase: CyclePhase) -> Self {
        Self { current: phase }
    }

    /// Current phase.
    pub fn current(&self) -> CyclePhase {
        self.current
    }

    /// Move to `target`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidStateTransition` if the transition is not one of
    /// the three valid edges. The current phase is left unchanged.
    pub fn transition_to(&mut self, target: CyclePhase) -> Result<()> {
        if !self.current.can_transition_to(&target) {
            return Err(Error::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }
        self.current = target;
        Ok(())
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::starting_at(CyclePhase::Idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(CyclePhase::Idle, CyclePhase::Armed, true)]
    #[case(CyclePhase::Armed, CyclePhase::Resuming, true)]
    #[case(CyclePhase::Resuming, CyclePhase::Idle, true)]
    #[case(CyclePhase::Idle, CyclePhase::Resuming, false)]
    #[case(CyclePhase::Armed, CyclePhase::Idle, false)]
    #[case(CyclePhase::Resuming, CyclePhase::Armed, false)]
    #[case(CyclePhase::Armed, CyclePhase::Armed, false)]
    fn test_transitions(#[case] from: CyclePhase, #[case] to: CyclePhase, #[case] valid: bool) {
        assert_eq!(from.can_transition_to(&to), valid);
    }

    #[test]
    fn test_full_cycle() {
        let mut tracker = PhaseTracker::default();
        tracker.transition_to(CyclePhase::Armed).unwrap();
        assert_eq!(tracker.current(), CyclePhase::Armed);
        tracker.transition_to(CyclePhase::Resuming).unwrap();
        tracker.transition_to(CyclePhase::Idle).unwrap();

        assert_eq!(tracker.current(), CyclePhase::Idle);
    }

    #[test]
    fn test_invalid_transition_keeps_phase() {
        let mut tracker = PhaseTracker::starting_at(CyclePhase::Armed);
        let err = tracker.transition_to(CyclePhase::Idle).unwrap_err();

        assert_eq!(err.to_string(), "Invalid state transition from armed to idle");
        assert_eq!(tracker.current(), CyclePhase::Armed);
    }
}
