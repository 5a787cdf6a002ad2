//! Lighting restore collaborator.
//!
//! After resume the keyboard and lightbar come back dark. A separate program
//! knows the last lighting setting and reapplies it; the hook only runs it
//! with no arguments and logs how it went. Its exit status never affects the
//! hook's own.

#![allow(async_fn_in_trait)]

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

/// How a restore invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Exited with status 0.
    Succeeded,
    /// Exited with a non-zero status, or was killed by a signal (`None`).
    Exited(Option<i32>),
    /// Program not installed.
    Missing,
    /// Program could not be started or waited on.
    SpawnFailed(String),
    /// Still running when the wait bound expired. It is left running.
    TimedOut,
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Exited(Some(code)) => write!(f, "exited with status {code}"),
            Self::Exited(None) => write!(f, "killed by signal"),
            Self::Missing => write!(f, "not installed"),
            Self::SpawnFailed(reason) => write!(f, "spawn failed: {reason}"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Something that restores keyboard and lightbar lighting.
pub trait LightingRestore {
    /// Run the restore. Never fails; the outcome is for logging.
    async fn restore(&self) -> RestoreOutcome;
}

/// Runs the restore program as a child process.
#[derive(Debug, Clone)]
pub struct ProgramRestore {
    program: PathBuf,
    timeout: Duration,
}

impl ProgramRestore {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl LightingRestore for ProgramRestore {
    async fn restore(&self) -> RestoreOutcome {
        let program = self.program.display().to_string();
        if !self.program.exists() {
            warn!(program = %program, "Lighting restore program not installed");
            return RestoreOutcome::Missing;
        }

        let spawned = Command::new(&self.program)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %program, error = %e, "Lighting restore failed to start");
                return RestoreOutcome::SpawnFailed(e.to_string());
            }
        };

        let outcome = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => RestoreOutcome::Succeeded,
            Ok(Ok(status)) => RestoreOutcome::Exited(status.code()),
            Ok(Err(e)) => RestoreOutcome::SpawnFailed(e.to_string()),
            // dropping the handle does not kill the child
            Err(_) => RestoreOutcome::TimedOut,
        };

        match &outcome {
            RestoreOutcome::Succeeded => info!(program = %program, "Lighting restored"),
            other => warn!(
                program = %program,
                outcome = %other,
                "Lighting restore did not succeed"
            ),
        }
        outcome
    }
}

/// Restore double that counts invocations.
#[derive(Debug)]
pub struct MockRestore {
    calls: AtomicUsize,
    outcome: RestoreOutcome,
}

impl MockRestore {
    /// A restore that always reports `outcome`.
    pub fn returning(outcome: RestoreOutcome) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome,
        }
    }

    /// Number of times `restore` ran.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockRestore {
    fn default() -> Self {
        Self::returning(RestoreOutcome::Succeeded)
    }
}

impl LightingRestore for MockRestore {
    async fn restore(&self) -> RestoreOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

impl<R: LightingRestore> LightingRestore for &R {
    async fn restore(&self) -> RestoreOutcome {
        (**self).restore().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_missing_program() {
        let restore = ProgramRestore::new("/nonexistent/gz302-rgb-restore", TIMEOUT);
        assert_eq!(restore.restore().await, RestoreOutcome::Missing);
    }

    #[tokio::test]
    async fn test_successful_program() {
        if !Path::new("/bin/true").exists() {
            return;
        }
        let restore = ProgramRestore::new("/bin/true", TIMEOUT);
        assert_eq!(restore.restore().await, RestoreOutcome::Succeeded);
    }

    #[tokio::test]
    async fn test_failing_program() {
        if !Path::new("/bin/false").exists() {
            return;
        }
        let restore = ProgramRestore::new("/bin/false", TIMEOUT);
        assert_eq!(restore.restore().await, RestoreOutcome::Exited(Some(1)));
    }

    #[tokio::test]
    async fn test_mock_counts_calls() {
        let restore = MockRestore::returning(RestoreOutcome::TimedOut);
        assert_eq!(restore.restore().await, RestoreOutcome::TimedOut);
        assert_eq!((&restore).restore().await, RestoreOutcome::TimedOut);
        assert_eq!(restore.calls(), 2);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(RestoreOutcome::Exited(Some(2)).to_string(), "exited with status 2");
        assert_eq!(RestoreOutcome::Missing.to_string(), "not installed");
    }
}
