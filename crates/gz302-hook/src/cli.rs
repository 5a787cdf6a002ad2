//! Command line interface.
//!
//! `systemd-sleep` runs every executable in `/usr/lib/systemd/system-sleep/`
//! as `<hook> pre|post <action>`. The action is only logged.

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// GZ302 suspend/resume hardware-state coordinator
#[derive(Debug, Parser)]
#[command(name = "gz302-sleep-hook", version, about)]
pub struct Cli {
    /// Transition to run
    #[arg(value_enum)]
    pub phase: HookPhase,

    /// Sleep action passed by systemd-sleep
    #[arg(value_enum)]
    pub action: Option<SleepAction>,

    /// Configuration file
    #[arg(long, env = "GZ302_SLEEP_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Which half of the suspend cycle to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HookPhase {
    /// Before the system sleeps
    Pre,
    /// After the system resumes
    Post,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => write!(f, "pre"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// Sleep actions `systemd-sleep` reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SleepAction {
    Suspend,
    Hibernate,
    HybridSleep,
    SuspendThenHibernate,
}

impl fmt::Display for SleepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action_str = match self {
            Self::Suspend => "suspend",
            Self::Hibernate => "hibernate",
            Self::HybridSleep => "hybrid-sleep",
            Self::SuspendThenHibernate => "suspend-then-hibernate",
        };
        write!(f, "{}", action_str)
    }
}
