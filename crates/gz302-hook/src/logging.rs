//! System log output.
//!
//! After a hang that needs a hard power cycle, the journal is the only record
//! of what the hook did. Events go to journald tagged `gz302-sleep`, so
//! `journalctl -t gz302-sleep` shows both invocations of a cycle in order.
//! When the journal socket cannot be opened lines go to stderr, which
//! `systemd-sleep` also forwards to the journal.

use std::io;

use gz302_core::constants::LOG_TAG;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// Environment variable holding the log filter (`EnvFilter` syntax).
pub const LOG_FILTER_ENV: &str = "GZ302_SLEEP_LOG";

const DEFAULT_FILTER: &str = "info";

/// Build the filter from a directive string, falling back to `info` when it
/// is absent or does not parse.
fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let directives = std::env::var(LOG_FILTER_ENV).ok();
    let filter = filter_from(directives.as_deref());

    let (journald, unavailable) = match tracing_journald::layer() {
        Ok(layer) => (Some(layer.with_syslog_identifier(LOG_TAG.to_string())), None),
        Err(e) => (None, Some(e)),
    };
    let stderr = journald.is_none().then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(false)
            .without_time()
            .with_target(false)
    });

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(journald)
        .with(stderr)
        .try_init()
        .is_ok();

    if let (true, Some(e)) = (installed, unavailable) {
        warn!(error = %e, "Journal unavailable, logging to stderr");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tracing::level_filters::LevelFilter;

    #[rstest]
    #[case(None, LevelFilter::INFO)]
    #[case(Some("debug"), LevelFilter::DEBUG)]
    #[case(Some("warn"), LevelFilter::WARN)]
    #[case(Some("gz302=verbose"), LevelFilter::INFO)]
    fn test_filter_from(#[case] directives: Option<&str>, #[case] expected: LevelFilter) {
        assert_eq!(filter_from(directives).max_level_hint(), Some(expected));
    }

    #[test]
    fn test_init_twice() {
        init();
        init();
        tracing::info!("still logging after second init");
    }
}
