//! Structured logging initialization.
//!
//! Every pipeline worker process (spec §4.E) re-initializes its own
//! subscriber since workers share no in-memory state with the supervisor.
//! JSON output is used when stdout is not a terminal (child workers,
//! whose output is meant for log aggregation) and human-readable output
//! otherwise.

use std::io::IsTerminal;
use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber. Safe to call once per
/// process; a second call is a silent no-op since `tracing` only allows
/// one global default subscriber.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if std::io::stdout().is_terminal() {
        builder.try_init()
    } else {
        builder.json().try_init()
    };

    if let Err(e) = result {
        // Already initialized elsewhere (e.g. in-process tests); not fatal.
        tracing::trace!("tracing subscriber already initialized: {e}");
    }
}
