//! Logging initialization for the `etude` binary.
//!
//! Library crates log through the `log` facade; the subscriber installed
//! here also forwards those records. Output goes to stderr so that stdout
//! only carries command results.
//!
//! ```bash
//! # Show every statement sent to the server
//! etude --log-level debug tables
//!
//! # RUST_LOG wins over --log-level
//! RUST_LOG=etude_pg=trace etude databases
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging, using `level` when `RUST_LOG` is unset or invalid.
///
/// Call once at startup. A second call leaves the first subscriber in place.
pub fn init_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
