//! # Logging
//!
//! Structured logging setup for binaries embedding keel-db.
//!
//! The library itself only emits `tracing` events:
//! ```text
//! info   connection opened / closed, unit of work created / disposed
//! debug  repository bound, statements run, transaction begin / end
//! warn   teardown failures, unit of work dropped without dispose
//! ```
//!
//! `RUST_LOG` overrides the default filter, e.g.
//! `RUST_LOG=keel_db=trace,sqlx=info cargo run --bin demo`.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,keel_db=debug,sqlx=warn";

/// Installs a formatting subscriber.
///
/// Returns `false` if a global subscriber was already installed, which
/// leaves the existing one in place.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
