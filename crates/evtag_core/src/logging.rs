//! Structured logging setup.
//!
//! Installs a `tracing` subscriber filtered by `RUST_LOG`. Logging stays off unless the
//! environment asks for it.

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Initialize tracing once per process.
///
/// - Env filter from `RUST_LOG` (defaults to "off")
/// - Compact formatting with targets
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));

        // A subscriber may already be installed by the embedding application.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(true).with_thread_ids(false))
            .try_init();
    });
}
