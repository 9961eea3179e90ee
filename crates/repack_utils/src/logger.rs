use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

const DEFAULT_FILTER: &str = "repack=info,repack_ir=info";

/// Initialise tracing subscriber once per process.
///
/// `RUST_LOG` overrides the default filter; `RUST_LOG=repack=trace` narrates
/// every individual rewrite the optimizer performs.
pub fn init_logging() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    });
}

/// Like [`init_logging`], but routes output through the test harness so it
/// only surfaces for failing tests.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_test_writer()
            .compact()
            .init();
    });
}
