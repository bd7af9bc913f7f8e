//! Tracing init.
//!
//! SKILLPORT_LOG_LEVEL controls verbosity, SKILLPORT_LOG_JSON switches the
//! subscriber to JSON lines, SKILLPORT_QUIET drops below-warn output.

use std::env;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Initialize tracing. Call once at process startup.
pub fn init_tracing() {
    let level: String = if is_quiet() {
        "skillport=warn".to_string()
    } else {
        env::var("SKILLPORT_LOG_LEVEL").unwrap_or_else(|_| "skillport=info".to_string())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let json = env::var("SKILLPORT_LOG_JSON")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);

    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn is_quiet() -> bool {
    env::var("SKILLPORT_QUIET")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false)
}
