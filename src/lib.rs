pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod options;
pub mod rule;
pub mod server;
pub mod signals;
pub mod snapshot;
pub mod store;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging with environment defaults
///
/// Note: This function can only be called once per process. The server path
/// uses [`init_tracing_with`] instead, after the configuration is loaded.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

/// Initialize tracing/logging from the server configuration
///
/// `server.log_level` supplies the default filter (`RUST_LOG` still wins
/// when set, so a single run can be overridden without editing the file);
/// `log_format = "json"` switches the fmt layer to JSON output.
pub fn init_tracing_with(server: &crate::config::ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if server.log_format == "json" {
        registry.with(fmt::layer().with_target(true).json()).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
