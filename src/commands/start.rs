use anyhow::Result;
use colored::Colorize;
use pricing_engine::{config, init_tracing_with, server};
use tracing::info;

/// Execute the start command
///
/// Loads and validates the configuration, initializes tracing from it, then
/// runs the server in the foreground until a shutdown signal arrives.
pub async fn execute() -> Result<()> {
    println!("{}", "Starting pricing engine...".green());

    let cfg = config::load_config()?;

    // Tracing waits for the config so log_level/log_format apply
    init_tracing_with(&cfg.server);

    info!("Starting pricing engine in foreground mode");

    // Start the server (blocks until shutdown)
    server::start_server(cfg).await?;

    Ok(())
}
