use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use pricing_engine::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = cli::Cli::parse();

    // The start command initializes tracing from the loaded configuration
    // instead, so it can honor the configured log level and format
    let is_start = matches!(args.get_command(), cli::Commands::Start);

    if !is_start {
        init_tracing();
    }

    // Dispatch to appropriate command handler
    match args.get_command() {
        cli::Commands::Start => {
            commands::start::execute().await?;
        }
        cli::Commands::Config { action } => match action {
            cli::ConfigCommands::Show => commands::config::show()?,
            cli::ConfigCommands::Validate => commands::config::validate()?,
        },
        cli::Commands::Version => {
            println!("Pricing Engine v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
