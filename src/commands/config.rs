use anyhow::Result;
use colored::Colorize;
use pricing_engine::config::{self, Config};
use tracing::info;

/// Execute the config show command
///
/// Displays the current configuration with secrets masked
pub fn show() -> Result<()> {
    println!("{}", "Loading configuration...".yellow());
    info!("Loading configuration for display");

    let cfg = config::load_config()?;
    let sanitized = sanitize_secrets(&cfg);

    println!("{}", "Current Configuration:".green().bold());
    println!();

    // Serialize to TOML format
    let toml_string = toml::to_string_pretty(&sanitized)?;
    println!("{}", toml_string);

    Ok(())
}

/// Execute the config validate command
///
/// Validates the configuration file
pub fn validate() -> Result<()> {
    println!("{}", "Validating configuration...".yellow());
    info!("Validating configuration file");

    let cfg = config::load_config()?;

    println!("{}", "✓ Configuration is valid".green());
    println!();
    println!("{}", "Summary:".bold());
    println!("  API Keys: {}", cfg.api_keys.len());
    println!("  Option Store: {}", cfg.storage.database_url);
    println!(
        "  Metrics: {}",
        if cfg.metrics.enabled { "enabled" } else { "disabled" }
    );

    Ok(())
}

/// Sanitize secrets in configuration for safe display
fn sanitize_secrets(cfg: &Config) -> Config {
    let mut sanitized = cfg.clone();

    for key in &mut sanitized.api_keys {
        key.key = mask_api_key(&key.key);
    }

    sanitized
}

/// Mask an API key for safe display
///
/// Shows first 4 and last 4 characters with an ellipsis in between
/// Example: "pk-1234567890abcdef" -> "pk-1...cdef"
fn mask_api_key(key: &str) -> String {
    if key.len() <= 12 {
        // Too short to mask meaningfully
        return "***".to_string();
    }

    let prefix = &key[..4];
    let suffix = &key[key.len() - 4..];

    format!("{}...{}", prefix, suffix)
}
