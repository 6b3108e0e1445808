use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub api_keys: Vec<ApiKeyConfig>,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
}

/// Bearer token granting access to the administrative API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    pub key: String,
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// SQLite URL for the option store (e.g., "sqlite:./data/pricing.db")
    pub database_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub endpoint: String,
}

pub fn load_config() -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::with_name("config"))
        .add_source(config::Environment::with_prefix("PRICING_ENGINE").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    // The admin surface is useless without at least one credential
    if cfg.api_keys.is_empty() {
        anyhow::bail!("At least one API key must be configured");
    }

    for key in &cfg.api_keys {
        if key.name.is_empty() {
            anyhow::bail!("API key name cannot be empty");
        }
        if key.key.is_empty() {
            anyhow::bail!("API key '{}' has an empty token", key.name);
        }
    }

    if cfg.storage.database_url.is_empty() {
        anyhow::bail!("storage.database_url cannot be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_config_requires_api_keys() {
        let mut cfg = create_test_config();
        cfg.api_keys.clear();

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("At least one API key must be configured"));
    }

    #[test]
    fn test_validate_config_requires_key_names() {
        let mut cfg = create_test_config();
        cfg.api_keys[0].name.clear();

        let result = validate_config(&cfg);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("API key name cannot be empty"));
    }

    #[test]
    fn test_validate_config_requires_database_url() {
        let mut cfg = create_test_config();
        cfg.storage.database_url.clear();

        let result = validate_config(&cfg);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_config_accepts_valid_config() {
        assert!(validate_config(&create_test_config()).is_ok());
    }

    fn create_test_config() -> Config {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                log_level: "info".to_string(),
                log_format: "json".to_string(),
            },
            api_keys: vec![ApiKeyConfig {
                key: "test-key".to_string(),
                name: "test".to_string(),
                enabled: true,
            }],
            storage: StorageConfig {
                database_url: "sqlite:./data/pricing.db".to_string(),
            },
            metrics: MetricsConfig {
                enabled: true,
                endpoint: "/metrics".to_string(),
            },
        }
    }
}
