//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::EdgeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding the token signing secret.
pub const ENV_SIGNING_SECRET: &str = "STREAMGATE_SIGNING_SECRET";

/// Environment variable overriding the cipher root secret.
pub const ENV_ROOT_SECRET: &str = "STREAMGATE_ROOT_SECRET";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
///
/// Secrets present in the environment override the file so key
/// material can stay out of config on disk.
pub fn load_config(path: &Path) -> Result<EdgeConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let mut config: EdgeConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    apply_env_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply secret overrides from the process environment.
pub fn apply_env_overrides(config: &mut EdgeConfig) {
    if let Ok(secret) = std::env::var(ENV_SIGNING_SECRET) {
        config.token.signing_secret = Some(secret);
    }
    if let Ok(secret) = std::env::var(ENV_ROOT_SECRET) {
        config.cipher.root_secret = Some(secret);
    }
}
