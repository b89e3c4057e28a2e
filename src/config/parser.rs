use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable that replaces `registry.endpoint`
pub const ENDPOINT_VAR: &str = "REGISTRY_ML_ENDPOINT";

/// Environment variable that replaces `database.path`
pub const DATABASE_PATH_VAR: &str = "DATABASE_PATH";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    validate(&config)?;

    Ok(config)
}

/// Replaces config values with the matching environment variables, if set
///
/// `lookup` resolves a variable name to its value. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = lookup(ENDPOINT_VAR).filter(|v| !v.trim().is_empty()) {
        tracing::debug!("Registry endpoint overridden by {}", ENDPOINT_VAR);
        config.registry.endpoint = endpoint;
    }

    if let Some(path) = lookup(DATABASE_PATH_VAR).filter(|v| !v.trim().is_empty()) {
        tracing::debug!("Database path overridden by {}", DATABASE_PATH_VAR);
        config.database.path = path;
    }
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Stored with every run so runs can be traced back to the config that
/// produced them.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
