use crate::config::types::{Config, DatabaseConfig, FetchConfig, RegistryConfig};
use crate::ConfigError;
use url::Url;

/// Largest page size the registry accepts
const MAX_PAGE_SIZE: u32 = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_registry_config(&config.registry)?;
    validate_fetch_config(&config.fetch)?;
    validate_database_config(&config.database)?;
    Ok(())
}

/// Validates registry configuration
fn validate_registry_config(config: &RegistryConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.endpoint)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint '{}': {}", config.endpoint, e)))?;

    // http is allowed so mock registries can be used in tests
    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' must use HTTP or HTTPS",
            config.endpoint
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' has no host",
            config.endpoint
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch policy
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.page_size < 1 || config.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::Validation(format!(
            "page_size must be between 1 and {}, got {}",
            MAX_PAGE_SIZE, config.page_size
        )));
    }

    for (name, value) in [
        ("network_retries", config.network_retries),
        ("status_retries", config.status_retries),
        ("parse_retries", config.parse_retries),
        ("parse_tolerance", config.parse_tolerance),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1, got {}",
                name, value
            )));
        }
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.progress_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "progress_interval must be >= 1, got {}",
            config.progress_interval
        )));
    }

    Ok(())
}

/// Validates database configuration
fn validate_database_config(config: &DatabaseConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
