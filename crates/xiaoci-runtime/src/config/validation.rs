//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, XiaociConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &XiaociConfig) -> ConfigResult<()> {
    validate_url(&config.connection.url, "connection.url", &["ws://", "wss://"])?;
    if config.connection.reconnect_delay_secs == 0 {
        return Err(ConfigError::validation(
            "connection.reconnect_delay_secs must be greater than 0",
        ));
    }

    validate_url(&config.api.url, "api.url", &["http://", "https://"])?;
    if config.api.timeout_secs == 0 {
        return Err(ConfigError::validation(
            "api.timeout_secs must be greater than 0",
        ));
    }

    if config.dedup.capacity == 0 {
        return Err(ConfigError::validation(
            "dedup.capacity must be greater than 0",
        ));
    }

    validate_logging(&config.logging)
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}

fn validate_url(url: &str, field: &str, schemes: &[&str]) -> ConfigResult<()> {
    if url.is_empty() {
        return Err(ConfigError::missing_field(field));
    }
    if !schemes.iter().any(|s| url.starts_with(s)) {
        return Err(ConfigError::invalid_url(
            url,
            format!("URL must start with one of: {schemes:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&XiaociConfig::default()).is_ok());
    }

    #[test]
    fn test_wrong_scheme() {
        let mut config = XiaociConfig::default();
        config.connection.url = "http://127.0.0.1:3001".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let mut config = XiaociConfig::default();
        config.api.url = "ws://127.0.0.1:3000".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_empty_url_is_missing() {
        let mut config = XiaociConfig::default();
        config.api.url.clear();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { field }) if field == "api.url"
        ));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = XiaociConfig::default();
        config.dedup.capacity = 0;
        assert!(validate_config(&config).is_err());

        let mut config = XiaociConfig::default();
        config.connection.reconnect_delay_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = XiaociConfig::default();
        config.api.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = XiaociConfig::default();
        config.logging.output = LogOutput::File;
        config.logging.file_path = None;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }
}
