//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{CqConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &CqConfig) -> ConfigResult<()> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::validation("Host cannot be empty"));
    }
    if config.port == 0 {
        return Err(ConfigError::InvalidPort(config.port));
    }
    if config.api_timeout_secs == 0 {
        return Err(ConfigError::validation(
            "API timeout must be greater than 0",
        ));
    }
    if config.data.as_os_str().is_empty() {
        return Err(ConfigError::validation("Data directory cannot be empty"));
    }
    validate_logging(&config.logging)
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output = \"file\"",
        ));
    }
    if let Some(target) = logging.filters.keys().find(|t| t.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Invalid logging filter target: {target:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&CqConfig::default()).is_ok());
    }

    #[test]
    fn test_empty_host() {
        let config = CqConfig {
            host: "  ".into(),
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_zero_port() {
        let config = CqConfig {
            port: 0,
            ..Default::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPort(0))
        ));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = CqConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some("cqbot.log".into());
        assert!(validate_config(&config).is_ok());
    }
}
