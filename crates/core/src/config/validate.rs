use super::{types::Config, ConfigError};

const TOKEN_PLACEHOLDER: &str = "YOUR_API_TOKEN";

/// Validate and normalize configuration.
///
/// The token is required and must not be the placeholder. Out-of-range
/// numeric values are clamped back to their defaults rather than rejected.
pub fn validate_config(config: &mut Config) -> Result<(), ConfigError> {
    if config.token.is_empty() || config.token == TOKEN_PLACEHOLDER {
        return Err(ConfigError::ValidationError(
            "provider API token is required".to_string(),
        ));
    }

    if config.concurrent_requests < 1 {
        config.concurrent_requests = 32;
    }
    if config.general_rate_limit < 1 {
        config.general_rate_limit = 60;
    }
    if config.torrents_rate_limit < 1 {
        config.torrents_rate_limit = 25;
    }
    if config.watch_mode_interval < 10 {
        config.watch_mode_interval = 60;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            token: "abc123".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_valid_config() {
        let mut config = valid_config();
        assert!(validate_config(&mut config).is_ok());
    }

    #[test]
    fn test_validate_empty_token_fails() {
        let mut config = Config::default();
        let result = validate_config(&mut config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_placeholder_token_fails() {
        let mut config = Config {
            token: TOKEN_PLACEHOLDER.to_string(),
            ..Default::default()
        };
        let result = validate_config(&mut config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_clamps_out_of_range_values() {
        let mut config = Config {
            concurrent_requests: 0,
            general_rate_limit: 0,
            torrents_rate_limit: 0,
            watch_mode_interval: 5,
            ..valid_config()
        };
        validate_config(&mut config).unwrap();
        assert_eq!(config.concurrent_requests, 32);
        assert_eq!(config.general_rate_limit, 60);
        assert_eq!(config.torrents_rate_limit, 25);
        assert_eq!(config.watch_mode_interval, 60);
    }

    #[test]
    fn test_validate_keeps_in_range_values() {
        let mut config = Config {
            concurrent_requests: 8,
            watch_mode_interval: 10,
            ..valid_config()
        };
        validate_config(&mut config).unwrap();
        assert_eq!(config.concurrent_requests, 8);
        assert_eq!(config.watch_mode_interval, 10);
    }
}
