use figment::{
    providers::{Env, Format, Json},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, validate::validate_config, ConfigError};

/// Load configuration, resolving the file from the standard locations.
///
/// Search order: the explicit `--config` argument, `./config.json`,
/// `/data/config.json`, `$HOME/.config/strmsync/config.json`. Environment
/// variables prefixed with `STRMSYNC_` override file values.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = resolve_config_path(explicit)?;
    load_config_file(&path)
}

/// Load configuration from a specific file with environment overrides.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let mut config: Config = Figment::new()
        .merge(Json::file(path))
        .merge(Env::prefixed("STRMSYNC_"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    validate_config(&mut config)?;

    Ok(config)
}

/// Load configuration from a JSON string (useful for testing).
pub fn load_config_from_str(json: &str) -> Result<Config, ConfigError> {
    let mut config: Config =
        serde_json::from_str(json).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&mut config)?;
    Ok(config)
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(p) = explicit {
        candidates.push(p.to_path_buf());
    }
    candidates.push(PathBuf::from("config.json"));
    candidates.push(PathBuf::from("/data/config.json"));
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(
            PathBuf::from(home)
                .join(".config")
                .join("strmsync")
                .join("config.json"),
        );
    }

    for candidate in &candidates {
        if candidate.exists() {
            return Ok(candidate.clone());
        }
    }

    Err(ConfigError::FileNotFound(format!(
        "no config file found in any of: {}",
        candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(r#"{ "token": "abc", "min_file_size_mb": 100 }"#).unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.min_file_size_mb, 100);
    }

    #[test]
    fn test_load_config_from_str_missing_token() {
        let result = load_config_from_str(r#"{ "output_dir": "/library" }"#);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config_file(Path::new("/nonexistent/config.json"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"{{ "token": "abc", "watch_mode_interval": 120 }}"#
        )
        .unwrap();

        let config = load_config_file(temp_file.path()).unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.watch_mode_interval, 120);
    }

    #[test]
    fn test_explicit_path_wins() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"{{ "token": "from-explicit" }}"#).unwrap();

        let config = load_config(Some(temp_file.path())).unwrap();
        assert_eq!(config.token, "from-explicit");
    }
}
