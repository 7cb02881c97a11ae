use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::{Path, PathBuf};

use super::{types::Config, ConfigError};

/// Names the configuration file; defaults to [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "NAIADE_CONFIG";

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Prefix of per-key overrides.
const ENV_PREFIX: &str = "NAIADE_";

/// Process-level variables sharing the prefix that are not config keys.
const NON_CONFIG_VARS: &[&str] = &["config", "log_format"];

/// Path of the configuration file for this process.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Loads `path`, then applies environment overrides.
///
/// Nested keys use a double underscore, e.g. `NAIADE_PHOTO__LOCK_TTL_SECS=20`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::from(Toml::file(path))
        .merge(
            Env::prefixed(ENV_PREFIX)
                .ignore(NON_CONFIG_VARS)
                .split("__"),
        )
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parses a TOML document without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[auth]
method = "none"

[ticket_auth]
method = "api_key"
api_key = "ticket-secret"

[server]
port = 9000
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.ticket_auth.api_key.as_deref(), Some("ticket-secret"));
    }

    #[test]
    fn test_load_config_from_str_missing_auth() {
        let toml = r#"
[server]
port = 8080
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_directory_is_not_a_config_file() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            load_config(dir.path()),
            Err(ConfigError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[auth]
method = "none"

[ticket_auth]
method = "none"

[server]
host = "127.0.0.1"
port = 3000

[file_server]
root = "/mnt/naiade_files"

[transfer]
io_retries = 3
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(
            config.file_server.ticket_dir("abc"),
            std::path::PathBuf::from("/mnt/naiade_files/abc")
        );
        assert_eq!(config.transfer.io_retries, 3);
        assert_eq!(config.transfer.io_retry_delay_ms, 500);
    }
}
