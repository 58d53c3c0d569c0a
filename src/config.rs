//! Application configuration
//!
//! Loads `config.toml` from the user's config directory. A missing or
//! malformed file falls back to defaults so the application always starts.

use std::path::PathBuf;

use serde::Deserialize;
use tracing::{error, info};

/// Top-level configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recognizer: RecognizerConfig,
    pub storage: StorageConfig,
}

/// Recognition service settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    /// Endpoint the finished WAV clip is POSTed to
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8750/transcribe".to_string(),
            timeout_secs: 15,
        }
    }
}

/// History database settings
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Custom database location (None = use the default data directory)
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Resolve the history database path
    ///
    /// Returns the configured path if set, otherwise a default under the
    /// user's data directory. `None` only when no data directory exists
    /// on this platform.
    pub fn database_path(&self) -> Option<PathBuf> {
        if let Some(ref custom) = self.storage.database_path {
            return Some(custom.clone());
        }
        dirs::data_dir().map(|d| d.join("voicelog").join("history.db"))
    }
}

/// Get the configuration file path
fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("voicelog").join("config.toml"))
}

/// Load configuration from disk
///
/// Returns defaults if the file doesn't exist or can't be read.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };

    if !path.exists() {
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                info!("Loaded configuration from {:?}", path);
                config
            }
            Err(e) => {
                error!("Failed to parse configuration: {}", e);
                Config::default()
            }
        },
        Err(e) => {
            error!("Failed to read configuration file: {}", e);
            Config::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.recognizer.timeout_secs, 15);
        assert!(config.recognizer.endpoint.ends_with("/transcribe"));
        assert!(config.storage.database_path.is_none());
    }

    #[test]
    fn test_partial_override() {
        let config: Config = toml::from_str(
            r#"
            [recognizer]
            endpoint = "http://stt.local/v1/recognize"

            [storage]
            database_path = "/tmp/voicelog-test.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.recognizer.endpoint, "http://stt.local/v1/recognize");
        // Unset fields keep their defaults.
        assert_eq!(config.recognizer.timeout_secs, 15);
        assert_eq!(
            config.database_path(),
            Some(PathBuf::from("/tmp/voicelog-test.db"))
        );
    }
}
