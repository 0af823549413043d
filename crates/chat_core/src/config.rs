use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_GREETING: &str = "Hello! I'm an AI assistant. How can I help you today?";

const CONFIG_FILE_PATH: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base URL of the assistant service; `/chat/` and `/health/` hang off it.
    pub api_url: String,
    /// Connect timeout for requests. Streams themselves are never timed out.
    pub request_timeout_secs: Option<u64>,
    /// Assistant message seeded into a fresh transcript. `None` starts empty.
    pub greeting: Option<String>,
    pub http_proxy: String,
    pub https_proxy: String,
    pub debug: bool,
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: None,
            greeting: Some(DEFAULT_GREETING.to_string()),
            http_proxy: String::new(),
            https_proxy: String::new(),
            debug: false,
        }
    }
}

impl Config {
    /// Defaults, then `config.toml` in the working directory, then env.
    pub fn load() -> Self {
        let mut config = Config::default();

        if Path::new(CONFIG_FILE_PATH).exists() {
            match Self::from_file(CONFIG_FILE_PATH) {
                Ok(file_config) => config = file_config,
                Err(e) => log::warn!("Ignoring {}: {}", CONFIG_FILE_PATH, e),
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<Config>(&content)?)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_url) = lookup("CHAT_API_URL") {
            self.api_url = api_url;
        }
        if let Some(timeout) = lookup("CHAT_REQUEST_TIMEOUT_SECS") {
            match timeout.trim().parse::<u64>() {
                Ok(secs) => self.request_timeout_secs = Some(secs),
                Err(_) => log::warn!("Invalid CHAT_REQUEST_TIMEOUT_SECS: {:?}", timeout),
            }
        }
        if let Some(greeting) = lookup("CHAT_GREETING") {
            self.greeting = Some(greeting).filter(|g| !g.trim().is_empty());
        }
        if let Some(http_proxy) = lookup("HTTP_PROXY") {
            self.http_proxy = http_proxy;
        }
        if let Some(https_proxy) = lookup("HTTPS_PROXY") {
            self.https_proxy = https_proxy;
        }
        if let Some(debug) = lookup("CHAT_DEBUG") {
            self.debug = parse_bool_env(&debug);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn parse_bool_env_true_values() {
        for value in ["1", "true", "TRUE", " yes ", "Y", "on"] {
            assert!(parse_bool_env(value), "value {value:?} should be true");
        }
    }

    #[test]
    fn parse_bool_env_false_values() {
        for value in ["0", "false", "no", "off", "", "  "] {
            assert!(!parse_bool_env(value), "value {value:?} should be false");
        }
    }

    #[test]
    fn env_overrides_replace_defaults() {
        let mut config = Config::default();
        config.apply_env_overrides(lookup_from(&[
            ("CHAT_API_URL", "http://chat.internal/api"),
            ("CHAT_REQUEST_TIMEOUT_SECS", "15"),
            ("CHAT_GREETING", ""),
            ("CHAT_DEBUG", "yes"),
        ]));

        assert_eq!(config.api_url, "http://chat.internal/api");
        assert_eq!(config.request_timeout_secs, Some(15));
        assert_eq!(config.greeting, None);
        assert!(config.debug);
    }

    #[test]
    fn invalid_timeout_keeps_previous_value() {
        let mut config = Config::default();
        config.apply_env_overrides(lookup_from(&[("CHAT_REQUEST_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.request_timeout_secs, None);
    }

    #[test]
    fn from_file_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"http://127.0.0.1:9000/api\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.api_url, "http://127.0.0.1:9000/api");
        assert_eq!(config.greeting.as_deref(), Some(DEFAULT_GREETING));
        assert!(!config.debug);
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = [").unwrap();

        assert!(matches!(Config::from_file(&path), Err(ConfigError::Toml(_))));
    }
}
