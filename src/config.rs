//! Configuration loading and management

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UNMUTE_DELAY_MS: u64 = 500;

/// Configuration problems; all of them are fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("VAPI_API_KEY is not set; the voice assistant cannot be initialised")]
    MissingApiKey,

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Server configuration
#[derive(Clone)]
pub struct Config {
    /// Interface to bind
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Static assets served at `/`, including `index.html`
    pub static_dir: PathBuf,
    /// Bundled UI served at `/dist`
    pub dist_dir: PathBuf,
    /// Public key handed to the browser voice SDK
    pub vapi_api_key: String,
    /// Wait after session confirmation before opening a push-to-talk microphone
    pub unmute_delay: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("static_dir", &self.static_dir)
            .field("dist_dir", &self.dist_dir)
            .field("vapi_api_key", &"<redacted>")
            .field("unmute_delay", &self.unmute_delay)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vapi_api_key = var("VAPI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let port = match var("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let unmute_delay_ms = match var("PTT_UNMUTE_DELAY_MS") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "PTT_UNMUTE_DELAY_MS",
                value: raw.clone(),
            })?,
            None => DEFAULT_UNMUTE_DELAY_MS,
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            static_dir: var("STATIC_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("public")),
            dist_dir: var("DIST_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("dist")),
            vapi_api_key,
            unmute_delay: Duration::from_millis(unmute_delay_ms),
        })
    }

    /// Entry page served for `/`
    pub fn index_path(&self) -> PathBuf {
        self.static_dir.join("index.html")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load_with(&[("VAPI_API_KEY", "pk-test")]).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.dist_dir, PathBuf::from("dist"));
        assert_eq!(config.unmute_delay, Duration::from_millis(500));
        assert_eq!(config.index_path(), PathBuf::from("public").join("index.html"));
    }

    #[test]
    fn test_config_overrides() {
        let config = load_with(&[
            ("VAPI_API_KEY", "pk-test"),
            ("PORT", "8080"),
            ("STATIC_DIR", "/srv/www"),
            ("PTT_UNMUTE_DELAY_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
        assert_eq!(config.unmute_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        assert!(matches!(load_with(&[]), Err(ConfigError::MissingApiKey)));
        assert!(matches!(
            load_with(&[("VAPI_API_KEY", "  ")]),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_invalid_port() {
        let err = load_with(&[("VAPI_API_KEY", "pk-test"), ("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = load_with(&[("VAPI_API_KEY", "pk-secret")]).unwrap();
        assert!(!format!("{config:?}").contains("pk-secret"));
    }
}
