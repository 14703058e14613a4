//! Configuration for the chat service.
//!
//! Every value comes from an environment variable with a default, so the
//! service starts with no configuration file at all.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Server port variable.
pub const PORT_ENV: &str = "DOCTOR_CHAT_PORT";
/// Prediction endpoint variable.
pub const PREDICT_URL_ENV: &str = "DOCTOR_CHAT_PREDICT_URL";
/// Generative-language API key variable.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Generative-language API base URL variable.
pub const GEMINI_URL_ENV: &str = "DOCTOR_CHAT_GEMINI_URL";
/// Generative-language model variable.
pub const GEMINI_MODEL_ENV: &str = "DOCTOR_CHAT_GEMINI_MODEL";
/// Preference file variable.
pub const PREFS_PATH_ENV: &str = "DOCTOR_CHAT_PREFS_PATH";
/// Static asset directory variable.
pub const STATIC_DIR_ENV: &str = "DOCTOR_CHAT_STATIC_DIR";
/// Live session cap variable.
pub const MAX_SESSIONS_ENV: &str = "DOCTOR_CHAT_MAX_SESSIONS";
/// Session idle timeout variable, in seconds.
pub const SESSION_IDLE_SECS_ENV: &str = "DOCTOR_CHAT_SESSION_IDLE_SECS";

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PREDICT_URL: &str = "http://127.0.0.1:8000/predict";
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_PREFS_PATH: &str = "doctor_chat_prefs.json";
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_MAX_SESSIONS: usize = 256;
const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A URL setting could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// A setting is out of range or malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for the chat service.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Full URL of the prediction endpoint.
    pub predict_url: String,
    /// Base URL of the generative-language API.
    pub gemini_base_url: String,
    /// Generative model name.
    pub gemini_model: String,
    /// API key for the generative-language API.
    pub gemini_api_key: Option<String>,
    /// Where the dark-mode preference is persisted.
    pub prefs_path: PathBuf,
    /// Directory holding the HTML pages.
    pub static_dir: PathBuf,
    /// Outbound connect timeout.
    pub connect_timeout: Duration,
    /// Outbound whole-request timeout.
    pub request_timeout: Duration,
    /// Most chat sessions kept in memory; the least recently used is dropped first.
    pub max_sessions: usize,
    /// Sessions untouched for this long are dropped on the next session creation.
    pub session_idle_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            predict_url: DEFAULT_PREDICT_URL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_URL.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_api_key: None,
            prefs_path: PathBuf::from(DEFAULT_PREFS_PATH),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_SECS),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    /// Returns an error if a looked-up value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup(PORT_ENV) {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{PORT_ENV} is not a port: {port}")))?;
        }
        if let Some(url) = lookup(PREDICT_URL_ENV) {
            config.predict_url = url;
        }
        if let Some(url) = lookup(GEMINI_URL_ENV) {
            config.gemini_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup(GEMINI_MODEL_ENV) {
            config.gemini_model = model;
        }
        config.gemini_api_key = lookup(GEMINI_API_KEY_ENV).filter(|key| !key.trim().is_empty());
        if let Some(path) = lookup(PREFS_PATH_ENV) {
            config.prefs_path = PathBuf::from(path);
        }
        if let Some(dir) = lookup(STATIC_DIR_ENV) {
            config.static_dir = PathBuf::from(dir);
        }
        if let Some(max) = lookup(MAX_SESSIONS_ENV) {
            config.max_sessions = max.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{MAX_SESSIONS_ENV} is not a count: {max}"))
            })?;
        }
        if let Some(secs) = lookup(SESSION_IDLE_SECS_ENV) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("{SESSION_IDLE_SECS_ENV} is not seconds: {secs}"))
            })?;
            config.session_idle_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be > 0".to_string()));
        }
        if self.gemini_model.trim().is_empty() {
            return Err(ConfigError::Invalid("gemini model must not be empty".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid("request timeout must be > 0".to_string()));
        }
        if self.max_sessions == 0 {
            return Err(ConfigError::Invalid("max sessions must be > 0".to_string()));
        }

        Url::parse(&self.predict_url)?;
        Url::parse(&self.gemini_base_url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.predict_url, "http://127.0.0.1:8000/predict");
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (PORT_ENV, "8080"),
            (PREDICT_URL_ENV, "http://predict.local/predict"),
            (GEMINI_URL_ENV, "http://gemini.local/"),
            (GEMINI_API_KEY_ENV, "secret"),
            (MAX_SESSIONS_ENV, "8"),
            (SESSION_IDLE_SECS_ENV, "90"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.predict_url, "http://predict.local/predict");
        assert_eq!(config.gemini_base_url, "http://gemini.local");
        assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
        assert_eq!(config.max_sessions, 8);
        assert_eq!(config.session_idle_timeout, Duration::from_secs(90));
    }

    #[test]
    fn test_blank_api_key_is_ignored() {
        let config = AppConfig::from_lookup(lookup_from(&[(GEMINI_API_KEY_ENV, "  ")])).unwrap();
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[(PORT_ENV, "abc")])),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[(PORT_ENV, "0")])),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[(PREDICT_URL_ENV, "not a url")])),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            AppConfig::from_lookup(lookup_from(&[(MAX_SESSIONS_ENV, "0")])),
            Err(ConfigError::Invalid(_))
        ));
    }
}
