//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dashboard backend connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_backend_url")]
    pub url: String,

    /// Timeout for non-streaming calls. Streams are not bounded.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Owner of saved chart bookmarks
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_backend_url() -> String {
    "http://localhost:8005".to_string()
}

fn default_request_timeout() -> u64 {
    120 // LLM-backed endpoints are slow
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_id() -> String {
    "default-user".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_id: default_user_id(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Chat session settings
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Oldest messages are dropped once the transcript grows past this
    #[serde(default = "default_max_transcript")]
    pub max_transcript: usize,

    /// Largest single stream event accepted; bigger ones are skipped
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_max_transcript() -> usize {
    200
}

fn default_max_frame_bytes() -> usize {
    crate::chat::DEFAULT_MAX_FRAME
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_transcript: default_max_transcript(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Standard config file locations, most specific first
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("kpilens").join("config.toml"));
        }
        paths.push(PathBuf::from("/etc/kpilens/config.toml"));
        paths.push(PathBuf::from("./kpilens.toml"));
        paths
    }

    /// Search the standard locations without logging.
    ///
    /// Lets the caller set up tracing from the result and report afterwards.
    pub fn discover() -> LoadOutcome {
        Self::discover_in(&Self::default_paths())
    }

    /// First existing file in `paths` that parses wins; unreadable or broken
    /// files are recorded as warnings and skipped.
    pub fn discover_in(paths: &[PathBuf]) -> LoadOutcome {
        let mut warnings = Vec::new();
        for path in paths.iter().filter(|p| p.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return LoadOutcome {
                        config,
                        source: Some(path.clone()),
                        warnings,
                    }
                }
                Err(e) => warnings.push(e.to_string()),
            }
        }
        LoadOutcome {
            config: Self::from_env(),
            source: None,
            warnings,
        }
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let outcome = Self::discover();
        outcome.log();
        outcome.config
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Backend overrides
        if let Some(url) = lookup("KPILENS_API_URL") {
            self.backend.url = url;
        }
        if let Some(user_id) = lookup("KPILENS_USER_ID") {
            self.backend.user_id = user_id;
        }
        if let Some(timeout) = lookup("KPILENS_REQUEST_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.backend.request_timeout_secs = secs;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("KPILENS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("KPILENS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Result of searching config locations
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub config: Config,
    /// File the config came from, `None` for defaults plus environment
    pub source: Option<PathBuf>,
    /// Files that existed but could not be loaded
    pub warnings: Vec<String>,
}

impl LoadOutcome {
    /// Report where the config came from. Call once tracing is up.
    pub fn log(&self) {
        for warning in &self.warnings {
            tracing::warn!("Skipped config file: {}", warning);
        }
        match &self.source {
            Some(path) => tracing::info!("Loaded config from {:?}", path),
            None => tracing::debug!("Using default config with environment overrides"),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# KPILens Configuration
#
# Environment variables override these settings:
# - KPILENS_API_URL
# - KPILENS_USER_ID
# - KPILENS_REQUEST_TIMEOUT
# - KPILENS_LOG_LEVEL
# - KPILENS_LOG_FORMAT

[backend]
# Dashboard backend base URL
url = "http://localhost:8005"

# Timeout for non-streaming requests (seconds)
request_timeout_secs = 120

# Connection timeout (seconds)
connect_timeout_secs = 10

# Owner id for saved chart bookmarks
user_id = "default-user"

[chat]
# Maximum number of messages kept in a chat transcript
max_transcript = 200

# Largest single stream event in bytes; bigger events are skipped
max_frame_bytes = 8388608

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
