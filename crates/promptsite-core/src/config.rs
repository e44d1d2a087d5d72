//! Generator configuration management.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Environment variable prefix for layered configuration.
pub const ENV_PREFIX: &str = "PROMPTSITE";

/// Main configuration structure for promptsite.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Text-generation backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Placeholder image settings.
    #[serde(default)]
    pub images: ImagesConfig,

    /// Pipeline settings.
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Backend retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Output location.
    #[serde(default)]
    pub output: OutputConfig,

    /// Delivery server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Text-generation backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Model name, e.g. `gemini-1.5-flash`.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key. Takes precedence over `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Environment variable read when `api_key` is unset.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Upper bound for a single backend call.
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

/// Placeholder image configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Whether external image references are localized at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Query URL template. Supports `{query}`, `{index}`, `{width}` and `{height}`.
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Requested image width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Requested image height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Upper bound for a single image download.
    #[serde(default = "default_image_timeout")]
    pub timeout_secs: u64,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Issue the three backend calls concurrently.
    #[serde(default = "default_true")]
    pub concurrent: bool,
}

/// Backend retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per backend call, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory that receives one subdirectory per generated bundle.
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

/// Delivery server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
}

// Default value functions
fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

fn default_backend_timeout() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_source_url() -> String {
    "https://picsum.photos/seed/{query}-{index}/{width}/{height}".to_string()
}

fn default_width() -> u32 {
    600
}

fn default_height() -> u32 {
    400
}

fn default_image_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_output_dir() -> String {
    "generated".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5500
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source_url: default_source_url(),
            width: default_width(),
            height: default_height(),
            timeout_secs: default_image_timeout(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { concurrent: true }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl BackendConfig {
    /// Resolve the API key from the config value or the named environment variable.
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Backend call timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ImagesConfig {
    /// Image download timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetryConfig {
    /// Delay before retry number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            CoreError::config_with_source(
                format!("Failed to parse config file: {}", path.display()),
                e,
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration layered from an optional file and `PROMPTSITE__*` variables.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file absent, using defaults");
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.backend.model.trim().is_empty() {
            return Err(CoreError::config("backend.model cannot be empty"));
        }

        if self.backend.endpoint.trim().is_empty() {
            return Err(CoreError::config("backend.endpoint cannot be empty"));
        }

        if self.backend.timeout_secs == 0 || self.images.timeout_secs == 0 {
            return Err(CoreError::config("timeouts must be greater than zero"));
        }

        if !self.images.source_url.contains("{index}") {
            return Err(CoreError::config(
                "images.source_url must contain an {index} placeholder",
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(CoreError::config("retry.max_attempts must be at least 1"));
        }

        if self.output.dir.trim().is_empty() {
            return Err(CoreError::config("output.dir cannot be empty"));
        }

        if self.backend.endpoint.ends_with('/') {
            tracing::warn!("backend.endpoint should not have a trailing slash");
        }

        Ok(())
    }

    /// Output directory as a path.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output.dir)
    }
}
