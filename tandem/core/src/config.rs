//! TOML Configuration File Support
//!
//! Centralized configuration loading for the tandem client, supporting a TOML
//! configuration file at `~/.config/tandem/tandem.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (when applicable)
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows the XDG Base Directory specification:
//! - `$XDG_CONFIG_HOME/tandem/tandem.toml` (typically `~/.config/tandem/tandem.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! base_url = "http://127.0.0.1:8080"
//! connect_timeout_ms = 5000
//! request_timeout_ms = 30000
//! user_id = "me@laptop"
//!
//! [modes]
//! streaming = true
//! use_knowledge_base = true
//!
//! [stream]
//! stall_timeout_secs = 0
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::DEFAULT_BASE_URL;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// Base origin of the QA backend
    pub base_url: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,

    /// Request timeout for non-streaming calls in milliseconds
    pub request_timeout_ms: Option<u64>,

    /// Stable user id sent with every question
    pub user_id: Option<String>,
}

/// Answer-mode section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModesToml {
    /// Whether answers stream by default
    pub streaming: Option<bool>,

    /// Whether the backend should consult its knowledge base
    pub use_knowledge_base: Option<bool>,
}

/// Stream section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToml {
    /// Give up on a silent stream after this many seconds (0 = wait forever)
    pub stall_timeout_secs: Option<u64>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemToml {
    /// Backend configuration section
    pub backend: BackendToml,

    /// Answer-mode configuration section
    pub modes: ModesToml,

    /// Stream configuration section
    pub stream: StreamToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for the tandem client
///
/// Consolidates all configuration from multiple sources and tracks where the
/// values came from. Use [`load_config`] to load with proper priority handling.
#[derive(Clone, Debug)]
pub struct TandemConfig {
    /// Base origin of the QA backend
    pub base_url: String,

    /// Connection timeout for the HTTP client
    pub connect_timeout: Duration,

    /// Request timeout for non-streaming calls
    pub request_timeout: Duration,

    /// Stable user id; `None` means generate one per orchestrator
    pub user_id: Option<String>,

    /// Whether answers stream by default
    pub streaming: bool,

    /// Whether the backend should consult its knowledge base
    pub use_knowledge_base: bool,

    /// Give up on a silent stream after this many seconds; 0 disables the guard
    pub stall_timeout_secs: u64,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            user_id: None,
            streaming: true,
            use_knowledge_base: true,
            stall_timeout_secs: 0,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl TandemConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// The stall guard as a duration; `None` when disabled (0 seconds).
    #[must_use]
    pub fn stall_timeout(&self) -> Option<Duration> {
        if self.stall_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.stall_timeout_secs))
        }
    }

    /// Check invariants that hold across all sources.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] when the base URL has no
    /// http(s) scheme or a timeout is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "connect and request timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/tandem/tandem.toml` or
/// `~/.config/tandem/tandem.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tandem").join("tandem.toml"))
}

/// Load configuration from all sources with proper priority
///
/// Priority order (highest first):
/// 1. CLI arguments (not handled here - caller applies [`ConfigOverrides`])
/// 2. Environment variables
/// 3. TOML configuration file
/// 4. Default values
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if the
/// resulting configuration fails validation. A missing config file is not an
/// error (defaults are used).
pub fn load_config() -> Result<TandemConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only
///   defaults and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed, or
/// if the resulting configuration fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<TandemConfig, ConfigError> {
    // Start with defaults
    let mut config = TandemConfig::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: TandemToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    apply_env_config(&mut config);

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut TandemConfig, toml: &TandemToml) {
    // Backend settings
    if let Some(ref url) = toml.backend.base_url {
        config.base_url = url.clone();
    }
    if let Some(ms) = toml.backend.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.backend.request_timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }
    if toml.backend.user_id.is_some() {
        config.user_id = toml.backend.user_id.clone();
    }

    // Mode settings
    if let Some(streaming) = toml.modes.streaming {
        config.streaming = streaming;
    }
    if let Some(use_kb) = toml.modes.use_knowledge_base {
        config.use_knowledge_base = use_kb;
    }

    // Stream settings
    if let Some(secs) = toml.stream.stall_timeout_secs {
        config.stall_timeout_secs = secs;
    }
}

/// Apply environment variable overrides to the config
fn apply_env_config(config: &mut TandemConfig) {
    if let Ok(url) = std::env::var("TANDEM_BASE_URL") {
        config.base_url = url;
        config.source = ConfigSource::Env;
    }
    if let Ok(user) = std::env::var("TANDEM_USER_ID") {
        config.user_id = Some(user);
        config.source = ConfigSource::Env;
    }
    if let Ok(timeout) = std::env::var("TANDEM_CONNECT_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.connect_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(timeout) = std::env::var("TANDEM_REQUEST_TIMEOUT_MS") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.request_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Ok(streaming) = std::env::var("TANDEM_STREAMING") {
        config.streaming = streaming != "0" && streaming.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Ok(use_kb) = std::env::var("TANDEM_USE_KNOWLEDGE_BASE") {
        config.use_knowledge_base = use_kb != "0" && use_kb.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Ok(secs) = std::env::var("TANDEM_STALL_TIMEOUT_SECS") {
        if let Ok(n) = secs.parse::<u64>() {
            config.stall_timeout_secs = n;
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Base URL override
    pub base_url: Option<String>,

    /// User id override
    pub user_id: Option<String>,

    /// Streaming mode override
    pub streaming: Option<bool>,

    /// Knowledge-base toggle override
    pub use_knowledge_base: Option<bool>,

    /// Stall timeout override (seconds, 0 disables)
    pub stall_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Set user id override
    #[must_use]
    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set streaming mode override
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = Some(streaming);
        self
    }

    /// Set knowledge-base toggle override
    #[must_use]
    pub fn with_use_knowledge_base(mut self, use_kb: bool) -> Self {
        self.use_knowledge_base = Some(use_kb);
        self
    }

    /// Set stall timeout override
    #[must_use]
    pub fn with_stall_timeout_secs(mut self, secs: u64) -> Self {
        self.stall_timeout_secs = Some(secs);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut TandemConfig) {
        if self.base_url.is_some()
            || self.user_id.is_some()
            || self.streaming.is_some()
            || self.use_knowledge_base.is_some()
            || self.stall_timeout_secs.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(ref url) = self.base_url {
            config.base_url = url.clone();
        }
        if let Some(ref user) = self.user_id {
            config.user_id = Some(user.clone());
        }
        if let Some(streaming) = self.streaming {
            config.streaming = streaming;
        }
        if let Some(use_kb) = self.use_knowledge_base {
            config.use_knowledge_base = use_kb;
        }
        if let Some(secs) = self.stall_timeout_secs {
            config.stall_timeout_secs = secs;
        }
    }
}

// =============================================================================
// Test Support
// =============================================================================

/// Serializes tests that read or mutate `TANDEM_*` environment variables.
/// The process environment is shared mutable state and the harness runs tests
/// in parallel; every env-touching test holds this lock for its whole body.
#[cfg(test)]
pub(crate) static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

// =============================================================================
// Tests
// =============================================================================
