//! Configuration parsing and structures

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::backend::DEFAULT_SEPARATOR;
use crate::client::ClientOption;
use crate::env::substitute_env_vars;

// =============================================================================
// Raw Config (Deserialized from YAML)
// =============================================================================

/// Raw configuration as deserialized from YAML.
/// This is converted to `Config` via `resolve()`.
#[derive(Clone, Deserialize)]
pub struct RawConfig {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage client section
    #[serde(default)]
    pub gcs: RawGcsConfig,
}

/// Storage client section before defaults are applied
#[derive(Clone, Deserialize, Default)]
pub struct RawGcsConfig {
    /// Folder separator used to encode paths as object keys
    pub separator: Option<String>,

    /// Service account key JSON (usually `${VAR}` substituted)
    pub credentials_json: Option<String>,

    /// Path to a service account key file
    pub credentials_path: Option<PathBuf>,

    /// Path to an application default credentials file
    pub application_credentials: Option<PathBuf>,

    /// HTTP(S) proxy URL
    pub proxy_url: Option<String>,

    /// Per-request timeout (e.g., "30s", "2m")
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Connection timeout (e.g., "5s")
    #[serde(default)]
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Option<Duration>,

    /// Refuse every mutating operation
    #[serde(default)]
    pub read_only: bool,
}

// =============================================================================
// Resolved Config (Ready for use)
// =============================================================================

/// Top-level configuration (resolved from RawConfig)
#[derive(Debug, Clone)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Storage client configuration
    pub gcs: GcsConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Storage client configuration (resolved)
#[derive(Clone, PartialEq)]
pub struct GcsConfig {
    pub separator: String,
    pub credentials_json: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub application_credentials: Option<PathBuf>,
    pub proxy_url: Option<String>,
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub read_only: bool,
}

impl Default for GcsConfig {
    fn default() -> Self {
        RawGcsConfig::default().resolve()
    }
}

// Keeps key material out of logs
impl fmt::Debug for GcsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GcsConfig")
            .field("separator", &self.separator)
            .field(
                "credentials_json",
                &self.credentials_json.as_ref().map(|_| "<redacted>"),
            )
            .field("credentials_path", &self.credentials_path)
            .field("application_credentials", &self.application_credentials)
            .field("proxy_url", &self.proxy_url)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_only", &self.read_only)
            .finish()
    }
}

// =============================================================================
// Resolution Logic
// =============================================================================

impl RawConfig {
    /// Resolve raw config into final config by applying defaults
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let RawConfig { logging, gcs } = self;
        Ok(Config {
            logging,
            gcs: gcs.resolve(),
        })
    }
}

impl RawGcsConfig {
    fn resolve(self) -> GcsConfig {
        // A substituted variable that is set but empty means "not configured"
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        GcsConfig {
            separator: self
                .separator
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            credentials_json: non_empty(self.credentials_json),
            credentials_path: self.credentials_path,
            application_credentials: self.application_credentials,
            proxy_url: non_empty(self.proxy_url),
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            read_only: self.read_only,
        }
    }
}

impl GcsConfig {
    /// Build the ordered client options for this configuration
    pub fn client_options(&self) -> Vec<ClientOption> {
        let mut options = Vec::new();

        if let Some(json) = &self.credentials_json {
            options.push(ClientOption::CredentialsJson(json.as_bytes().to_vec()));
        }
        if let Some(path) = &self.credentials_path {
            options.push(ClientOption::CredentialsFile(path.clone()));
        }
        if let Some(path) = &self.application_credentials {
            options.push(ClientOption::ApplicationCredentials(path.clone()));
        }
        if let Some(url) = &self.proxy_url {
            options.push(ClientOption::ProxyUrl(url.clone()));
        }
        if let Some(timeout) = self.timeout {
            options.push(ClientOption::Timeout(timeout));
        }
        if let Some(timeout) = self.connect_timeout {
            options.push(ClientOption::ConnectTimeout(timeout));
        }

        options
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.clone(), e.to_string()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// `${VAR}` references are substituted before parsing.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(&substitute_env_vars(content)?)
    }

    fn parse(content: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        raw.resolve()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let gcs = &self.gcs;

        if gcs.separator.is_empty() {
            return Err(ConfigError::ValidationError(
                "gcs.separator cannot be empty".to_string(),
            ));
        }

        if gcs.credentials_json.is_some() && gcs.credentials_path.is_some() {
            return Err(ConfigError::ValidationError(
                "gcs.credentials_json and gcs.credentials_path are mutually exclusive".to_string(),
            ));
        }

        if let Some(json) = &gcs.credentials_json {
            serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(json).map_err(
                |e| {
                    ConfigError::ValidationError(format!(
                        "gcs.credentials_json is not a JSON object: {}",
                        e
                    ))
                },
            )?;
        }

        for (name, value) in [
            ("timeout", gcs.timeout),
            ("connect_timeout", gcs.connect_timeout),
        ] {
            if value.is_some_and(|d| d.is_zero()) {
                return Err(ConfigError::ValidationError(format!(
                    "gcs.{} must be greater than zero",
                    name
                )));
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}
