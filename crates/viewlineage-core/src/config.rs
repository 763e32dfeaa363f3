//! Configuration schema (viewlineage.toml)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Depth bound used for a lineage request when the caller does not supply one
pub const DEFAULT_REQUEST_MAX_DEPTH: usize = 8;

/// Traversal limits for lineage requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageSettings {
    /// Maximum recursion depth below the root object
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum number of objects classified per request
    #[serde(default = "default_max_nodes")]
    pub max_nodes: usize,

    /// Wall-clock limit per request in seconds (none by default)
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

fn default_max_depth() -> usize {
    DEFAULT_REQUEST_MAX_DEPTH
}

fn default_max_nodes() -> usize {
    500
}

impl Default for LineageSettings {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_nodes: default_max_nodes(),
            deadline_secs: None,
        }
    }
}

/// Text oracle (chat completions endpoint) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSettings {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature; kept low so answers are near-deterministic
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Cap on generated tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// HTTP timeout per completion, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Warehouse connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Warehouse type (snowflake)
    #[serde(rename = "type")]
    pub warehouse_type: String,

    /// Connection settings (warehouse-specific)
    #[serde(flatten)]
    pub settings: HashMap<String, String>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            warehouse_type: "snowflake".to_string(),
            settings: HashMap::new(),
        }
    }
}

impl WarehouseConfig {
    /// Look up a setting, falling back to an environment variable
    pub fn setting_or_env(&self, key: &str, env_var: &str) -> Option<String> {
        self.settings
            .get(key)
            .cloned()
            .or_else(|| std::env::var(env_var).ok())
            .filter(|value| !value.trim().is_empty())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub lineage: LineageSettings,

    #[serde(default)]
    pub oracle: OracleSettings,

    /// Warehouse connection configuration
    #[serde(default)]
    pub warehouse: Option<WarehouseConfig>,
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.lineage.max_nodes == 0 {
            return Err(ConfigError::Invalid("lineage.max_nodes must be at least 1".to_string()));
        }
        if !(0.0..=2.0).contains(&self.oracle.temperature) {
            return Err(ConfigError::Invalid(format!(
                "oracle.temperature must be between 0 and 2, got {}",
                self.oracle.temperature
            )));
        }
        if self.oracle.max_tokens == 0 {
            return Err(ConfigError::Invalid("oracle.max_tokens must be at least 1".to_string()));
        }
        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::Invalid("oracle.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
