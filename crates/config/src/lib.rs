//! Configuration loading and validation for GroundSQL.
//!
//! Loads from a TOML file with `GROUNDSQL_*` environment variable
//! overrides. Validates all settings at startup: a zero TTL or budget is a
//! configuration error, not a runtime surprise.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Context assembly settings.
    #[serde(default)]
    pub context: ContextConfig,

    /// Retrieval depth per layer.
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Live schema introspection settings.
    #[serde(default)]
    pub introspection: IntrospectionConfig,

    /// Static knowledge settings.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Learning memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Total token budget for an assembled context.
    #[serde(default = "default_budget_tokens")]
    pub budget_tokens: usize,
}

fn default_budget_tokens() -> usize {
    4096
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            budget_tokens: default_budget_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Top-k validated patterns retrieved per question.
    #[serde(default = "default_k")]
    pub pattern_k: usize,

    /// Top-k memory records retrieved per question.
    #[serde(default = "default_k")]
    pub memory_k: usize,
}

fn default_k() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            pattern_k: default_k(),
            memory_k: default_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionConfig {
    /// Master switch for the live introspection layer.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cache entry lifetime in seconds. Must be > 0.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Per-probe timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum concurrent probes during assembly fan-out.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_ttl_secs() -> u64 {
    300
}
fn default_timeout_ms() -> u64 {
    2000
}
fn default_max_concurrent() -> usize {
    4
}
fn default_true() -> bool {
    true
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            timeout_ms: default_timeout_ms(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Toggles the institutional-knowledge layer (gotchas and metrics).
    /// Table metadata is always on; without it no grounding is possible.
    #[serde(default = "default_true")]
    pub institutional_enabled: bool,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            institutional_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Optional JSONL journal path. None keeps the log in memory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self { journal_path: None }
    }
}

impl AppConfig {
    /// Load configuration from a file path, applying env overrides.
    ///
    /// A missing file yields defaults. Recognized overrides:
    /// - `GROUNDSQL_BUDGET_TOKENS`
    /// - `GROUNDSQL_INTROSPECTION_TTL_SECS`
    /// - `GROUNDSQL_INTROSPECTION_ENABLED` ("true"/"false")
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            tracing::info!(path = %path.display(), "no config file found, using defaults");
            Self::default()
        };

        if let Ok(budget) = std::env::var("GROUNDSQL_BUDGET_TOKENS") {
            config.context.budget_tokens = budget
                .parse()
                .map_err(|_| ConfigError::ValidationError("GROUNDSQL_BUDGET_TOKENS must be an integer".into()))?;
        }
        if let Ok(ttl) = std::env::var("GROUNDSQL_INTROSPECTION_TTL_SECS") {
            config.introspection.ttl_secs = ttl
                .parse()
                .map_err(|_| ConfigError::ValidationError("GROUNDSQL_INTROSPECTION_TTL_SECS must be an integer".into()))?;
        }
        if let Ok(enabled) = std::env::var("GROUNDSQL_INTROSPECTION_ENABLED") {
            config.introspection.enabled = enabled == "true" || enabled == "1";
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.context.budget_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "context.budget_tokens must be > 0".into(),
            ));
        }
        if self.introspection.ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "introspection.ttl_secs must be > 0".into(),
            ));
        }
        if self.introspection.max_concurrent == 0 {
            return Err(ConfigError::ValidationError(
                "introspection.max_concurrent must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            context: ContextConfig::default(),
            retrieval: RetrievalConfig::default(),
            introspection: IntrospectionConfig::default(),
            knowledge: KnowledgeConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.budget_tokens, 4096);
        assert_eq!(config.retrieval.pattern_k, 5);
        assert_eq!(config.introspection.ttl_secs, 300);
        assert!(config.knowledge.institutional_enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let back: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.context.budget_tokens, config.context.budget_tokens);
        assert_eq!(back.introspection.timeout_ms, config.introspection.timeout_ms);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/groundsql.toml")).unwrap();
        assert_eq!(config.context.budget_tokens, 4096);
    }

    #[test]
    fn zero_ttl_rejected() {
        let mut config = AppConfig::default();
        config.introspection.ttl_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn zero_budget_rejected() {
        let mut config = AppConfig::default();
        config.context.budget_tokens = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[context]\nbudget_tokens = 1024").unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.context.budget_tokens, 1024);
        assert_eq!(config.retrieval.memory_k, 5); // untouched default
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not toml at all [[[").unwrap();
        assert!(matches!(
            AppConfig::load_from(file.path()),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
