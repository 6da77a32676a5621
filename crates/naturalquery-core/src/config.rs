//! Configuration schema (naturalquery.toml)

use crate::language::{Language, UnsupportedLanguage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How answers reach a non-English user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageStrategy {
    /// The interpretation prompt asks the model to answer in the target
    /// language directly. One call, but relies on instruction following.
    #[default]
    InlineInstruction,

    /// Interpret in English, then run a separate translation call.
    /// One extra round-trip per answer.
    ExplicitBackTranslation,
}

/// DDL rendering strategy used for prompting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DdlStyle {
    /// Mapped types, inline constraints, foreign keys as trailing comments
    #[default]
    Commented,

    /// Raw types with `primary key (...)` / `foreign key (...)` lines,
    /// suited to SQL-specialized models
    InlineKeys,
}

/// Language model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI chat completions
    #[default]
    OpenAi,

    /// Anyscale endpoints (OpenAI protocol)
    Anyscale,

    /// Any OpenAI-compatible chat completions URL
    Custom,

    /// Cohere chat
    Cohere,
}

impl LlmProvider {
    /// Environment variable holding the API key when none is configured
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            Self::Cohere => "CO_API_KEY",
            _ => "OPENAI_API_KEY",
        }
    }
}

/// Language model connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Backend to talk to
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model identifier, required by every provider except `custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Inline API key. Prefer `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable to read the API key from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Endpoint override; mandatory for `custom`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Transport timeout for one request
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra request parameters merged into every request body
    #[serde(default)]
    pub model_kwargs: serde_json::Map<String, serde_json::Value>,
}

fn default_llm_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: None,
            api_key: None,
            api_key_env: None,
            url: None,
            timeout_secs: default_llm_timeout_secs(),
            model_kwargs: serde_json::Map::new(),
        }
    }
}

impl LlmConfig {
    /// Name of the environment variable consulted for the API key
    pub fn api_key_env_name(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    /// Inline key first, then the environment (a `.env` file is loaded if present)
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }

        let _ = dotenvy::dotenv();
        std::env::var(self.api_key_env_name())
            .ok()
            .filter(|value| !value.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Engine (postgres, sqlite, sqlserver)
    pub provider: String,

    /// Connection settings (engine-specific); numbers and booleans are kept
    /// in their TOML text form
    #[serde(flatten, deserialize_with = "settings_as_text")]
    pub settings: HashMap<String, String>,
}

fn settings_as_text<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = HashMap::<String, toml::Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, text)
        })
        .collect())
}

impl DatabaseConfig {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            settings: HashMap::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// Where enriched DDL is kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// One file per fingerprint under `dir`
    #[default]
    File,

    /// Process memory only
    Memory,
}

/// Enriched-DDL cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,

    /// Cache directory, relative to the config file
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// How long an entry stays fresh
    #[serde(default = "default_validity_hours")]
    pub validity_hours: u64,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache_data")
}

fn default_validity_hours() -> u64 {
    24
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            dir: default_cache_dir(),
            validity_hours: default_validity_hours(),
        }
    }
}

impl CacheConfig {
    pub fn validity(&self) -> Duration {
        Duration::from_secs(self.validity_hours.saturating_mul(60 * 60))
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Language questions are asked and answered in
    #[serde(default)]
    pub language: Language,

    /// How non-English answers are produced
    #[serde(default)]
    pub language_strategy: LanguageStrategy,

    /// DDL rendering used in prompts
    #[serde(default)]
    pub ddl_style: DdlStyle,

    /// Upper bound on any single LLM or database call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_timeout_secs: Option<u64>,

    /// Language model settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Database settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    /// Cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub project_root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: Language::default(),
            language_strategy: LanguageStrategy::default(),
            ddl_style: DdlStyle::default(),
            call_timeout_secs: None,
            llm: LlmConfig::default(),
            database: None,
            cache: CacheConfig::default(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load and validate config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load and validate config from a TOML string
    ///
    /// An unsupported `language` is reported as
    /// [`ConfigError::UnsupportedLanguage`] rather than a parse error.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let raw: toml::Table = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(value) = raw.get("language") {
            let code = value.as_str().ok_or_else(|| {
                ConfigError::ParseError("`language` must be a string".to_string())
            })?;
            code.parse::<Language>()?;
        }

        let config: Config = toml::Value::Table(raw)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Check cross-field requirements
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.llm.provider {
            LlmProvider::Custom if self.llm.url.is_none() => {
                return Err(ConfigError::Invalid(
                    "llm.url is required for the custom provider".to_string(),
                ));
            }
            LlmProvider::OpenAi | LlmProvider::Anyscale | LlmProvider::Cohere
                if self.llm.model.is_none() =>
            {
                return Err(ConfigError::Invalid(format!(
                    "llm.model is required for the {:?} provider",
                    self.llm.provider
                )));
            }
            _ => {}
        }

        if self.cache.validity_hours == 0 {
            return Err(ConfigError::Invalid(
                "cache.validity_hours must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Cache directory resolved against the project root
    pub fn cache_dir(&self) -> PathBuf {
        if self.cache.dir.is_absolute() {
            self.cache.dir.clone()
        } else {
            self.project_root.join(&self.cache.dir)
        }
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
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

    #[error(transparent)]
    UnsupportedLanguage(#[from] UnsupportedLanguage),
}
