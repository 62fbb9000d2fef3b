//! Configuration loading, validation, and management for aichat.
//!
//! Every setting is resolved per key from four layers, highest first:
//!
//! 1. explicit overrides (command-line flags)
//! 2. the process environment
//! 3. a local env file (`.env` by default, `KEY=VALUE` lines)
//! 4. built-in defaults
//!
//! The resolved [`AppConfig`] is a plain value handed to each component at
//! construction. Nothing reads the environment after loading.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment keys for the API key, first match wins.
pub const API_KEY_VARS: &[&str] = &["AICHAT_API_KEY", "AIHUBMIX_API_KEY", "OPENAI_API_KEY"];
/// Environment keys for the API base URL, first match wins.
pub const API_BASE_VARS: &[&str] = &["AICHAT_API_BASE", "OPENAI_BASE_URL"];
pub const MODEL_VAR: &str = "AICHAT_MODEL";
pub const TEMPERATURE_VAR: &str = "AICHAT_TEMPERATURE";
pub const MAX_TOKENS_VAR: &str = "AICHAT_MAX_TOKENS";
pub const MAX_HISTORY_VAR: &str = "AICHAT_MAX_HISTORY";
pub const MAX_CONTEXT_TOKENS_VAR: &str = "AICHAT_MAX_CONTEXT_TOKENS";
pub const SYSTEM_PROMPT_VAR: &str = "AICHAT_SYSTEM_PROMPT";
pub const LOG_LEVEL_VAR: &str = "AICHAT_LOG_LEVEL";

/// The resolved application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Retained non-system messages
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Optional cap on the estimated prompt size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_context_tokens: Option<usize>,

    /// System prompt pinned at the start of every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Log filter used when neither `RUST_LOG` nor `--verbose` is set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Where each field's value came from
    #[serde(skip)]
    sources: BTreeMap<&'static str, ConfigSource>,
}

fn default_api_base() -> String {
    "https://aihubmix.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2000
}
fn default_max_history() -> usize {
    10
}
fn default_system_prompt() -> String {
    "You are a helpful AI assistant.".into()
}
fn default_log_level() -> String {
    "info".into()
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_history", &self.max_history)
            .field("max_context_tokens", &self.max_context_tokens)
            .field("system_prompt", &self.system_prompt)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_api_base(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_history: default_max_history(),
            max_context_tokens: None,
            system_prompt: default_system_prompt(),
            log_level: default_log_level(),
            sources: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load with the default env file (`./.env`) and no overrides.
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Which layer supplied `field` (e.g. `"model"`).
    pub fn source(&self, field: &str) -> ConfigSource {
        self.sources
            .get(field)
            .copied()
            .unwrap_or(ConfigSource::Default)
    }

    /// The API key, or an error telling the user how to set one.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key.as_deref().ok_or(ConfigError::MissingApiKey)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be greater than 0".into(),
            ));
        }
        if self.max_history == 0 {
            return Err(ConfigError::ValidationError(
                "max_history must be greater than 0".into(),
            ));
        }
        if self.max_context_tokens == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_context_tokens must be greater than 0".into(),
            ));
        }
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::ValidationError("api_base must not be empty".into()));
        }
        Ok(())
    }

    /// Render as TOML with the API key masked (for `aichat config`).
    pub fn to_redacted_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.api_key.is_some() {
            shown.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

/// The layer a configuration value was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    Override,
    Environment,
    EnvFile,
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigSource::Override => "override",
            ConfigSource::Environment => "environment",
            ConfigSource::EnvFile => "env file",
            ConfigSource::Default => "default",
        })
    }
}

/// Explicit values that beat every other layer (usually CLI flags).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub max_history: Option<usize>,
    pub max_context_tokens: Option<usize>,
    pub system_prompt: Option<String>,
    pub log_level: Option<String>,
}

/// Builds an [`AppConfig`] from overrides, environment, env file and defaults.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_file: PathBuf,
    overrides: ConfigOverrides,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            env_file: PathBuf::from(".env"),
            overrides: ConfigOverrides::default(),
        }
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn env_file(&self) -> &Path {
        &self.env_file
    }

    /// Resolve against the real process environment and env file.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let process: HashMap<String, String> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        let file = read_env_file(&self.env_file)?;
        self.resolve(&process, &file)
    }

    /// Resolve against explicit maps for the environment and env file layers.
    pub fn resolve(
        &self,
        process: &HashMap<String, String>,
        file: &HashMap<String, String>,
    ) -> Result<AppConfig, ConfigError> {
        let layers = Layers { process, file };
        let o = &self.overrides;
        let mut config = AppConfig::default();
        let mut sources = BTreeMap::new();

        if let Some((value, source)) = pick(o.api_key.clone(), layers.lookup(API_KEY_VARS)) {
            config.api_key = Some(value);
            sources.insert("api_key", source);
        }
        if let Some((value, source)) = pick(o.api_base.clone(), layers.lookup(API_BASE_VARS)) {
            config.api_base = value.trim_end_matches('/').to_string();
            sources.insert("api_base", source);
        }
        if let Some((value, source)) = pick(o.model.clone(), layers.lookup(&[MODEL_VAR])) {
            config.model = value;
            sources.insert("model", source);
        }
        if let Some((value, source)) = layers.parsed(o.temperature, TEMPERATURE_VAR)? {
            config.temperature = value;
            sources.insert("temperature", source);
        }
        if let Some((value, source)) = layers.parsed(o.max_tokens, MAX_TOKENS_VAR)? {
            config.max_tokens = value;
            sources.insert("max_tokens", source);
        }
        if let Some((value, source)) = layers.parsed(o.max_history, MAX_HISTORY_VAR)? {
            config.max_history = value;
            sources.insert("max_history", source);
        }
        if let Some((value, source)) =
            layers.parsed(o.max_context_tokens, MAX_CONTEXT_TOKENS_VAR)?
        {
            config.max_context_tokens = Some(value);
            sources.insert("max_context_tokens", source);
        }
        if let Some((value, source)) =
            pick(o.system_prompt.clone(), layers.lookup(&[SYSTEM_PROMPT_VAR]))
        {
            config.system_prompt = value;
            sources.insert("system_prompt", source);
        }
        if let Some((value, source)) = pick(o.log_level.clone(), layers.lookup(&[LOG_LEVEL_VAR])) {
            config.log_level = value;
            sources.insert("log_level", source);
        }

        config.sources = sources;
        config.validate()?;

        tracing::debug!(
            model = %config.model,
            api_base = %config.api_base,
            max_history = config.max_history,
            has_api_key = config.has_api_key(),
            "Resolved configuration"
        );
        Ok(config)
    }
}

/// Prefer the override; otherwise fall back to the layered lookup.
fn pick(
    over: Option<String>,
    layered: Option<(String, ConfigSource)>,
) -> Option<(String, ConfigSource)> {
    over.map(|v| (v, ConfigSource::Override)).or(layered)
}

struct Layers<'a> {
    process: &'a HashMap<String, String>,
    file: &'a HashMap<String, String>,
}

impl Layers<'_> {
    /// First non-empty value for any of `keys`, process environment first.
    fn lookup(&self, keys: &[&str]) -> Option<(String, ConfigSource)> {
        let find = |map: &HashMap<String, String>| {
            keys.iter()
                .filter_map(|k| map.get(*k))
                .map(|v| v.trim())
                .find(|v| !v.is_empty())
                .map(str::to_string)
        };
        find(self.process)
            .map(|v| (v, ConfigSource::Environment))
            .or_else(|| find(self.file).map(|v| (v, ConfigSource::EnvFile)))
    }

    fn parsed<T: FromStr>(
        &self,
        over: Option<T>,
        key: &'static str,
    ) -> Result<Option<(T, ConfigSource)>, ConfigError> {
        if let Some(v) = over {
            return Ok(Some((v, ConfigSource::Override)));
        }
        match self.lookup(&[key]) {
            None => Ok(None),
            Some((raw, source)) => match raw.parse() {
                Ok(v) => Ok(Some((v, source))),
                Err(_) => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                    layer: source,
                }),
            },
        }
    }
}

/// Read `KEY=VALUE` pairs from an env file. A missing file yields no pairs.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        tracing::debug!("No env file found at {}, skipping", path.display());
        return Ok(HashMap::new());
    }

    let iter = dotenvy::from_path_iter(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        vars.insert(key, value);
    }
    tracing::debug!(count = vars.len(), "Loaded env file {}", path.display());
    Ok(vars)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read env file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse env file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid value '{value}' for {key} (from {layer})")]
    InvalidValue {
        key: String,
        value: String,
        layer: ConfigSource,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("No API key configured: set AICHAT_API_KEY in the environment or in .env")]
    MissingApiKey,
}
