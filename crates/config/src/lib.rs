//! Configuration loading and validation for yugent.
//!
//! Loads configuration from `~/.yugent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use yugent_core::tool::ToolCallPolicy;

/// Provider names accepted in `provider`. `custom` requires `base_url`.
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "groq", "mistral", "gemini", "custom"];

/// Tool names accepted in `tools.enabled`.
pub const KNOWN_TOOLS: &[&str] = &["read_file", "write_file", "get_weather"];

/// The root configuration structure.
///
/// Maps directly to `~/.yugent/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Endpoint preset: openai, groq, mistral, gemini or custom
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Literal API key. Prefer `api_key_env`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key; defaults per preset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Override the preset's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Override the preset's completions path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions_path: Option<String>,

    /// Request streamed responses
    #[serde(default)]
    pub stream: bool,

    /// TCP connect timeout; there is no overall request timeout
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_connect_timeout_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_key_env", &self.api_key_env)
            .field("base_url", &self.base_url)
            .field("completions_path", &self.completions_path)
            .field("stream", &self.stream)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("logging", &self.logging)
            .finish()
    }
}

/// Completion loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Optional system message placed before the first user message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Tool rounds allowed per execution; 0 means unbounded
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,

    /// `first` or `all`
    #[serde(default)]
    pub tool_call_policy: ToolCallPolicy,

    /// Disable auto tool calling on the legs that follow a tool round
    #[serde(default)]
    pub suspend_nested_tool_calls: bool,
}

fn default_max_tool_rounds() -> usize {
    25
}

impl AgentConfig {
    pub fn tool_round_limit(&self) -> Option<usize> {
        (self.max_tool_rounds > 0).then_some(self.max_tool_rounds)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_tool_rounds: default_max_tool_rounds(),
            tool_call_policy: ToolCallPolicy::default(),
            suspend_nested_tool_calls: false,
        }
    }
}

/// Built-in tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,

    /// Environment variable holding the OpenWeatherMap key
    #[serde(default = "default_weather_api_key_env")]
    pub weather_api_key_env: String,

    #[serde(default = "default_weather_base_url")]
    pub weather_base_url: String,
}

fn default_enabled_tools() -> Vec<String> {
    KNOWN_TOOLS.iter().map(|t| t.to_string()).collect()
}
fn default_weather_api_key_env() -> String {
    "WEATHER_API_KEY".into()
}
fn default_weather_base_url() -> String {
    "https://api.openweathermap.org".into()
}

impl ToolsConfig {
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled.iter().any(|t| t == name)
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
            weather_api_key_env: default_weather_api_key_env(),
            weather_base_url: default_weather_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Attach the local log layer
    #[serde(default = "default_true")]
    pub local: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { local: true }
    }
}

impl AppConfig {
    /// Load configuration from the default path (`~/.yugent/config.toml`),
    /// then apply environment overrides:
    /// - `YUGENT_PROVIDER`
    /// - `YUGENT_MODEL`
    /// - `YUGENT_STREAM` (`1`/`true` or `0`/`false`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("YUGENT_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = lookup("YUGENT_MODEL") {
            self.model = model;
        }
        if let Some(stream) = lookup("YUGENT_STREAM") {
            match stream.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => self.stream = true,
                "0" | "false" | "no" => self.stream = false,
                other => tracing::warn!(value = %other, "Ignoring unrecognized YUGENT_STREAM"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".yugent")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !KNOWN_PROVIDERS.contains(&self.provider.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown provider '{}' (expected one of: {})",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.provider == "custom" && self.base_url.is_none() {
            return Err(ConfigError::ValidationError(
                "provider 'custom' requires base_url".into(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be > 0".into(),
            ));
        }

        if let Some(unknown) = self
            .tools
            .enabled
            .iter()
            .find(|t| !KNOWN_TOOLS.contains(&t.as_str()))
        {
            return Err(ConfigError::ValidationError(format!(
                "unknown tool '{unknown}' in tools.enabled"
            )));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            completions_path: None,
            stream: false,
            connect_timeout_secs: default_connect_timeout_secs(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
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
