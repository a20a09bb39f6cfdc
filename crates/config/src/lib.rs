//! Configuration loading, validation, and management for staybot.
//!
//! Loads configuration from `~/.staybot/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder replaced by the room inventory JSON in the system prompt.
pub const ROOMS_PLACEHOLDER: &str = "{rooms}";

/// The built-in hotel assistant instructions.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a hotel booking assistant. Speak in a friendly manner. \
Format the responses in a readable way. Dont use bold or italics formatting. \
Don't make assumptions about what values to plug into functions. \
Ask for clarification if a user request is ambiguous. \
Available room data: {rooms}. Display room data in detail. \
Then ask the user to select a room. Then ask the duration of stay in nights. \
Then ask for confirmation. Then once user confirms booking, book the room. \
Dont tell things that are not mentioned to you, like you will receive a confirmation mail.";

/// The root configuration structure.
///
/// Maps directly to `~/.staybot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// LLM backend selection and tuning
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Hotel REST service
    #[serde(default)]
    pub hotel: HotelConfig,

    /// HTTP / WebSocket server
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Audit log storage
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Orchestration engine behaviour
    #[serde(default)]
    pub engine: EngineConfig,

    /// Assistant persona
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// Which LLM backend to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Gemini => "gemini-1.5-flash",
        }
    }

    /// Vendor-specific environment variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(ConfigError::ValidationError(format!(
                "unknown provider '{other}' (expected 'openai' or 'gemini')"
            ))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub kind: ProviderKind,

    /// Model name; the vendor default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the vendor base URL (e.g. for a compatible proxy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Token streaming for OpenAI; Gemini is always single-shot
    #[serde(default = "default_true")]
    pub streaming: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_temperature() -> f32 {
    0.7
}
fn default_timeout_secs() -> u64 {
    120
}

impl ProviderConfig {
    /// The configured model, or the vendor default.
    pub fn model_name(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.kind.default_model().to_string())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            model: None,
            api_key: None,
            api_url: None,
            streaming: true,
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("streaming", &self.streaming)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotelConfig {
    #[serde(default = "default_hotel_url")]
    pub base_url: String,
}

fn default_hotel_url() -> String {
    "https://bot9assignement.deno.dev".into()
}

impl Default for HotelConfig {
    fn default() -> Self {
        Self {
            base_url: default_hotel_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed browser origin; no CORS layer when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cors_origin: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveBackend {
    #[default]
    Sqlite,
    Memory,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub backend: ArchiveBackend,

    /// SQLite database file
    #[serde(default = "default_archive_path")]
    pub path: String,
}

fn default_archive_path() -> String {
    "chat_history.sqlite".into()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            backend: ArchiveBackend::default(),
            path: default_archive_path(),
        }
    }
}

/// What to do with a new input while a reply is still being generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Refuse the new input
    #[default]
    Reject,
    /// Stop the running generation, then handle the new input
    CancelPrevious,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum number of tool-dispatch rounds per user input
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    #[serde(default)]
    pub on_busy: BusyPolicy,

    /// The one message a client sees when a round fails
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_max_tool_rounds() -> u32 {
    5
}
fn default_fallback_message() -> String {
    "An error occurred. Please try again.".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            on_busy: BusyPolicy::default(),
            fallback_message: default_fallback_message(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// System prompt template; `{rooms}` is replaced with the room inventory
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
        }
    }
}

impl AssistantConfig {
    /// Render the system prompt with the raw room inventory embedded.
    pub fn render(&self, rooms_json: &str) -> String {
        self.system_prompt.replace(ROOMS_PLACEHOLDER, rooms_json)
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.staybot/config.toml).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides:
    /// - `STAYBOT_PROVIDER`, `STAYBOT_MODEL`
    /// - `STAYBOT_API_KEY` (highest priority), then `OPENAI_API_KEY` / `GEMINI_API_KEY`
    /// - `STAYBOT_HOTEL_URL`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
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

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(kind) = var("STAYBOT_PROVIDER") {
            self.provider.kind = kind.parse()?;
        }

        if let Some(model) = var("STAYBOT_MODEL") {
            self.provider.model = Some(model);
        }

        if let Some(key) = var("STAYBOT_API_KEY") {
            self.provider.api_key = Some(key);
        } else if self.provider.api_key.is_none() {
            self.provider.api_key = var(self.provider.kind.api_key_env());
        }

        if let Some(url) = var("STAYBOT_HOTEL_URL") {
            self.hotel.base_url = url;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".staybot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "provider.timeout_secs must be > 0".into(),
            ));
        }

        if self.engine.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "engine.max_tool_rounds must be >= 1".into(),
            ));
        }

        if self.hotel.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "hotel.base_url must not be empty".into(),
            ));
        }

        if !self.assistant.system_prompt.contains(ROOMS_PLACEHOLDER) {
            tracing::warn!("assistant.system_prompt has no {{rooms}} placeholder; room data will not be shown to the model");
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
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
