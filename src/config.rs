//! Configuration management for askql.
//!
//! Handles loading configuration from TOML files and environment variables.
//! Precedence, lowest first: built-in defaults, config file, environment,
//! command line.

use crate::error::{AskError, Result};
use crate::llm::LlmProvider;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for askql.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LLM provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Cost estimation and cap.
    #[serde(default)]
    pub budget: BudgetConfig,

    /// Query execution settings.
    #[serde(default)]
    pub query: QueryConfig,

    /// SQL gate settings.
    #[serde(default)]
    pub safety: SafetyConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding uploads, stores and schema sidecars.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Store used before anything has been uploaded.
    #[serde(default = "default_database")]
    pub default_database: PathBuf,

    /// Maximum upload size in megabytes.
    #[serde(default = "default_upload_limit_mb")]
    pub upload_limit_mb: usize,

    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Token required by administrative endpoints.
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Replace 5xx error details with a generic message.
    #[serde(default)]
    pub redact_errors: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_database() -> PathBuf {
    PathBuf::from("database.db")
}

fn default_upload_limit_mb() -> usize {
    50
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upload_dir: default_upload_dir(),
            default_database: default_database(),
            upload_limit_mb: default_upload_limit_mb(),
            cors_origins: Vec::new(),
            admin_token: None,
            redact_errors: false,
        }
    }
}

impl ServerConfig {
    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// LLM provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// LLM provider: "gemini", "openai" or "mock".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name; the provider's default when unset.
    #[serde(default)]
    pub model: Option<String>,

    /// API key; the provider's environment variable when unset.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Upper bound on a single completion call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    LlmProvider::default().as_str().to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Parses the configured provider name.
    pub fn provider(&self) -> Result<LlmProvider> {
        self.provider.parse().map_err(AskError::config)
    }
}

/// Cost estimation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetConfig {
    /// Estimated spend at which completions are refused.
    #[serde(default = "default_cost_cap")]
    pub cost_cap: f64,

    /// Price per million input tokens.
    #[serde(default = "default_input_price")]
    pub input_price_per_million: f64,

    /// Price per million output tokens.
    #[serde(default = "default_output_price")]
    pub output_price_per_million: f64,

    /// Tokens assumed per whitespace-separated word.
    #[serde(default = "default_tokens_per_word")]
    pub tokens_per_word: f64,

    /// Requests shown in the monitoring snapshot.
    #[serde(default = "default_recent_requests")]
    pub recent_requests: usize,

    /// Feedback sessions shown in the monitoring snapshot.
    #[serde(default = "default_recent_feedback")]
    pub recent_feedback: usize,
}

fn default_cost_cap() -> f64 {
    10.0
}

fn default_input_price() -> f64 {
    0.075
}

fn default_output_price() -> f64 {
    0.30
}

fn default_tokens_per_word() -> f64 {
    1.3
}

fn default_recent_requests() -> usize {
    10
}

fn default_recent_feedback() -> usize {
    5
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            cost_cap: default_cost_cap(),
            input_price_per_million: default_input_price(),
            output_price_per_million: default_output_price(),
            tokens_per_word: default_tokens_per_word(),
            recent_requests: default_recent_requests(),
            recent_feedback: default_recent_feedback(),
        }
    }
}

/// Query execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryConfig {
    /// Upper bound on a single query.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// SQL gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SafetyConfig {
    /// Parse generated SQL and allow only read-only query shapes.
    #[serde(default = "default_parse_check")]
    pub parse_check: bool,
}

fn default_parse_check() -> bool {
    true
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            parse_check: default_parse_check(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LoggingConfig {
    /// Write logs to this file instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Write logs to the platform log path when no file is given.
    #[serde(default)]
    pub to_file: bool,
}

impl LoggingConfig {
    /// Log file to use, if logging to a file is enabled.
    pub fn log_path(&self) -> Option<PathBuf> {
        match &self.file {
            Some(path) => Some(path.clone()),
            None if self.to_file => Some(crate::logging::get_log_path()),
            None => None,
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("askql")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AskError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            AskError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies process environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`, which maps variable names to values.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = lookup("UPLOAD_FOLDER") {
            self.server.upload_dir = PathBuf::from(dir);
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(token) = lookup("ASKQL_ADMIN_TOKEN") {
            self.server.admin_token = Some(token);
        }
        if let Some(provider) = lookup("ASKQL_LLM_PROVIDER") {
            self.llm.provider = provider;
        }
    }

    /// Checks values that cannot be expressed through types alone.
    pub fn validate(&self) -> Result<()> {
        self.llm.provider()?;

        if !self.budget.cost_cap.is_finite() || self.budget.cost_cap < 0.0 {
            return Err(AskError::config("budget.cost_cap must be a non-negative number"));
        }
        if self.llm.timeout_secs == 0 || self.query.timeout_secs == 0 {
            return Err(AskError::config("timeouts must be at least one second"));
        }
        if self.server.upload_limit_mb == 0 {
            return Err(AskError::config("server.upload_limit_mb must be positive"));
        }
        Ok(())
    }
}
