//! Configuration loading, validation, and management for actloop.
//!
//! Loads configuration from `~/.actloop/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use actloop_core::{DependencyPolicy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.actloop/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the model endpoint (`{endpoint}/api/chat` is called)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Default model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature; unset leaves the endpoint default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Per-request timeout for model calls
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Dialogue loop settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// System prompt settings
    #[serde(default)]
    pub identity: IdentityConfig,
}

fn default_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.1".into()
}
fn default_request_timeout() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Iteration budget per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Consecutive failures that trigger a reflection
    #[serde(default = "default_reflection_threshold")]
    pub reflection_threshold: u32,

    /// How plan-step dependencies are satisfied
    #[serde(default)]
    pub dependency_policy: DependencyPolicy,

    /// Per-step retry and backoff
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_max_iterations() -> u32 {
    20
}
fn default_reflection_threshold() -> u32 {
    3
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            reflection_threshold: default_reflection_threshold(),
            dependency_policy: DependencyPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Root directory file tools are confined to
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// If non-empty, `run_command` only accepts these programs
    #[serde(default)]
    pub allowed_commands: Vec<String>,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_command_timeout() -> u64 {
    120
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            allowed_commands: vec![],
            command_timeout_secs: default_command_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Override the built-in system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.actloop/config.toml).
    ///
    /// Environment variables take priority over the file:
    /// - `ACTLOOP_ENDPOINT`
    /// - `ACTLOOP_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(endpoint) = std::env::var("ACTLOOP_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(model) = std::env::var("ACTLOOP_MODEL") {
            config.model = model;
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".actloop")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError("endpoint must not be empty".into()));
        }

        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        let orch = &self.orchestrator;
        if orch.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.max_iterations must be > 0".into(),
            ));
        }
        if orch.reflection_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.reflection_threshold must be > 0".into(),
            ));
        }
        if orch.retry.max_retries == 0 {
            return Err(ConfigError::ValidationError(
                "orchestrator.retry.max_retries must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: None,
            request_timeout_secs: default_request_timeout(),
            orchestrator: OrchestratorConfig::default(),
            tools: ToolsConfig::default(),
            identity: IdentityConfig::default(),
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
