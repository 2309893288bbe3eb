//! Configuration management for beacond.
//!
//! Loads settings from a TOML file or uses defaults when no file is present.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default config file path
pub const CONFIG_PATH: &str = "/etc/beacon/beacond.toml";

/// Iteration bound limits for the conversation loop
pub const MIN_MAX_ITERATIONS: usize = 1;
pub const MAX_MAX_ITERATIONS: usize = 20;

/// Reasoning engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum output tokens per engine call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Request timeout in seconds
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,

    /// API key; falls back to the ANTHROPIC_API_KEY environment variable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_api_base() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_engine_timeout() -> u64 {
    120
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            api_base: default_api_base(),
            timeout_secs: default_engine_timeout(),
            api_key: None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address; localhost only by default
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:7868".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

/// Seed data locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory containing facts registry YAML files
    #[serde(default = "default_facts_dir")]
    pub facts_dir: PathBuf,

    /// Path to the process graph seed document
    #[serde(default = "default_graph_path")]
    pub graph_path: PathBuf,

    /// Registry loaded at startup
    #[serde(default = "default_registry")]
    pub registry: String,
}

fn default_facts_dir() -> PathBuf {
    PathBuf::from("data/facts")
}

fn default_graph_path() -> PathBuf {
    PathBuf::from("data/graph/boston_rpp.yaml")
}

fn default_registry() -> String {
    "boston_rpp".to_string()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            facts_dir: default_facts_dir(),
            graph_path: default_graph_path(),
            registry: default_registry(),
        }
    }
}

/// Conversation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum engine-call iterations per question, within [1, 20]
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_max_iterations() -> usize {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// Top-level beacond configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

impl Config {
    /// Load configuration from the given path, or defaults when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(CONFIG_PATH));

        let config = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            config
        } else {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations < MIN_MAX_ITERATIONS
            || self.agent.max_iterations > MAX_MAX_ITERATIONS
        {
            bail!(
                "agent.max_iterations must be between {} and {}, got {}",
                MIN_MAX_ITERATIONS,
                MAX_MAX_ITERATIONS,
                self.agent.max_iterations
            );
        }
        if self.engine.max_tokens == 0 {
            bail!("engine.max_tokens must be positive");
        }
        Ok(())
    }
}
