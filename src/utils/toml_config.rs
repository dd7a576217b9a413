//! TOML-based configuration for Scholar
//!
//! This module provides declarative configuration for providers, models, the
//! research pipeline, agents, storage and logging via a TOML file
//! (`scholar.toml`). Every section is optional; an empty file yields a working
//! local setup against Ollama.
//!
//! Use [`ScholarConfigManager`] for thread-safe access to the current
//! configuration and on-demand reloads.

use crate::agents::{AcademicSearchAgent, WebSearchAgent};
use crate::types::AppError;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Root configuration structure loaded from scholar.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarConfig {
    /// Named LLM provider configurations
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,

    /// Named model configurations that reference providers
    #[serde(default = "default_models")]
    pub models: HashMap<String, ModelConfig>,

    /// Model selection and limits for the research pipeline
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Per-agent settings keyed by agent id
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            models: default_models(),
            pipeline: PipelineConfig::default(),
            agents: HashMap::new(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

const DEFAULT_PROVIDER: &str = "ollama-local";
const DEFAULT_MODEL: &str = "default";

fn default_providers() -> HashMap<String, ProviderConfig> {
    HashMap::from([(
        DEFAULT_PROVIDER.to_string(),
        ProviderConfig::Ollama {
            base_url: default_ollama_url(),
            default_model: default_ollama_model(),
        },
    )])
}

fn default_models() -> HashMap<String, ModelConfig> {
    HashMap::from([(
        DEFAULT_MODEL.to_string(),
        ModelConfig {
            provider: DEFAULT_PROVIDER.to_string(),
            model: default_ollama_model(),
            temperature: default_temperature(),
            max_tokens: default_model_max_tokens(),
        },
    )])
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default = "default_ollama_model")]
        default_model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        default_model: String,
    },
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

// ============= Model Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    /// Model name/identifier to use with the provider
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_model_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_model_max_tokens() -> u32 {
    1024
}

// ============= Pipeline Configuration =============

/// Pipeline phases that can be pointed at their own model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelinePhase {
    Routing,
    Planning,
    Conversation,
    Synthesis,
    Recommendation,
}

impl PipelinePhase {
    pub const ALL: [PipelinePhase; 5] = [
        PipelinePhase::Routing,
        PipelinePhase::Planning,
        PipelinePhase::Conversation,
        PipelinePhase::Synthesis,
        PipelinePhase::Recommendation,
    ];

    /// Name of the `[pipeline]` key that overrides this phase's model.
    pub fn config_key(&self) -> &'static str {
        match self {
            PipelinePhase::Routing => "router_model",
            PipelinePhase::Planning => "planner_model",
            PipelinePhase::Conversation => "conversation_model",
            PipelinePhase::Synthesis => "synthesis_model",
            PipelinePhase::Recommendation => "recommendation_model",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model used by every phase without an override
    #[serde(default = "default_pipeline_model")]
    pub default_model: String,

    #[serde(default)]
    pub router_model: Option<String>,
    #[serde(default)]
    pub planner_model: Option<String>,
    #[serde(default)]
    pub conversation_model: Option<String>,
    #[serde(default)]
    pub synthesis_model: Option<String>,
    #[serde(default)]
    pub recommendation_model: Option<String>,

    /// Turns loaded from the store per request
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Turns rendered into classification, planning and synthesis prompts
    #[serde(default = "default_prompt_history_window")]
    pub prompt_history_window: usize,

    /// Per-step agent timeout unless the agent overrides it
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,

    #[serde(default = "default_max_plan_steps")]
    pub max_plan_steps: usize,

    #[serde(default = "default_max_sources_in_prompt")]
    pub max_sources_in_prompt: usize,

    /// Status snapshots kept for polling before the oldest finished ones are dropped
    #[serde(default = "default_max_tracked_turns")]
    pub max_tracked_turns: usize,

    /// Agent used by the fallback plan
    #[serde(default = "default_agent")]
    pub default_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_model: default_pipeline_model(),
            router_model: None,
            planner_model: None,
            conversation_model: None,
            synthesis_model: None,
            recommendation_model: None,
            history_window: default_history_window(),
            prompt_history_window: default_prompt_history_window(),
            agent_timeout_secs: default_agent_timeout_secs(),
            max_plan_steps: default_max_plan_steps(),
            max_sources_in_prompt: default_max_sources_in_prompt(),
            max_tracked_turns: default_max_tracked_turns(),
            default_agent: default_agent(),
        }
    }
}

impl PipelineConfig {
    /// Model name for `phase`, falling back to `default_model`.
    pub fn model_for(&self, phase: PipelinePhase) -> &str {
        let override_model = match phase {
            PipelinePhase::Routing => &self.router_model,
            PipelinePhase::Planning => &self.planner_model,
            PipelinePhase::Conversation => &self.conversation_model,
            PipelinePhase::Synthesis => &self.synthesis_model,
            PipelinePhase::Recommendation => &self.recommendation_model,
        };
        override_model.as_deref().unwrap_or(&self.default_model)
    }
}

fn default_pipeline_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_history_window() -> usize {
    crate::memory::DEFAULT_HISTORY_WINDOW
}

fn default_prompt_history_window() -> usize {
    crate::memory::DEFAULT_PROMPT_HISTORY_WINDOW
}

fn default_agent_timeout_secs() -> u64 {
    30
}

fn default_max_plan_steps() -> usize {
    5
}

fn default_max_sources_in_prompt() -> usize {
    10
}

fn default_max_tracked_turns() -> usize {
    256
}

fn default_agent() -> String {
    WebSearchAgent::ID.to_string()
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub max_results: Option<usize>,

    /// Overrides `pipeline.agent_timeout_secs` for this agent
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Alternative endpoint, for agents that call an HTTP API
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_results: None,
            timeout_secs: None,
            base_url: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Agents this build knows how to construct.
pub const KNOWN_AGENTS: [&str; 2] = [WebSearchAgent::ID, AcademicSearchAgent::ID];

// ============= Store Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// JSON lines file for conversation turns; in-memory when unset
    #[serde(default)]
    pub path: Option<String>,
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

// ============= Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),

    #[error("Provider '{0}' referenced by model '{1}' does not exist")]
    MissingProvider(String, String),

    #[error("Model '{0}' referenced by '{1}' does not exist")]
    MissingModel(String, String),

    #[error("Unknown agent '{0}' in {1}")]
    UnknownAgent(String, String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

impl ScholarConfig {
    /// Load and validate configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Parse without validating.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration for internal consistency and env var availability
    pub fn validate(&self) -> Result<(), ConfigError> {
        for provider in self.providers.values() {
            if let ProviderConfig::OpenAI { api_key_env, .. } = provider {
                std::env::var(api_key_env)
                    .map_err(|_| ConfigError::MissingEnvVar(api_key_env.clone()))?;
            }
        }

        for (model_name, model_config) in &self.models {
            if !self.providers.contains_key(&model_config.provider) {
                return Err(ConfigError::MissingProvider(
                    model_config.provider.clone(),
                    model_name.clone(),
                ));
            }
        }

        if !self.models.contains_key(&self.pipeline.default_model) {
            return Err(ConfigError::MissingModel(
                self.pipeline.default_model.clone(),
                "pipeline.default_model".to_string(),
            ));
        }
        for phase in PipelinePhase::ALL {
            let model = self.pipeline.model_for(phase);
            if !self.models.contains_key(model) {
                return Err(ConfigError::MissingModel(
                    model.to_string(),
                    format!("pipeline.{}", phase.config_key()),
                ));
            }
        }

        let limits = [
            ("history_window", self.pipeline.history_window),
            ("max_plan_steps", self.pipeline.max_plan_steps),
            ("max_sources_in_prompt", self.pipeline.max_sources_in_prompt),
            ("max_tracked_turns", self.pipeline.max_tracked_turns),
        ];
        for (key, value) in limits {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "pipeline.{} must be greater than zero",
                    key
                )));
            }
        }
        if self.pipeline.agent_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.agent_timeout_secs must be greater than zero".to_string(),
            ));
        }

        for (agent_id, agent_config) in &self.agents {
            if !KNOWN_AGENTS.contains(&agent_id.as_str()) {
                return Err(ConfigError::UnknownAgent(
                    agent_id.clone(),
                    "[agents]".to_string(),
                ));
            }
            if agent_config.timeout_secs == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "agents.{}.timeout_secs must be greater than zero",
                    agent_id
                )));
            }
        }

        let default_agent = self.pipeline.default_agent.as_str();
        if !KNOWN_AGENTS.contains(&default_agent) {
            return Err(ConfigError::UnknownAgent(
                default_agent.to_string(),
                "pipeline.default_agent".to_string(),
            ));
        }
        if !self.agent_settings(default_agent).enabled {
            return Err(ConfigError::ValidationError(format!(
                "pipeline.default_agent '{}' is disabled",
                default_agent
            )));
        }

        Ok(())
    }

    /// Settings for an agent, defaulted when it has no `[agents.<id>]` table.
    pub fn agent_settings(&self, agent_id: &str) -> AgentConfig {
        self.agents.get(agent_id).cloned().unwrap_or_default()
    }
}

// ============= Configuration Manager =============

/// Thread-safe holder of the current configuration
pub struct ScholarConfigManager {
    config: Arc<ArcSwap<ScholarConfig>>,
    config_path: Option<PathBuf>,
}

impl ScholarConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = ScholarConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: Some(path),
        })
    }

    /// Manager over an in-memory configuration with no backing file
    pub fn from_config(config: ScholarConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: None,
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<ScholarConfig> {
        self.config.load_full()
    }

    pub fn path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Reload the configuration from disk. The previous configuration stays
    /// in place when the file is missing or invalid.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let Some(path) = self.config_path.as_ref() else {
            return Ok(());
        };
        info!("Reloading configuration from {:?}", path);

        let new_config = ScholarConfig::load(path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }
}
