//! Service configuration loaded from an optional config file and environment
//! variables (`NPC_JUDGE__SECTION__KEY`).

use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub embeddings: EmbeddingsConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub judge: JudgeConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub workers: WorkersConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("npc-judge.db")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("reports")
    }
}

/// OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub base_url: String,

    /// Bearer token; omitted for local endpoints that do not need one
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Embeddings endpoint configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    /// Defaults to `llm.base_url` when unset
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Parallel embedding requests while seeding the vector store
    #[serde(default = "default_seed_concurrency")]
    pub seed_concurrency: usize,
}

/// Backoff policy for outbound model calls
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

/// Judge engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_judge_temperature")]
    pub temperature: f32,

    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
}

/// Agent loop configuration. The iteration cap is not configurable.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_temperature")]
    pub reasoning_temperature: f32,

    #[serde(default = "default_agent_temperature")]
    pub response_temperature: f32,
}

/// Queue worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WorkersConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_judge_concurrency")]
    pub judge_concurrency: usize,

    #[serde(default = "default_agent_concurrency")]
    pub agent_concurrency: usize,
}

impl WorkersConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsConfig {
    /// Address for the scrape endpoint; the exporter is disabled when unset
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,
}

/// Load configuration from `config.*` (optional) and `NPC_JUDGE__*` env vars
pub fn load_config() -> ServiceResult<AppConfig> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("NPC_JUDGE")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })
}

// ==================== Default Value Functions ====================

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_url(),
            api_key: None,
            model: default_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_embedding_model(),
            seed_concurrency: default_seed_concurrency(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            temperature: default_judge_temperature(),
            retrieval_top_k: default_retrieval_top_k(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            reasoning_temperature: default_agent_temperature(),
            response_temperature: default_agent_temperature(),
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            judge_concurrency: default_judge_concurrency(),
            agent_concurrency: default_agent_concurrency(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_llm_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-3.5-turbo-0125".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_seed_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_judge_temperature() -> f32 {
    0.2
}

fn default_retrieval_top_k() -> usize {
    6
}

fn default_agent_temperature() -> f32 {
    0.3
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_judge_concurrency() -> usize {
    4
}

fn default_agent_concurrency() -> usize {
    2
}
