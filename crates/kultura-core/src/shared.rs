//! Global application configuration. Load from TOML or env.

use serde::{Deserialize, Serialize};

/// Gateway configuration: identity, storage paths, and upstream LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KulturaConfig {
    /// Application identity shown by `/api/info`.
    pub app_name: String,
    /// HTTP port for the gateway.
    pub port: u16,
    /// Base directory for the Sled knowledge DB.
    pub storage_path: String,
    /// Path to the cultural items seed file (JSON, category -> item array).
    pub dataset_path: String,
    /// Path to the artifacts seed file (JSON, `{ "artifacts": [...] }`).
    pub artifacts_path: String,

    /// LLM mode: "mock" (deterministic, offline) or "live".
    pub llm_mode: String,
    /// OpenAI-compatible chat-completions base URL (ASI Cloud endpoint).
    pub llm_base_url: String,
    /// Model identifier passed to the completions API.
    pub llm_model: String,
    /// Bearer token for the LLM endpoint. Usually set via `KULTURA_LLM_API_KEY`.
    #[serde(default)]
    pub llm_api_key: Option<String>,
    /// Token budget for generated answers.
    pub max_tokens: u32,

    /// When true, web enrichment never touches the network.
    #[serde(default)]
    pub offline: bool,
}

impl KulturaConfig {
    /// Load config from file and environment.
    /// Precedence: env `KULTURA_CONFIG` path > `config/gateway.toml` > defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("KULTURA_CONFIG").unwrap_or_else(|_| "config/gateway".to_string());
        let builder = config::Config::builder()
            .set_default("app_name", "KulturaMind API")?
            .set_default("port", 8000_i64)?
            .set_default("storage_path", "./data")?
            .set_default("dataset_path", "assets/cultural_data.json")?
            .set_default("artifacts_path", "assets/artifacts.json")?
            .set_default("llm_mode", "mock")?
            .set_default("llm_base_url", "https://inference.asicloud.cudos.org/v1")?
            .set_default("llm_model", "qwen/qwen3-32b")?
            .set_default("max_tokens", 800_i64)?
            .set_default("offline", false)?;

        let built = builder
            .add_source(config::File::with_name(&config_path).required(false))
            .add_source(config::Environment::with_prefix("KULTURA").separator("__"))
            .build()?;

        built.try_deserialize()
    }
}
