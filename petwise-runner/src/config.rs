//! Turn and application configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use petwise_core::{PetwiseError, Result};
use petwise_model::openai::OPENAI_API_BASE;
use petwise_telemetry::LogFormat;

use crate::evidence::EvidenceLimits;

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Settings for one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    pub route_model: String,
    pub compose_model: String,
    /// Used for both the routing and the compose call.
    pub temperature: f32,
    pub evidence: EvidenceLimits,
    /// Function calls honoured from one routing response.
    pub max_tool_calls: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            route_model: DEFAULT_CHAT_MODEL.to_string(),
            compose_model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.1,
            evidence: EvidenceLimits::default(),
            max_tool_calls: 4,
        }
    }
}

impl OrchestratorConfig {
    pub fn builder() -> OrchestratorConfigBuilder {
        OrchestratorConfigBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfigBuilder {
    config: OrchestratorConfig,
}

impl OrchestratorConfigBuilder {
    pub fn route_model(mut self, model: impl Into<String>) -> Self {
        self.config.route_model = model.into();
        self
    }

    pub fn compose_model(mut self, model: impl Into<String>) -> Self {
        self.config.compose_model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn evidence(mut self, evidence: EvidenceLimits) -> Self {
        self.config.evidence = evidence;
        self
    }

    pub fn max_tool_calls(mut self, n: usize) -> Self {
        self.config.max_tool_calls = n;
        self
    }

    pub fn build(self) -> Result<OrchestratorConfig> {
        let c = self.config;
        if !(0.0..=2.0).contains(&c.temperature) {
            return Err(PetwiseError::Config(format!("temperature {} is outside 0..=2", c.temperature)));
        }
        if c.max_tool_calls == 0 {
            return Err(PetwiseError::Config("max_tool_calls must be at least 1".into()));
        }
        if c.evidence.with_content == 0 || c.evidence.fallback == 0 {
            return Err(PetwiseError::Config("evidence limits must be at least 1".into()));
        }
        Ok(c)
    }
}

/// Process configuration read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub route_model: String,
    pub compose_model: String,
    pub persona_model: String,
    pub embedding_model: String,
    pub catalog_path: PathBuf,
    pub vector_store_path: PathBuf,
    pub eval_log_dir: PathBuf,
    pub retriever_cache_size: usize,
    pub embedding_cache_size: usize,
    pub tool_timeout: Duration,
    pub llm_timeout: Duration,
    pub search_concurrency: Option<usize>,
    pub search_queue_limit: usize,
    pub persona_message_window: usize,
    pub burst_threshold: usize,
    pub burst_window: Duration,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Read `PETWISE_*` variables, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; used by tests instead of the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let number = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(raw) => parse(key, &raw),
                None => Ok(default),
            }
        };

        let log_format = match get("PETWISE_LOG_FORMAT") {
            Some(raw) => LogFormat::from_str(&raw)
                .map_err(|e| PetwiseError::Config(format!("PETWISE_LOG_FORMAT: {e}")))?,
            None => LogFormat::default(),
        };
        let search_concurrency = match get("PETWISE_SEARCH_CONCURRENCY") {
            Some(raw) => Some(parse::<usize>("PETWISE_SEARCH_CONCURRENCY", &raw)?),
            None => None,
        };

        Ok(Self {
            api_key: get("PETWISE_OPENAI_API_KEY").or_else(|| get("OPENAI_API_KEY")),
            base_url: text("PETWISE_OPENAI_BASE_URL", OPENAI_API_BASE),
            route_model: text("PETWISE_ROUTE_MODEL", DEFAULT_CHAT_MODEL),
            compose_model: text("PETWISE_COMPOSE_MODEL", DEFAULT_CHAT_MODEL),
            persona_model: text("PETWISE_PERSONA_MODEL", DEFAULT_CHAT_MODEL),
            embedding_model: text("PETWISE_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            catalog_path: text("PETWISE_CATALOG_PATH", "data/products.tsv").into(),
            vector_store_path: text("PETWISE_VECTOR_STORE_PATH", "data/vector_store").into(),
            eval_log_dir: text("PETWISE_EVAL_LOG_DIR", "logs/evaluation").into(),
            retriever_cache_size: number("PETWISE_RETRIEVER_CACHE_SIZE", 512)? as usize,
            embedding_cache_size: number("PETWISE_EMBEDDING_CACHE_SIZE", 2048)? as usize,
            tool_timeout: Duration::from_secs(number("PETWISE_TOOL_TIMEOUT_SECS", 15)?),
            llm_timeout: Duration::from_secs(number("PETWISE_LLM_TIMEOUT_SECS", 60)?),
            search_concurrency,
            search_queue_limit: number("PETWISE_SEARCH_QUEUE_LIMIT", 64)? as usize,
            persona_message_window: number("PETWISE_PERSONA_MESSAGE_WINDOW", 4)? as usize,
            burst_threshold: number("PETWISE_BURST_THRESHOLD", 3)? as usize,
            burst_window: Duration::from_secs(number("PETWISE_BURST_WINDOW_MINUTES", 30)? * 60),
            log_format,
        })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| PetwiseError::Config(format!("{key}={raw:?} is not a valid number: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.route_model, DEFAULT_CHAT_MODEL);
        assert_eq!(config.tool_timeout, Duration::from_secs(15));
        assert_eq!(config.burst_window, Duration::from_secs(1800));
        assert_eq!(config.search_concurrency, None);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn reads_overrides_and_key_fallback() {
        let config = AppConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-fallback"),
            ("PETWISE_TOOL_TIMEOUT_SECS", " 5 "),
            ("PETWISE_SEARCH_CONCURRENCY", "2"),
            ("PETWISE_LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-fallback"));
        assert_eq!(config.tool_timeout, Duration::from_secs(5));
        assert_eq!(config.search_concurrency, Some(2));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn invalid_numbers_name_the_variable() {
        let err = AppConfig::from_lookup(lookup(&[("PETWISE_BURST_THRESHOLD", "three")])).unwrap_err();
        assert!(err.to_string().contains("PETWISE_BURST_THRESHOLD"));
    }

    #[test]
    fn orchestrator_builder_validates() {
        assert!(OrchestratorConfig::builder().temperature(3.0).build().is_err());
        let config = OrchestratorConfig::builder().route_model("router").build().unwrap();
        assert_eq!(config.route_model, "router");
        assert_eq!(config.compose_model, DEFAULT_CHAT_MODEL);
    }
}
