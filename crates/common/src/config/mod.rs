//! Configuration management for Open Synthesis services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with OSYN__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml, config/local.toml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix, e.g. `OSYN__RETRIEVAL__N_RESULTS=10`
pub const ENV_PREFIX: &str = "OSYN";

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Vector store configuration
    pub vector_store: VectorStoreConfig,

    /// Embedding endpoint configuration
    pub embedding: EmbeddingConfig,

    /// Hybrid retrieval configuration
    pub retrieval: RetrievalConfig,

    /// Generation parameters
    pub inference: InferenceConfig,

    /// Inference backend endpoint
    pub backend: BackendConfig,

    /// Validation pass toggles
    pub validation: ValidationConfig,

    /// Observability configuration
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// CORS allowed origins; `*` allows any
    pub allowed_origins: Vec<String>,

    /// Shutdown timeout in seconds
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Store provider: chroma, memory
    pub provider: String,

    /// Chroma server URL
    pub url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// OpenAI-compatible embedding API base URL
    pub api_base: String,

    /// API key for the embedding service
    pub api_key: Option<String>,

    /// Model to use
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries
    pub max_retries: u32,

    /// Batch size for embedding requests
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates requested from the dense phase and final result size
    pub n_results: usize,

    /// RRF weight of the dense list
    pub dense_weight: f64,

    /// RRF weight of the sparse list
    pub sparse_weight: f64,

    /// RRF rank constant
    pub rrf_k: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,

    /// Requested output budget before context clamping
    pub max_new_tokens: usize,

    /// Context length assumed when the backend cannot report one
    pub fallback_context_length: usize,

    /// Smallest output budget a request may be clamped to
    pub min_output_tokens: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// RunPod pod id, used to derive the proxy URL
    pub pod_id: String,

    /// Bearer token for the inference endpoint
    pub api_key: String,

    /// Served model name
    pub model: String,

    /// Explicit base URL; overrides the pod proxy URL
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub citation_check: bool,
    pub hallucination_check: bool,
    pub uncertainty_quantification: bool,
    pub human_review_required: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    pub log_level: String,

    /// Enable JSON logging
    pub json_logging: bool,

    /// Prometheus exporter port (0 to disable)
    pub metrics_port: u16,

    /// Service name for logs
    pub service_name: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_allowed_origins() -> Vec<String> {
    vec![
        "https://opensynthesis.dev".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:8080".to_string(),
        "http://127.0.0.1:3000".to_string(),
        "http://127.0.0.1:8080".to_string(),
        "null".to_string(),
    ]
}
fn default_shutdown_timeout() -> u64 { 30 }
fn default_store_provider() -> String { "chroma".to_string() }
fn default_store_url() -> String { "http://localhost:8000".to_string() }
fn default_store_timeout() -> u64 { 30 }
fn default_embedding_base() -> String { "http://localhost:8001/v1".to_string() }
fn default_embedding_model() -> String { "all-MiniLM-L6-v2".to_string() }
fn default_embedding_timeout() -> u64 { 30 }
fn default_embedding_retries() -> u32 { 3 }
fn default_batch_size() -> usize { 64 }
fn default_n_results() -> usize { 20 }
fn default_dense_weight() -> f64 { 0.6 }
fn default_sparse_weight() -> f64 { 0.4 }
fn default_rrf_k() -> f64 { 60.0 }
fn default_temperature() -> f32 { 0.3 }
fn default_top_p() -> f32 { 0.9 }
fn default_repetition_penalty() -> f32 { 1.1 }
fn default_max_new_tokens() -> usize { 16384 }
fn default_fallback_context() -> usize { 32768 }
fn default_min_output_tokens() -> usize { 256 }
fn default_backend_model() -> String { "opensynthesis/Qwen3-14B-heretic".to_string() }
fn default_backend_timeout() -> u64 { 300 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "opensynthesis".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            allowed_origins: default_allowed_origins(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            provider: default_store_provider(),
            url: default_store_url(),
            timeout_secs: default_store_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: default_embedding_base(),
            api_key: None,
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
            max_retries: default_embedding_retries(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            n_results: default_n_results(),
            dense_weight: default_dense_weight(),
            sparse_weight: default_sparse_weight(),
            rrf_k: default_rrf_k(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            top_p: default_top_p(),
            repetition_penalty: default_repetition_penalty(),
            max_new_tokens: default_max_new_tokens(),
            fallback_context_length: default_fallback_context(),
            min_output_tokens: default_min_output_tokens(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            pod_id: String::new(),
            api_key: String::new(),
            model: default_backend_model(),
            base_url: String::new(),
            timeout_secs: default_backend_timeout(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            citation_check: true,
            hallucination_check: true,
            uncertainty_quantification: true,
            human_review_required: true,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl BackendConfig {
    /// Resolve the inference base URL: explicit URL, else the pod proxy
    pub fn resolved_base_url(&self) -> String {
        if !self.base_url.is_empty() {
            self.base_url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}-8000.proxy.runpod.net", self.pod_id)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("server.allowed_origins")
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            .add_source(env_source())
            .build()?;

        config.try_deserialize()
    }

    /// Load from a specific TOML file; a missing file yields defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(env_source())
            .build()?;

        config.try_deserialize()
    }

    /// `from_file` when a path is given, `load` otherwise
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Self::load(),
        }
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(config.retrieval.n_results, 20);
        assert!((config.retrieval.dense_weight - 0.6).abs() < f64::EPSILON);
        assert!((config.inference.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.inference.min_output_tokens, 256);
        assert!(config.validation.citation_check);
    }

    #[test]
    fn test_load_partial_toml() {
        let dir = std::env::temp_dir().join(format!("osyn-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.toml");
        std::fs::write(
            &path,
            "[inference]\ntemperature = 0.7\n\n[retrieval]\nn_results = 10\n",
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert!((config.inference.temperature - 0.7).abs() < 1e-6);
        assert_eq!(config.retrieval.n_results, 10);
        // Other settings keep defaults
        assert_eq!(config.embedding.model, "all-MiniLM-L6-v2");
        assert_eq!(config.inference.max_new_tokens, 16384);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = tokio_test::assert_ok!(AppConfig::from_file("/nonexistent/opensynthesis.toml"));
        assert_eq!(config.vector_store.url, "http://localhost:8000");
    }

    #[test]
    fn test_backend_url_resolution() {
        let mut backend = BackendConfig::default();
        backend.pod_id = "abc123".into();
        assert_eq!(
            backend.resolved_base_url(),
            "https://abc123-8000.proxy.runpod.net"
        );

        backend.base_url = "http://localhost:8000/".into();
        assert_eq!(backend.resolved_base_url(), "http://localhost:8000");
    }
}
