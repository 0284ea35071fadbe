//! Open Synthesis API Gateway
//!
//! HTTP surface over the synthesis engine.
//! Handles:
//! - Blocking and streamed (SSE) synthesis
//! - Health and domain listing
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use opensynthesis_common::{
    config::{AppConfig, ObservabilityConfig},
    llm::{InferenceBackend, VllmClient},
    metrics,
    vectorstore::{build_vector_store, VectorStore},
};
use opensynthesis_context::{GenerationSlot, Synthesizer, Validator};
use opensynthesis_search::HybridRetriever;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn VectorStore>,
    pub backend: Arc<dyn InferenceBackend>,
    pub synthesizer: Arc<Synthesizer>,
    pub validator: Arc<Validator>,
}

impl AppState {
    /// Wire the synthesis engine over a store and backend
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn VectorStore>,
        backend: Arc<dyn InferenceBackend>,
    ) -> Self {
        let retriever = Arc::new(HybridRetriever::from_config(store.clone(), &config.retrieval));
        let synthesizer = Arc::new(Synthesizer::new(
            retriever,
            backend.clone(),
            GenerationSlot::new(),
            &config,
        ));
        let validator = Arc::new(Validator::new(synthesizer.clone(), config.validation.clone()));

        Self {
            config,
            store,
            backend,
            synthesizer,
            validator,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;
    init_tracing(&config.observability);

    info!("Starting Open Synthesis API Gateway v{}", opensynthesis_common::VERSION);

    // Initialize metrics
    init_metrics(config.observability.metrics_port)?;
    metrics::register_metrics();

    let config = Arc::new(config);
    let store = build_vector_store(&config.vector_store, &config.embedding)?;
    let backend: Arc<dyn InferenceBackend> =
        Arc::new(VllmClient::new(&config.backend, &config.inference)?);
    info!(backend = %backend.endpoint(), store = %config.vector_store.provider, "Clients configured");

    let state = AppState::new(config.clone(), store.clone(), backend.clone());
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    backend.close().await;
    store.close().await;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Serve Prometheus metrics on their own port; 0 disables the exporter
fn init_metrics(port: u16) -> anyhow::Result<()> {
    if port == 0 {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .set_buckets_for_metric(
            Matcher::Suffix("generation_duration_seconds".to_string()),
            metrics::GENERATION_BUCKETS,
        )?
        .install()?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/domains", get(handlers::health::domains))
        .route("/chat", post(handlers::chat::chat))
        .route("/chat/stream", post(handlers::chat::chat_stream));

    Router::new()
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use futures::stream::{self, StreamExt};
    use opensynthesis_common::embeddings::HashEmbedder;
    use opensynthesis_common::errors::Result;
    use opensynthesis_common::llm::{ChatMessage, TokenStream};
    use opensynthesis_common::models::{Chunk, ChunkMetadata};
    use opensynthesis_common::vectorstore::MemoryVectorStore;
    use tower::ServiceExt;

    /// Backend that answers every prompt with the same text
    pub struct EchoBackend;

    #[async_trait]
    impl InferenceBackend for EchoBackend {
        async fn generate(&self, messages: &[ChatMessage], _t: f32, _m: usize) -> Result<String> {
            let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
            if prompt.contains("\"confidence\"") {
                return Ok(r#"{"confidence": "limited"}"#.to_string());
            }
            Ok("Synthesised answer [SOURCE 1].".to_string())
        }

        async fn generate_stream(&self, _m: &[ChatMessage], _t: f32, _x: usize) -> Result<TokenStream> {
            Ok(stream::iter(vec![Ok("Synth".to_string()), Ok("esised".to_string())]).boxed())
        }

        async fn max_context_length(&self) -> Result<usize> {
            Ok(32768)
        }

        fn endpoint(&self) -> String {
            "http://vllm.test:8000".to_string()
        }
    }

    pub async fn test_state() -> AppState {
        let store = Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder::new(64))));
        let mut meta = ChunkMetadata::new();
        meta.insert("authors".into(), "Davis AK".into());
        meta.insert("year".into(), "2021".into());
        meta.insert("title".into(), "Psilocybin trial".into());
        store
            .add("psych", &[Chunk::new("doc-1", 0, "Psilocybin reduced depression scores.").with_metadata(meta)])
            .await
            .unwrap();

        let mut config = AppConfig::default();
        config.validation.citation_check = false;
        config.validation.hallucination_check = false;
        AppState::new(Arc::new(config), store, Arc::new(EchoBackend))
    }

    /// Send one request through a fresh router
    pub async fn send(state: AppState, request: Request<Body>) -> (StatusCode, String) {
        let response = tokio_test::assert_ok!(create_router(state).oneshot(request).await);
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }
}
