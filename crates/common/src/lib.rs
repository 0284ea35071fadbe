//! Open Synthesis Common Library
//!
//! Shared code for the Open Synthesis crates including:
//! - Core data model (chunks, synthesis results, papers)
//! - Error types and handling
//! - Configuration management
//! - Vector store and embedding abstractions
//! - Inference backend client
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod http;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod vectorstore;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use llm::{ChatMessage, InferenceBackend, TokenStream};
pub use models::{Chunk, Document, RetrievalMethod, ScoredChunk, SynthesisResult};
pub use vectorstore::VectorStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
