//! Inference backend abstraction
//!
//! The orchestrator only sees [`InferenceBackend`]; [`VllmClient`] speaks the
//! OpenAI-compatible chat API served by vLLM.

mod sse;
mod vllm;

pub use sse::{SseDecoder, SseEvent};
pub use vllm::VllmClient;

use crate::errors::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Incremental text fragments from a streaming generation
pub type TokenStream = BoxStream<'static, Result<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A chat-completion endpoint
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run a completion and return the full text
    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String>;

    /// Run a completion and yield text fragments as they arrive
    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<TokenStream>;

    /// Maximum context length (prompt + output tokens) of the served model
    async fn max_context_length(&self) -> Result<usize>;

    /// Base URL reported on the health endpoint
    fn endpoint(&self) -> String;

    /// Release outbound connections
    async fn close(&self) {}
}
