//! Synthesis orchestrator
//!
//! Provides:
//! - Evidence retrieval through the hybrid retriever
//! - Context-window budgeting against the served model's limit
//! - Blocking and streaming generation under the admission slot

use crate::admission::{GenerationSlot, SlotGuard};
use crate::prompts;
use futures::stream::{self, BoxStream, StreamExt};
use opensynthesis_common::config::{AppConfig, InferenceConfig};
use opensynthesis_common::errors::{AppError, Result};
use opensynthesis_common::llm::{ChatMessage, InferenceBackend, TokenStream};
use opensynthesis_common::metrics;
use opensynthesis_common::models::{ScoredChunk, SynthesisResult};
use opensynthesis_search::Retriever;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Source descriptor sent ahead of a streamed synthesis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSummary {
    pub authors: String,
    pub year: String,
    pub title: String,
    pub source_type: String,
    /// Fused relevance score, rounded to 3 decimals
    pub score: f64,
}

impl From<&ScoredChunk> for SourceSummary {
    fn from(rc: &ScoredChunk) -> Self {
        Self {
            authors: rc.chunk.authors().to_string(),
            year: rc.chunk.year().to_string(),
            title: rc.chunk.title().to_string(),
            source_type: rc.chunk.source_type().to_string(),
            score: (rc.score * 1000.0).round() / 1000.0,
        }
    }
}

/// Event in a streamed synthesis.
///
/// A stream yields one `Sources`, any number of `Chunk`s, then exactly one
/// of `Done` or `Error`.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisEvent {
    Sources(Vec<SourceSummary>),
    Chunk(String),
    Done,
    Error(String),
}

impl SynthesisEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            SynthesisEvent::Sources(_) => "sources",
            SynthesisEvent::Chunk(_) => "chunk",
            SynthesisEvent::Done => "done",
            SynthesisEvent::Error(_) => "error",
        }
    }

    /// SSE event payload
    pub fn data(&self) -> Result<String> {
        Ok(match self {
            SynthesisEvent::Sources(sources) => serde_json::to_string(sources)?,
            SynthesisEvent::Chunk(text) => text.clone(),
            SynthesisEvent::Done => String::new(),
            SynthesisEvent::Error(message) => message.clone(),
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SynthesisEvent::Done | SynthesisEvent::Error(_))
    }
}

pub type EventStream = BoxStream<'static, SynthesisEvent>;

/// Rough token estimate used for budgeting: one token per three characters
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 3
}

/// Output budget for a prompt of `input_tokens` against `context_limit`.
///
/// Returns `min(requested, context_limit - input_tokens)`, or
/// [`AppError::ContextTooLarge`] when fewer than `minimum` tokens remain.
pub fn clamp_budget(
    requested: usize,
    context_limit: usize,
    input_tokens: usize,
    minimum: usize,
) -> Result<usize> {
    let remaining = context_limit.saturating_sub(input_tokens);
    if remaining < minimum {
        return Err(AppError::ContextTooLarge {
            estimated_tokens: input_tokens,
            context_limit,
            remaining,
            minimum,
        });
    }
    Ok(requested.min(remaining))
}

/// Retrieval + generation orchestrator
pub struct Synthesizer {
    retriever: Arc<dyn Retriever>,
    backend: Arc<dyn InferenceBackend>,
    slot: GenerationSlot,
    inference: InferenceConfig,
    n_results: usize,
    context_length: OnceCell<usize>,
}

impl Synthesizer {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        backend: Arc<dyn InferenceBackend>,
        slot: GenerationSlot,
        config: &AppConfig,
    ) -> Self {
        Self {
            retriever,
            backend,
            slot,
            inference: config.inference.clone(),
            n_results: config.retrieval.n_results,
            context_length: OnceCell::new(),
        }
    }

    pub fn slot(&self) -> &GenerationSlot {
        &self.slot
    }

    pub fn backend(&self) -> &Arc<dyn InferenceBackend> {
        &self.backend
    }

    pub fn inference(&self) -> &InferenceConfig {
        &self.inference
    }

    /// Model context length; the first successful discovery is kept for the
    /// lifetime of the orchestrator, failures fall back without caching
    pub async fn context_length(&self) -> usize {
        if let Some(len) = self.context_length.get() {
            return *len;
        }

        match self.backend.max_context_length().await {
            Ok(len) => {
                let _ = self.context_length.set(len);
                debug!(context_length = len, "Discovered model context length");
                self.context_length.get().copied().unwrap_or(len)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    fallback = self.inference.fallback_context_length,
                    "Could not query model context length, using fallback"
                );
                self.inference.fallback_context_length
            }
        }
    }

    /// Output budget for `messages`
    async fn budget(&self, messages: &[ChatMessage], requested: usize) -> Result<usize> {
        let input_tokens: usize = messages.iter().map(|m| estimate_tokens(&m.content)).sum();
        let context_limit = self.context_length().await;
        let budget = clamp_budget(
            requested,
            context_limit,
            input_tokens,
            self.inference.min_output_tokens,
        )?;

        if budget < requested {
            info!(requested, budget, input_tokens, context_limit, "Clamped output budget");
        }
        Ok(budget)
    }

    /// Hybrid retrieval for `query` in `domain`
    pub async fn retrieve(&self, query: &str, domain: &str) -> Result<Vec<ScoredChunk>> {
        self.retriever.retrieve(domain, query, self.n_results).await
    }

    /// Retrieval that treats an empty domain like a missing one
    async fn evidence(&self, question: &str, domain: &str) -> Result<Vec<ScoredChunk>> {
        let chunks = self.retrieve(question, domain).await?;
        if chunks.is_empty() {
            return Err(AppError::DomainNotFound {
                domain: domain.to_string(),
            });
        }
        Ok(chunks)
    }

    /// One blocking completion under the admission slot
    pub async fn generate_raw(
        &self,
        prompt: &str,
        context: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String> {
        let messages = prompts::messages(prompt, context);
        let budget = self.budget(&messages, max_tokens).await?;
        let _guard = self.slot.try_acquire()?;

        let start = Instant::now();
        let result = self.backend.generate(&messages, temperature, budget).await;
        metrics::record_generation(start.elapsed().as_secs_f64(), "blocking", result.is_ok());
        result
    }

    /// Retrieve, synthesize and wrap the answer
    #[instrument(skip(self))]
    pub async fn synthesize(&self, question: &str, domain: &str) -> Result<SynthesisResult> {
        let chunks = self.evidence(question, domain).await?;
        let context = prompts::format_context(&chunks);

        let synthesis = self
            .generate_raw(
                &prompts::synthesis(question),
                &context,
                self.inference.temperature,
                self.inference.max_new_tokens,
            )
            .await?;

        info!(chunks = chunks.len(), chars = synthesis.len(), "Synthesis complete");
        Ok(SynthesisResult::new(question, domain, synthesis, chunks))
    }

    /// Retrieve and start a streamed synthesis.
    ///
    /// Retrieval, budgeting, admission and connecting to the backend happen
    /// before this returns, so those failures surface as errors. Anything
    /// after that ends the stream with an `Error` event. The slot is taken
    /// right before the backend call and stays held until the stream
    /// finishes or is dropped.
    #[instrument(skip(self))]
    pub async fn synthesize_stream(&self, question: &str, domain: &str) -> Result<EventStream> {
        let chunks = self.evidence(question, domain).await?;
        let context = prompts::format_context(&chunks);

        let messages = prompts::messages(&prompts::synthesis(question), &context);
        let budget = self.budget(&messages, self.inference.max_new_tokens).await?;

        let guard = self.slot.try_acquire()?;
        let start = Instant::now();
        let tokens = match self
            .backend
            .generate_stream(&messages, self.inference.temperature, budget)
            .await
        {
            Ok(tokens) => tokens,
            Err(e) => {
                metrics::record_generation(start.elapsed().as_secs_f64(), "stream", false);
                return Err(e);
            }
        };

        let state = StreamState {
            sources: Some(chunks.iter().map(SourceSummary::from).collect()),
            tokens,
            guard: Some(guard),
            start,
        };
        Ok(stream::unfold(state, StreamState::next_event).boxed())
    }
}

struct StreamState {
    sources: Option<Vec<SourceSummary>>,
    tokens: TokenStream,
    /// `None` once a terminal event has been emitted
    guard: Option<SlotGuard>,
    start: Instant,
}

impl StreamState {
    async fn next_event(mut self) -> Option<(SynthesisEvent, Self)> {
        if let Some(sources) = self.sources.take() {
            return Some((SynthesisEvent::Sources(sources), self));
        }
        self.guard.as_ref()?;

        let event = match self.tokens.next().await {
            Some(Ok(token)) => SynthesisEvent::Chunk(token),
            Some(Err(e)) => {
                warn!(error = %e, "Stream failed mid-generation");
                self.finish(false);
                SynthesisEvent::Error(e.to_string())
            }
            None => {
                self.finish(true);
                SynthesisEvent::Done
            }
        };
        Some((event, self))
    }

    fn finish(&mut self, success: bool) {
        self.guard = None;
        metrics::record_generation(self.start.elapsed().as_secs_f64(), "stream", success);
    }
}
