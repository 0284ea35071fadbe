//! In-process fakes shared by the unit tests

use crate::admission::GenerationSlot;
use crate::synthesizer::Synthesizer;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use opensynthesis_common::config::AppConfig;
use opensynthesis_common::embeddings::HashEmbedder;
use opensynthesis_common::errors::{AppError, Result};
use opensynthesis_common::llm::{ChatMessage, InferenceBackend, TokenStream};
use opensynthesis_common::models::{Chunk, ChunkMetadata};
use opensynthesis_common::vectorstore::{MemoryVectorStore, VectorStore};
use opensynthesis_search::HybridRetriever;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct Call {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Scripted backend: blocking calls pop queued responses in order
pub struct FakeBackend {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Call>>,
    tokens: Vec<String>,
    fail_stream: bool,
    context_length: Option<usize>,
    context_queries: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            tokens: Vec::new(),
            fail_stream: false,
            context_length: Some(32768),
            context_queries: AtomicUsize::new(0),
        }
    }

    pub fn respond(self, text: &str) -> Self {
        self.responses.lock().unwrap().push_back(text.to_string());
        self
    }

    pub fn stream_tokens(mut self, tokens: &[&str]) -> Self {
        self.tokens = tokens.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn fail_stream(mut self) -> Self {
        self.fail_stream = true;
        self
    }

    /// `None` makes context-length discovery fail
    pub fn with_context_length(mut self, len: Option<usize>) -> Self {
        self.context_length = len;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn context_queries(&self) -> usize {
        self.context_queries.load(Ordering::SeqCst)
    }

    fn record(&self, messages: &[ChatMessage], temperature: f32, max_tokens: usize) {
        self.calls.lock().unwrap().push(Call {
            messages: messages.to_vec(),
            temperature,
            max_tokens,
        });
    }
}

#[async_trait]
impl InferenceBackend for FakeBackend {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String> {
        self.record(messages, temperature, max_tokens);
        Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<TokenStream> {
        self.record(messages, temperature, max_tokens);
        let mut items: Vec<Result<String>> = self.tokens.iter().cloned().map(Ok).collect();
        if self.fail_stream {
            items.push(Err(AppError::backend(503, "upstream went away")));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn max_context_length(&self) -> Result<usize> {
        self.context_queries.fetch_add(1, Ordering::SeqCst);
        self.context_length.ok_or_else(|| AppError::backend(500, "models endpoint unavailable"))
    }

    fn endpoint(&self) -> String {
        "http://fake-backend".to_string()
    }
}

pub fn memory_store() -> Arc<MemoryVectorStore> {
    Arc::new(MemoryVectorStore::new(Arc::new(HashEmbedder::new(128))))
}

pub fn synthesizer_over(store: Arc<dyn VectorStore>, backend: Arc<FakeBackend>) -> Synthesizer {
    Synthesizer::new(
        Arc::new(HybridRetriever::new(store)),
        backend,
        GenerationSlot::new(),
        &AppConfig::default(),
    )
}

/// Synthesizer over an empty store
pub fn synthesizer_with(backend: Arc<FakeBackend>) -> Synthesizer {
    synthesizer_over(memory_store(), backend)
}

/// Synthesizer over a store with a small `psych` domain
pub async fn seeded_synthesizer(backend: Arc<FakeBackend>) -> Synthesizer {
    let store = memory_store();
    let docs = [
        ("doc-1", "Davis AK", "2021", "10.1001/a", "Psilocybin therapy reduced depression scores in a randomized trial."),
        ("doc-2", "Carhart-Harris R", "2016", "10.1016/b", "Open-label psilocybin improved treatment-resistant depression."),
        ("doc-3", "Smith J", "2019", "", "Sleep deprivation impairs working memory in adults."),
    ];
    let chunks: Vec<Chunk> = docs
        .iter()
        .map(|(id, authors, year, doi, text)| {
            let mut meta = ChunkMetadata::new();
            meta.insert("authors".into(), authors.to_string());
            meta.insert("year".into(), year.to_string());
            meta.insert("doi".into(), doi.to_string());
            meta.insert("title".into(), format!("Paper {}", id));
            meta.insert("source_type".into(), "openalex".into());
            Chunk::new(*id, 0, *text).with_metadata(meta)
        })
        .collect();
    store.add("psych", &chunks).await.unwrap();

    synthesizer_over(store, backend)
}
