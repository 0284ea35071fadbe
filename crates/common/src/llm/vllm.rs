//! vLLM (OpenAI-compatible) chat client

use super::sse::{SseDecoder, SseEvent};
use super::{ChatMessage, InferenceBackend, TokenStream};
use crate::config::{BackendConfig, InferenceConfig};
use crate::errors::{AppError, Result};
use crate::http::LazyClient;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub struct VllmClient {
    base_url: String,
    model: String,
    top_p: f32,
    repetition_penalty: f32,
    http: LazyClient,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: usize,
    top_p: f32,
    repetition_penalty: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelCard>,
}

#[derive(Deserialize)]
struct ModelCard {
    #[serde(default)]
    max_model_len: Option<usize>,
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
}

impl StreamState {
    fn absorb(&mut self, events: Vec<SseEvent>) {
        for event in events {
            match event {
                SseEvent::Token(token) => self.pending.push_back(token),
                SseEvent::Done => {
                    self.finished = true;
                    break;
                }
            }
        }
    }
}

impl VllmClient {
    pub fn new(backend: &BackendConfig, inference: &InferenceConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if !backend.api_key.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", backend.api_key)).map_err(|e| {
                AppError::Configuration {
                    message: format!("Invalid backend API key: {}", e),
                }
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            base_url: backend.resolved_base_url(),
            model: backend.model.clone(),
            top_p: inference.top_p,
            repetition_penalty: inference.repetition_penalty,
            http: LazyClient::with_headers(backend.timeout(), headers),
        })
    }

    fn request<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        temperature: f32,
        max_tokens: usize,
        stream: bool,
    ) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            messages,
            temperature,
            max_tokens,
            top_p: self.top_p,
            repetition_penalty: self.repetition_penalty,
            stream,
        }
    }

    async fn post_completion(&self, body: &CompletionRequest<'_>) -> Result<reqwest::Response> {
        let http = self.http.get().await?;
        let response = http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::backend(status, &text));
        }
        Ok(response)
    }
}

#[async_trait]
impl InferenceBackend for VllmClient {
    #[tracing::instrument(skip(self, messages), fields(model = %self.model))]
    async fn generate(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String> {
        let body = self.request(messages, temperature, max_tokens, false);
        let response = self.post_completion(&body).await?;
        let parsed: CompletionResponse = response.json().await?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    #[tracing::instrument(skip(self, messages), fields(model = %self.model))]
    async fn generate_stream(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<TokenStream> {
        let body = self.request(messages, temperature, max_tokens, true);
        let response = self.post_completion(&body).await?;

        let state = StreamState {
            bytes: response.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
        };

        let tokens = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(token) = state.pending.pop_front() {
                    return Some((Ok(token), state));
                }
                if state.finished {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        let events = state.decoder.push(&chunk);
                        state.absorb(events);
                    }
                    Some(Err(e)) => {
                        state.finished = true;
                        return Some((Err(AppError::from(e)), state));
                    }
                    None => {
                        let events = state.decoder.finish();
                        state.absorb(events);
                        state.finished = true;
                    }
                }
            }
        });

        Ok(tokens.boxed())
    }

    async fn max_context_length(&self) -> Result<usize> {
        let http = self.http.get().await?;
        let response = http.get(format!("{}/v1/models", self.base_url)).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::backend(status, &text));
        }

        let models: ModelList = response.json().await?;
        models
            .data
            .into_iter()
            .find_map(|m| m.max_model_len)
            .ok_or_else(|| AppError::Internal {
                message: "Backend did not report max_model_len".to_string(),
            })
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    async fn close(&self) {
        self.http.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> VllmClient {
        let mut backend = BackendConfig::default();
        backend.pod_id = "pod42".into();
        backend.api_key = "secret".into();
        VllmClient::new(&backend, &InferenceConfig::default()).unwrap()
    }

    #[test]
    fn test_endpoint_from_pod_id() {
        assert_eq!(client().endpoint(), "https://pod42-8000.proxy.runpod.net");
    }

    #[test]
    fn test_request_body_carries_sampling_params() {
        let client = client();
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let body = serde_json::to_value(client.request(&messages, 0.1, 2048, true)).unwrap();

        assert_eq!(body["model"], "opensynthesis/Qwen3-14B-heretic");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["max_tokens"], 2048);
        assert_eq!(body["stream"], true);
        assert!((body["top_p"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!((body["repetition_penalty"].as_f64().unwrap() - 1.1).abs() < 1e-6);
    }

    #[test]
    fn test_model_list_parsing() {
        let list: ModelList = serde_json::from_str(
            r#"{"object":"list","data":[{"id":"m","max_model_len":40960}]}"#,
        )
        .unwrap();
        assert_eq!(list.data[0].max_model_len, Some(40960));
    }
}
