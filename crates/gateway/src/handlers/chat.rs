//! Synthesis handlers

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use opensynthesis_common::{
    errors::{AppError, Result},
    models::SynthesisResult,
};
use opensynthesis_context::SynthesisEvent;
use serde::Deserialize;
use std::convert::Infallible;
use tracing::warn;
use validator::Validate;

/// Chat request
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 4000))]
    pub question: String,

    #[serde(default = "default_domain")]
    pub domain: String,

    /// Run the validation passes before responding (blocking endpoint only)
    #[serde(default)]
    pub run_validation: bool,
}

fn default_domain() -> String {
    "default".to_string()
}

impl ChatRequest {
    fn validated(self) -> Result<Self> {
        self.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
        })?;
        Ok(self)
    }
}

/// Retrieve and synthesize in one response
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<SynthesisResult>> {
    let request = request.validated()?;
    let result = state.synthesizer.synthesize(&request.question, &request.domain).await?;

    if !request.run_validation {
        return Ok(Json(result));
    }

    match state.validator.validate(result.clone()).await {
        Ok(validated) => Ok(Json(validated)),
        Err(e) => {
            warn!(error = %e, "Validation failed, returning unvalidated synthesis");
            Ok(Json(result))
        }
    }
}

/// Stream sources, tokens and a terminal event over SSE
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let request = request.validated()?;
    let events = state
        .synthesizer
        .synthesize_stream(&request.question, &request.domain)
        .await?;

    Ok(Sse::new(events.map(|event| Ok(to_sse(event)))).keep_alive(KeepAlive::default()))
}

fn to_sse(event: SynthesisEvent) -> Event {
    match event.data() {
        // SSE framing cannot carry carriage returns
        Ok(data) => Event::default().event(event.name()).data(data.replace('\r', "")),
        Err(e) => Event::default().event("error").data(e.to_string().replace('\r', "")),
    }
}
