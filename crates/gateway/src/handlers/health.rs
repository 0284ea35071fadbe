//! Health and domain listing handlers

use crate::AppState;
use axum::{extract::State, Json};
use opensynthesis_common::errors::Result;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub vllm_url: String,
    pub domains: Vec<String>,
}

/// Liveness plus backend target and known domains.
///
/// A vector store outage is reported as an empty domain list rather than a
/// failed probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let domains = match state.store.list_domains().await {
        Ok(domains) => domains,
        Err(e) => {
            tracing::warn!(error = %e, "Could not list domains for health check");
            Vec::new()
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        vllm_url: state.backend.endpoint(),
        domains,
    })
}

pub async fn domains(State(state): State<AppState>) -> Result<Json<Vec<String>>> {
    Ok(Json(state.store.list_domains().await?))
}

#[cfg(test)]
mod tests {
    use crate::testing::{get, send, test_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(test_state().await, get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["vllm_url"], "http://vllm.test:8000");
        assert_eq!(json["domains"], serde_json::json!(["psych"]));
    }

    #[tokio::test]
    async fn test_domains() {
        let (status, body) = send(test_state().await, get("/api/domains")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"["psych"]"#);
    }
}
