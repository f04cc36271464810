//! wabridge HTTP transport
//!
//! Axum server that receives WhatsApp webhook deliveries and hands them to the
//! orchestrator. Each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, json)`, so the mapping from
//! orchestration outcome to HTTP response is testable without a listener.
//!
//! Endpoints:
//! - GET  /         — liveness
//! - GET  /health   — version and live session count
//! - POST /webhook  — inbound WhatsApp webhook delivery
//! - POST /whatsapp/webhook — same handler, the callback path Meta apps
//!   are usually configured with
//!
//! The webhook subscription handshake and signature checks are not handled
//! here; deploy behind something that does them if required.

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use wabridge_core::{BridgeConfig, Outcome, WebhookPayload};

use crate::subsystems::orchestrator::MessageOrchestrator;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub orchestrator: Arc<MessageOrchestrator>,
    pub config: BridgeConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .route("/whatsapp/webhook", post(webhook_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("wabridge webhook listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

pub fn root_inner() -> serde_json::Value {
    serde_json::json!({ "status": "API is running!" })
}

pub fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "sessions": state.orchestrator.sessions().len(),
        }),
    )
}

/// Parse a raw webhook body and run it through the orchestrator.
///
/// Bodies that are not JSON at all are rejected with 400. JSON without an
/// `entry[0].changes[0].value` is acknowledged with 200 so the sender does not
/// keep redelivering it, and so is an event with missing or empty fields,
/// which the orchestrator reports as idle. Orchestration failures become a
/// bare 500.
pub async fn webhook_inner(
    orchestrator: &MessageOrchestrator,
    body: &[u8],
) -> (StatusCode, serde_json::Value) {
    let payload: WebhookPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, "Webhook body is not a valid payload");
            return (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "status": "error", "error": "invalid payload" }),
            );
        }
    };

    let event = match payload.into_first_event() {
        Some(event) => event,
        None => {
            tracing::info!("Webhook without change value; nothing to do");
            return (StatusCode::OK, serde_json::json!({ "status": "ok" }));
        }
    };

    match orchestrator.process(event).await {
        Ok(outcome) => (StatusCode::OK, outcome_body(&outcome)),
        Err(e) => {
            tracing::error!(error = %e, "Webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "status": "error", "error": "internal error" }),
            )
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn root_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(root_inner()))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state);
    (status, Json(body))
}

pub async fn webhook_handler(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> impl IntoResponse {
    let (status, body) = webhook_inner(&state.orchestrator, &body).await;
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

pub fn outcome_body(outcome: &Outcome) -> serde_json::Value {
    let status = match outcome {
        Outcome::Idle { .. } => "ok",
        Outcome::Replied { .. } => "processed",
        Outcome::Ignored { .. } => "ignored",
    };
    serde_json::json!({
        "status": status,
        "result": outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wabridge_core::{MessageKind, SendReceipt};

    #[test]
    fn test_root_inner() {
        assert_eq!(root_inner()["status"], "API is running!");
    }

    #[test]
    fn test_outcome_body_idle() {
        let body = outcome_body(&Outcome::idle("event has no messages"));
        assert_eq!(body["status"], "ok");
        assert_eq!(body["result"]["outcome"], "idle");
        assert_eq!(body["result"]["reason"], "event has no messages");
    }

    #[test]
    fn test_outcome_body_replied() {
        let body = outcome_body(&Outcome::Replied {
            sender_id: "A".to_string(),
            kind: MessageKind::Audio,
            receipt: SendReceipt {
                message_id: Some("wamid.1".to_string()),
            },
        });
        assert_eq!(body["status"], "processed");
        assert_eq!(body["result"]["kind"], "audio");
        assert_eq!(body["result"]["receipt"]["message_id"], "wamid.1");
    }

    #[test]
    fn test_outcome_body_ignored() {
        let body = outcome_body(&Outcome::Ignored {
            sender_id: "A".to_string(),
            kind: "sticker".to_string(),
        });
        assert_eq!(body["status"], "ignored");
        assert_eq!(body["result"]["kind"], "sticker");
    }
}
