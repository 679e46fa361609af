//! HTTP front door — webhook intake, health, and the recent-drafts feed.
//!
//! The webhook endpoint answers the push channel's validation handshake
//! synchronously (`validationToken` echoed as text/plain) — validation
//! requests never enter the pipeline. Real notifications are acknowledged
//! immediately and processed on spawned tasks; the guard serializes
//! concurrent runs per message id.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::pipeline::orchestrator::Orchestrator;
use crate::pipeline::types::NotificationEnvelope;
use crate::records::DraftLog;

/// Shared state across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub records: Arc<DraftLog>,
}

/// Build the router.
pub fn routes(orchestrator: Arc<Orchestrator>, records: Arc<DraftLog>) -> Router {
    let state = AppState {
        orchestrator,
        records,
    };

    Router::new()
        .route("/webhook", get(webhook).post(webhook))
        .route("/health", get(health))
        .route("/ui/recent-drafts", get(recent_drafts))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct WebhookQuery {
    #[serde(rename = "validationToken")]
    validation_token: Option<String>,
}

async fn webhook(
    State(state): State<AppState>,
    Query(query): Query<WebhookQuery>,
    body: Bytes,
) -> Response {
    // Subscription validation handshake: echo the token, bypass the pipeline.
    if let Some(token) = query.validation_token {
        info!("Validation handshake received");
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            token,
        )
            .into_response();
    }

    if body.is_empty() {
        return Json(serde_json::json!({ "status": "webhook endpoint active" })).into_response();
    }

    let envelope: NotificationEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed notification payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "status": "malformed payload" })),
            )
                .into_response();
        }
    };

    debug!(count = envelope.value.len(), "Notification batch received");

    // Acknowledge fast: the push channel retries on slow responses, and
    // the guard already makes redelivery harmless.
    for notification in envelope.value {
        let orchestrator = Arc::clone(&state.orchestrator);
        tokio::spawn(async move {
            orchestrator.handle_notification(&notification).await;
        });
    }

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted" })),
    )
        .into_response()
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "draft-assist",
        "recent_drafts": state.records.len().await,
    }))
}

async fn recent_drafts(State(state): State<AppState>) -> impl IntoResponse {
    let items = state.records.recent().await;
    Json(serde_json::json!({ "items": items }))
}
