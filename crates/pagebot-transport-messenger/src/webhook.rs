//! Webhook HTTP surface.
//!
//! `GET /webhook` answers the subscription handshake, `POST /webhook`
//! accepts event batches and hands every event to the dispatcher on its own
//! task so the platform gets its 200 without waiting on handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pagebot_core::{Dispatcher, WebhookPayload};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    /// Event router.
    pub dispatcher: Dispatcher,
    /// Token expected in the verification handshake.
    pub verify_token: Arc<str>,
}

impl WebhookState {
    /// Bundle a dispatcher with the configured verify token.
    #[must_use]
    pub fn new(dispatcher: Dispatcher, verify_token: &str) -> Self {
        Self {
            dispatcher,
            verify_token: Arc::from(verify_token),
        }
    }
}

/// Query parameters of the verification handshake.
#[derive(Debug, Deserialize)]
struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Build the webhook router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn verify(State(state): State<WebhookState>, Query(query): Query<VerifyQuery>) -> Response {
    let token_ok = !state.verify_token.is_empty()
        && query.verify_token.as_deref() == Some(&*state.verify_token);
    match (query.mode.as_deref(), query.challenge) {
        (Some("subscribe"), Some(challenge)) if token_ok => {
            info!("Webhook verified");
            (StatusCode::OK, challenge).into_response()
        }
        _ => {
            warn!(mode = ?query.mode, "Webhook verification rejected");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

async fn receive(
    State(state): State<WebhookState>,
    Json(payload): Json<WebhookPayload>,
) -> StatusCode {
    if payload.object != "page" {
        debug!(object = %payload.object, "Ignoring non-page webhook");
        return StatusCode::NOT_FOUND;
    }

    let messages = &state.dispatcher.services().messages;
    for mut event in payload.into_events() {
        // Remember before enriching so a reply later in the batch can see it.
        messages.remember(&event).await;
        messages.enrich(&mut event).await;

        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.dispatch(event).await;
            debug!(?outcome, "Event dispatched");
        });
    }
    StatusCode::OK
}

async fn healthz() -> &'static str {
    "ok"
}
