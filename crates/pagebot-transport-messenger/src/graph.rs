//! Graph Send API client.

use crate::config::{
    MessengerSettings, SEND_API_INITIAL_BACKOFF_MS, SEND_API_MAX_BACKOFF_MS, SEND_API_MAX_RETRIES,
};
use async_trait::async_trait;
use pagebot_core::utils::{split_long_message, truncate_str, MESSAGE_LIMIT};
use pagebot_core::{Messenger, MessengerError, SenderAction, UserId};
use reqwest::Client as HttpClient;
use serde_json::{json, Value};
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

/// Longest error body kept in a [`MessengerError::Api`].
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Request body for a plain text message.
#[must_use]
pub fn text_body(recipient: &UserId, text: &str) -> Value {
    message_body(recipient, json!({ "text": text }))
}

/// Request body for an arbitrary `message` object.
#[must_use]
pub fn message_body(recipient: &UserId, message: Value) -> Value {
    json!({
        "recipient": { "id": recipient.as_str() },
        "message": message,
        "messaging_type": "RESPONSE",
    })
}

/// Request body for a sender action.
#[must_use]
pub fn action_body(recipient: &UserId, action: SenderAction) -> Value {
    json!({
        "recipient": { "id": recipient.as_str() },
        "sender_action": action.as_str(),
    })
}

/// [`Messenger`] backed by the Graph Send API.
pub struct GraphMessenger {
    http_client: HttpClient,
    url: String,
    access_token: String,
    initial_backoff: Duration,
}

impl GraphMessenger {
    /// Creates a client for the page configured in `settings`.
    #[must_use]
    pub fn new(settings: &MessengerSettings) -> Self {
        let http_client = HttpClient::builder()
            .timeout(settings.request_timeout())
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self {
            http_client,
            url: settings.send_api_url(),
            access_token: settings.page_access_token.clone(),
            initial_backoff: Duration::from_millis(SEND_API_INITIAL_BACKOFF_MS),
        }
    }

    /// Overrides the first retry delay.
    #[must_use]
    pub const fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    async fn post_once(&self, body: &Value) -> Result<(), MessengerError> {
        let response = self
            .http_client
            .post(&self.url)
            .query(&[("access_token", self.access_token.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| MessengerError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let error_text = response.text().await.unwrap_or_default();
        Err(MessengerError::Api {
            status: status.as_u16(),
            message: truncate_str(error_text, MAX_ERROR_BODY_CHARS),
        })
    }

    async fn post(&self, body: Value) -> Result<(), MessengerError> {
        // 2^n * factor: initial, 2x, 4x ... capped, each scaled by jitter.
        let factor = u64::try_from(self.initial_backoff.as_millis() / 2)
            .unwrap_or(SEND_API_MAX_BACKOFF_MS)
            .max(1);
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(factor)
            .max_delay(Duration::from_millis(SEND_API_MAX_BACKOFF_MS))
            .map(jitter)
            .take(SEND_API_MAX_RETRIES);

        RetryIf::spawn(
            strategy,
            || self.post_once(&body),
            |e: &MessengerError| {
                let transient = e.is_transient();
                if transient {
                    debug!(error = %e, "Send API call failed, retrying");
                }
                transient
            },
        )
        .await
        .map_err(|e| {
            warn!(error = %e, "Send API call failed");
            e
        })
    }
}

#[async_trait]
impl Messenger for GraphMessenger {
    async fn send_text(&self, recipient: &UserId, text: &str) -> Result<(), MessengerError> {
        for part in split_long_message(text, MESSAGE_LIMIT) {
            self.post(text_body(recipient, &part)).await?;
        }
        Ok(())
    }

    async fn send_message(
        &self,
        recipient: &UserId,
        message: Value,
    ) -> Result<(), MessengerError> {
        self.post(message_body(recipient, message)).await
    }

    async fn sender_action(
        &self,
        recipient: &UserId,
        action: SenderAction,
    ) -> Result<(), MessengerError> {
        self.post(action_body(recipient, action)).await
    }
}
