//! Outbound messaging contract.
//!
//! The router never talks to the platform directly; handlers and the
//! dispatcher go through a [`Messenger`].

use crate::event::UserId;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while sending to the platform
#[derive(Debug, Error)]
pub enum MessengerError {
    /// Error during network communication
    #[error("Transport error: {0}")]
    Transport(String),
    /// Error returned by the platform API
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error body or message
        message: String,
    },
    /// Error during JSON serialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MessengerError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Serialization(_) => false,
        }
    }
}

/// Sender actions shown in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderAction {
    /// Mark the last message as seen.
    MarkSeen,
    /// Show the typing indicator.
    TypingOn,
    /// Hide the typing indicator.
    TypingOff,
}

impl SenderAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarkSeen => "mark_seen",
            Self::TypingOn => "typing_on",
            Self::TypingOff => "typing_off",
        }
    }
}

/// Interface for outbound messaging providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, recipient: &UserId, text: &str) -> Result<(), MessengerError>;

    /// Send a raw `message` object (templates, attachments, quick replies).
    async fn send_message(
        &self,
        recipient: &UserId,
        message: serde_json::Value,
    ) -> Result<(), MessengerError>;

    /// Send a sender action.
    async fn sender_action(
        &self,
        recipient: &UserId,
        action: SenderAction,
    ) -> Result<(), MessengerError>;
}
