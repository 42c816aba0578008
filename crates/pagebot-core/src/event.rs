//! Inbound webhook event model.
//!
//! Mirrors the JSON the platform posts to the webhook. Only the fields the
//! router looks at are typed; everything else is ignored on deserialization.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page-scoped user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap a raw id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Top-level webhook body.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookPayload {
    /// Subscription object, `"page"` for page events.
    pub object: String,
    /// Batched entries.
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

impl WebhookPayload {
    /// Consume the payload into its messaging events, in delivery order.
    #[must_use]
    pub fn into_events(self) -> Vec<InboundEvent> {
        self.entry
            .into_iter()
            .flat_map(|entry| entry.messaging)
            .collect()
    }
}

/// One webhook entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEntry {
    /// Page id.
    #[serde(default)]
    pub id: Option<String>,
    /// Entry time (ms since epoch).
    #[serde(default)]
    pub time: Option<i64>,
    /// Messaging events.
    #[serde(default)]
    pub messaging: Vec<InboundEvent>,
}

/// Sender or recipient of an event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Participant {
    /// Participant id.
    pub id: UserId,
}

/// Attachment as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Attachment {
    /// Attachment type (`image`, `video`, `audio`, `file`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw payload (usually carries a `url`).
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Reference to the message being replied to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReplyTo {
    /// Replied-to message id.
    pub mid: String,
    /// Text of the replied-to message, filled from the message cache.
    #[serde(default)]
    pub text: Option<String>,
    /// Attachments of the replied-to message, filled from the message cache.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Message body.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MessagePayload {
    /// Message id.
    #[serde(default)]
    pub mid: Option<String>,
    /// Message text.
    #[serde(default)]
    pub text: Option<String>,
    /// Attachments.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Set when the page itself sent the message.
    #[serde(default)]
    pub is_echo: bool,
    /// Present when the message replies to another one.
    #[serde(default)]
    pub reply_to: Option<ReplyTo>,
}

/// Button press.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostbackPayload {
    /// Button title.
    #[serde(default)]
    pub title: Option<String>,
    /// Developer-defined payload.
    pub payload: String,
    /// Message id of the postback.
    #[serde(default)]
    pub mid: Option<String>,
}

/// Reaction to a message.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReactionPayload {
    /// Id of the reacted-to message.
    pub mid: String,
    /// `react` or `unreact`.
    #[serde(default)]
    pub action: Option<String>,
    /// Reaction name.
    #[serde(default)]
    pub reaction: Option<String>,
    /// Reaction emoji.
    #[serde(default)]
    pub emoji: Option<String>,
    /// Text of the reacted-to message, filled from the message cache.
    #[serde(default)]
    pub text: Option<String>,
    /// Attachments of the reacted-to message, filled from the message cache.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A single messaging event.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InboundEvent {
    /// Who sent the event.
    pub sender: Participant,
    /// Who received it.
    pub recipient: Participant,
    /// Event time (ms since epoch).
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Message body.
    #[serde(default)]
    pub message: Option<MessagePayload>,
    /// Postback body.
    #[serde(default)]
    pub postback: Option<PostbackPayload>,
    /// Reaction body.
    #[serde(default)]
    pub reaction: Option<ReactionPayload>,
    /// Read receipt.
    #[serde(default)]
    pub read: Option<serde_json::Value>,
    /// Delivery receipt.
    #[serde(default)]
    pub delivery: Option<serde_json::Value>,
}

/// Classification of an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Plain text message.
    Message,
    /// Message replying to another message.
    MessageReply,
    /// Message carrying only attachments.
    Attachments,
    /// Reaction to a message.
    MessageReaction,
    /// Button press.
    Postback,
    /// Read receipt.
    Read,
    /// Delivery receipt.
    Delivery,
    /// Anything else.
    Unknown,
}

impl EventType {
    /// Wire-style name, used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::MessageReply => "message_reply",
            Self::Attachments => "attachments",
            Self::MessageReaction => "message_reaction",
            Self::Postback => "postback",
            Self::Read => "read",
            Self::Delivery => "delivery",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Head token and arguments of a text line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLine {
    /// First whitespace-separated token, as typed.
    pub head: String,
    /// Remaining tokens.
    pub args: Vec<String>,
}

impl CommandLine {
    /// Split a line on whitespace.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut words = text.split_whitespace().map(str::to_string);
        let head = words.next().unwrap_or_default();
        Self {
            head,
            args: words.collect(),
        }
    }

    /// All tokens including the head.
    #[must_use]
    pub fn words(&self) -> Vec<String> {
        if self.head.is_empty() {
            return Vec::new();
        }
        std::iter::once(self.head.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl InboundEvent {
    /// Classify the event.
    #[must_use]
    pub fn event_type(&self) -> EventType {
        if self.postback.is_some() {
            return EventType::Postback;
        }
        if self.reaction.is_some() {
            return EventType::MessageReaction;
        }
        if let Some(message) = &self.message {
            if message.reply_to.is_some() {
                return EventType::MessageReply;
            }
            if !message.attachments.is_empty() && message.text.is_none() {
                return EventType::Attachments;
            }
            return EventType::Message;
        }
        if self.read.is_some() {
            return EventType::Read;
        }
        if self.delivery.is_some() {
            return EventType::Delivery;
        }
        EventType::Unknown
    }

    /// Message text, else postback title, else empty.
    #[must_use]
    pub fn text(&self) -> &str {
        self.message
            .as_ref()
            .and_then(|m| m.text.as_deref())
            .or_else(|| self.postback.as_ref().and_then(|p| p.title.as_deref()))
            .unwrap_or("")
    }

    /// Split [`Self::text`] into head and args.
    #[must_use]
    pub fn command_line(&self) -> CommandLine {
        CommandLine::parse(self.text())
    }

    /// Postback payload, if this is a postback.
    #[must_use]
    pub fn postback_payload(&self) -> Option<&str> {
        self.postback.as_ref().map(|p| p.payload.as_str())
    }

    /// Message id of the message or reaction.
    #[must_use]
    pub fn mid(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.mid.as_deref())
            .or_else(|| self.reaction.as_ref().map(|r| r.mid.as_str()))
    }

    /// Whether the page itself sent this message.
    #[must_use]
    pub fn is_echo(&self) -> bool {
        self.message.as_ref().is_some_and(|m| m.is_echo)
    }

    /// For echoes the human end of the conversation is the recipient.
    pub fn normalize_echo(&mut self) {
        if self.is_echo() {
            self.sender = self.recipient.clone();
        }
    }

    /// Build a plain text message event (tests and tooling).
    #[must_use]
    pub fn text_message(sender: impl Into<UserId>, text: impl Into<String>) -> Self {
        Self {
            message: Some(MessagePayload {
                text: Some(text.into()),
                ..MessagePayload::default()
            }),
            ..Self::bare(sender.into())
        }
    }

    /// Build a postback event (tests and tooling).
    #[must_use]
    pub fn postback(sender: impl Into<UserId>, payload: impl Into<String>) -> Self {
        Self {
            postback: Some(PostbackPayload {
                title: None,
                payload: payload.into(),
                mid: None,
            }),
            ..Self::bare(sender.into())
        }
    }

    fn bare(sender: UserId) -> Self {
        Self {
            sender: Participant { id: sender },
            recipient: Participant {
                id: UserId::from("page"),
            },
            timestamp: None,
            message: None,
            postback: None,
            reaction: None,
            read: None,
            delivery: None,
        }
    }
}
