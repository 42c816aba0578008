//! Reply / reaction enrichment cache.
//!
//! The platform only sends the `mid` of a replied-to or reacted-to message.
//! Recent messages are kept here so handlers can see what the user refers to.

use crate::event::{Attachment, EventType, InboundEvent};
use moka::future::Cache;

/// Cached body of a message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedMessage {
    /// Message text.
    pub text: Option<String>,
    /// Message attachments.
    pub attachments: Vec<Attachment>,
}

/// Bounded `mid -> message` cache.
#[derive(Clone)]
pub struct MessageCache {
    cache: Cache<String, CachedMessage>,
}

impl MessageCache {
    /// Creates a cache holding at most `capacity` messages.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity),
        }
    }

    /// Store the body of message-like events that carry a `mid`.
    pub async fn remember(&self, event: &InboundEvent) {
        if !matches!(
            event.event_type(),
            EventType::Message | EventType::Attachments | EventType::MessageReply
        ) {
            return;
        }
        let Some(message) = &event.message else {
            return;
        };
        let Some(mid) = &message.mid else {
            return;
        };
        self.cache
            .insert(
                mid.clone(),
                CachedMessage {
                    text: message.text.clone(),
                    attachments: message.attachments.clone(),
                },
            )
            .await;
    }

    /// Fill reply and reaction targets from the cache.
    pub async fn enrich(&self, event: &mut InboundEvent) {
        if let Some(reply_to) = event.message.as_mut().and_then(|m| m.reply_to.as_mut()) {
            if let Some(target) = self.cache.get(&reply_to.mid).await {
                reply_to.text = target.text;
                reply_to.attachments = target.attachments;
            }
        }
        if let Some(reaction) = event.reaction.as_mut() {
            if let Some(target) = self.cache.get(&reaction.mid).await {
                reaction.text = target.text;
                reaction.attachments = target.attachments;
            }
        }
    }

    /// Look up a message by id.
    pub async fn get(&self, mid: &str) -> Option<CachedMessage> {
        self.cache.get(mid).await
    }
}
