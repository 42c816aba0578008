//! Pending reply sessions.
//!
//! A command that presented choices registers itself as the target of the
//! user's next reply. Sessions expire on their own after the configured TTL.

use crate::event::UserId;
use moka::future::Cache;
use std::time::Duration;
use tracing::debug;

const MAX_SESSIONS: u64 = 10_000;

/// `user -> command` map with automatic expiry.
#[derive(Clone)]
pub struct ReplySessions {
    cache: Cache<UserId, String>,
}

impl std::fmt::Debug for ReplySessions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplySessions")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

impl ReplySessions {
    /// Creates a session store whose entries live for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_SESSIONS)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    /// Route the next reply of `user` to `command`, replacing any pending session.
    pub async fn expect(&self, user: &UserId, command: &str) {
        debug!(user = %user, command, "Awaiting reply");
        self.cache.insert(user.clone(), command.to_lowercase()).await;
    }

    /// Consume the pending session of `user`.
    pub async fn take(&self, user: &UserId) -> Option<String> {
        self.cache.remove(user).await
    }

    /// Peek at the pending session of `user` without consuming it.
    pub async fn pending(&self, user: &UserId) -> Option<String> {
        self.cache.get(user).await
    }

    /// Drop the pending session of `user`.
    pub async fn cancel(&self, user: &UserId) {
        self.cache.invalidate(user).await;
    }

    /// Approximate number of pending sessions.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Whether no session is pending (approximate).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
