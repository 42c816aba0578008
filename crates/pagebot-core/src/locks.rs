//! Per-user single-flight execution locks.
//!
//! A user may run at most one command and hold at most one postback at a
//! time. Acquisition is an atomic check-and-set on a [`DashMap`] entry and
//! returns an RAII [`LockGuard`]; the guard releases the lock on drop, also
//! when the handler future panics or is cancelled.

use crate::event::UserId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Which lock table to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Running command (or reply continuation).
    Command,
    /// Running postback.
    Postback,
}

impl LockKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Postback => "postback",
        }
    }
}

/// A held lock.
#[derive(Debug, Clone)]
pub struct LockEntry {
    /// Command name or postback payload holding the lock.
    pub label: String,
    /// When the lock was taken.
    pub acquired_at: Instant,
    token: u64,
}

impl LockEntry {
    /// Time since acquisition.
    #[must_use]
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

/// Returned when the user already holds a lock of the requested kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Busy {
    /// Label of the current holder.
    pub label: String,
    /// How long the holder has been running.
    pub held_for: Duration,
}

type LockTable = Arc<DashMap<UserId, LockEntry>>;

/// Lock tables for commands and postbacks.
#[derive(Debug, Default)]
pub struct ExecutionLocks {
    commands: LockTable,
    postbacks: LockTable,
    next_token: AtomicU64,
}

/// Releases its lock when dropped.
#[derive(Debug)]
pub struct LockGuard {
    table: LockTable,
    user: UserId,
    token: u64,
    kind: LockKind,
}

impl LockGuard {
    /// Owner of the lock.
    #[must_use]
    pub const fn user(&self) -> &UserId {
        &self.user
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Only remove the entry this guard created; a swept and re-acquired
        // lock belongs to someone else.
        let removed = self
            .table
            .remove_if(&self.user, |_, entry| entry.token == self.token);
        if removed.is_some() {
            debug!(user = %self.user, kind = self.kind.as_str(), "Lock released");
        }
    }
}

impl ExecutionLocks {
    /// Create empty lock tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: LockKind) -> &LockTable {
        match kind {
            LockKind::Command => &self.commands,
            LockKind::Postback => &self.postbacks,
        }
    }

    /// Try to take the `kind` lock for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`Busy`] describing the current holder if the lock is taken.
    pub fn try_acquire(
        &self,
        kind: LockKind,
        user: &UserId,
        label: &str,
    ) -> Result<LockGuard, Busy> {
        let table = self.table(kind);
        match table.entry(user.clone()) {
            Entry::Occupied(occupied) => {
                let holder = occupied.get();
                Err(Busy {
                    label: holder.label.clone(),
                    held_for: holder.held_for(),
                })
            }
            Entry::Vacant(vacant) => {
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                vacant.insert(LockEntry {
                    label: label.to_string(),
                    acquired_at: Instant::now(),
                    token,
                });
                debug!(user = %user, kind = kind.as_str(), label, "Lock acquired");
                Ok(LockGuard {
                    table: Arc::clone(table),
                    user: user.clone(),
                    token,
                    kind,
                })
            }
        }
    }

    /// Current holder of the `kind` lock for `user`.
    #[must_use]
    pub fn holder(&self, kind: LockKind, user: &UserId) -> Option<LockEntry> {
        self.table(kind).get(user).map(|entry| entry.value().clone())
    }

    /// Whether `user` holds a `kind` lock.
    #[must_use]
    pub fn is_locked(&self, kind: LockKind, user: &UserId) -> bool {
        self.table(kind).contains_key(user)
    }

    /// Forcefully drop the `kind` lock of `user`, returning what was held.
    pub fn release(&self, kind: LockKind, user: &UserId) -> Option<LockEntry> {
        self.table(kind).remove(user).map(|(_, entry)| entry)
    }

    /// All held locks of `kind`, oldest first.
    #[must_use]
    pub fn snapshot(&self, kind: LockKind) -> Vec<(UserId, LockEntry)> {
        let mut entries: Vec<_> = self
            .table(kind)
            .iter()
            .map(|item| (item.key().clone(), item.value().clone()))
            .collect();
        entries.sort_by_key(|(_, entry)| entry.acquired_at);
        entries
    }

    /// Drop locks of either kind held longer than `max_age`.
    ///
    /// Returns the number of locks removed.
    pub fn sweep_stale(&self, max_age: Duration) -> usize {
        let mut removed = 0;
        for kind in [LockKind::Command, LockKind::Postback] {
            self.table(kind).retain(|user, entry| {
                let stale = entry.held_for() > max_age;
                if stale {
                    warn!(
                        user = %user,
                        kind = kind.as_str(),
                        label = %entry.label,
                        held_secs = entry.held_for().as_secs(),
                        "Sweeping stale lock"
                    );
                    removed += 1;
                }
                !stale
            });
        }
        removed
    }
}
