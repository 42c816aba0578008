//! Per-user command and postback cooldowns.

use crate::event::UserId;
use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Longest cooldown that can be scheduled (one year); larger requests are clamped.
pub const MAX_COOLDOWN_SECS: u64 = 365 * 86_400;

/// Returned while a cooldown is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownActive {
    /// Time left before the action is allowed again.
    pub remaining: Duration,
}

impl CooldownActive {
    /// Remaining time rounded up to whole seconds (at least 1).
    #[must_use]
    pub fn remaining_secs(&self) -> u64 {
        let millis = self.remaining.as_millis();
        let secs = millis.div_ceil(1000);
        u64::try_from(secs).unwrap_or(u64::MAX).max(1)
    }
}

/// Snapshot of a command cooldown entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownEntry {
    /// User on cooldown.
    pub user: UserId,
    /// Command or payload.
    pub label: String,
    /// Time since the command was last used.
    pub since: Duration,
}

/// Tracks last command use and postback expiry per user.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    commands: DashMap<(UserId, String), Instant>,
    postbacks: DashMap<(UserId, String), Instant>,
}

impl CooldownTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `user` may run `command` with a `cooldown_secs` window.
    ///
    /// Admins and zero-length windows always pass.
    ///
    /// # Errors
    ///
    /// Returns [`CooldownActive`] while the window since the last use is open.
    pub fn check_command(
        &self,
        user: &UserId,
        command: &str,
        cooldown_secs: u64,
        is_admin: bool,
    ) -> Result<(), CooldownActive> {
        if cooldown_secs == 0 || is_admin {
            return Ok(());
        }
        let window = Duration::from_secs(cooldown_secs);
        let key = (user.clone(), command.to_string());
        let Some(last_used) = self.commands.get(&key).map(|entry| *entry.value()) else {
            return Ok(());
        };
        let elapsed = last_used.elapsed();
        if elapsed < window {
            return Err(CooldownActive {
                remaining: window - elapsed,
            });
        }
        Ok(())
    }

    /// Record a command use. Admin uses are not recorded.
    pub fn record_command(&self, user: &UserId, command: &str, is_admin: bool) {
        if is_admin {
            return;
        }
        self.commands
            .insert((user.clone(), command.to_string()), Instant::now());
    }

    /// Check whether `user` may press a button with `payload`.
    ///
    /// # Errors
    ///
    /// Returns [`CooldownActive`] until the payload cooldown expires.
    pub fn check_postback(&self, user: &UserId, payload: &str) -> Result<(), CooldownActive> {
        let key = (user.clone(), payload.to_string());
        let Some(expires_at) = self.postbacks.get(&key).map(|entry| *entry.value()) else {
            return Ok(());
        };
        let now = Instant::now();
        if now < expires_at {
            return Err(CooldownActive {
                remaining: expires_at - now,
            });
        }
        Ok(())
    }

    /// Start a `secs` cooldown on `payload` for `user`; 0 clears it.
    pub fn set_postback(&self, user: &UserId, payload: &str, secs: u64) {
        let key = (user.clone(), payload.to_string());
        if secs == 0 {
            self.postbacks.remove(&key);
            return;
        }
        let now = Instant::now();
        let window = Duration::from_secs(secs.min(MAX_COOLDOWN_SECS));
        let expires_at = now.checked_add(window).unwrap_or(now);
        self.postbacks.insert(key, expires_at);
    }

    /// Forget every cooldown of `user`.
    pub fn clear_user(&self, user: &UserId) {
        self.commands.retain(|(owner, _), _| owner != user);
        self.postbacks.retain(|(owner, _), _| owner != user);
    }

    /// Drop command entries older than `longest_window` and expired postbacks.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, longest_window: Duration) -> usize {
        let before = self.commands.len() + self.postbacks.len();
        let now = Instant::now();
        self.commands
            .retain(|_, last_used| now.duration_since(*last_used) < longest_window);
        self.postbacks.retain(|_, expires_at| now < *expires_at);
        before.saturating_sub(self.commands.len() + self.postbacks.len())
    }

    /// Recorded command uses, most recent first.
    #[must_use]
    pub fn command_entries(&self) -> Vec<CooldownEntry> {
        let mut entries: Vec<_> = self
            .commands
            .iter()
            .map(|item| CooldownEntry {
                user: item.key().0.clone(),
                label: item.key().1.clone(),
                since: item.value().elapsed(),
            })
            .collect();
        entries.sort_by_key(|entry| entry.since);
        entries
    }

    /// Number of postback cooldowns still running.
    #[must_use]
    pub fn active_postbacks(&self) -> usize {
        let now = Instant::now();
        self.postbacks
            .iter()
            .filter(|item| now < *item.value())
            .count()
    }
}
