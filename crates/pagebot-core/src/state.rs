//! Runtime bot state.
//!
//! Everything the admin control command can change at runtime lives here:
//! maintenance mode, blacklist, disabled handlers, cooldown policy and the
//! command prefix. Usage counters feed `status` and `ac stats`.

use crate::config::RouterSettings;
use crate::event::UserId;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::info;

#[derive(Debug, Default)]
struct CooldownPolicy {
    global: Option<u64>,
    overrides: HashMap<String, u64>,
}

/// Shared mutable bot state.
#[derive(Debug)]
pub struct BotState {
    maintenance: AtomicBool,
    prefix: RwLock<String>,
    active_users: RwLock<HashSet<UserId>>,
    usage: RwLock<HashMap<String, HashSet<UserId>>>,
    disabled_commands: RwLock<HashSet<String>>,
    disabled_events: RwLock<HashSet<String>>,
    blacklist: RwLock<HashSet<UserId>>,
    cooldowns: RwLock<CooldownPolicy>,
    last_restart: RwLock<Option<DateTime<Utc>>>,
    started_at: Instant,
    started_at_utc: DateTime<Utc>,
}

/// Usage count of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandUsage {
    /// Command name.
    pub command: String,
    /// Number of distinct users that ran it.
    pub users: usize,
}

impl BotState {
    /// Initial state from settings.
    #[must_use]
    pub fn new(settings: &RouterSettings) -> Self {
        Self {
            maintenance: AtomicBool::new(settings.maintenance),
            prefix: RwLock::new(settings.prefix.clone()),
            active_users: RwLock::default(),
            usage: RwLock::default(),
            disabled_commands: RwLock::default(),
            disabled_events: RwLock::default(),
            blacklist: RwLock::default(),
            cooldowns: RwLock::default(),
            last_restart: RwLock::new(None),
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }

    /// Whether maintenance mode is on.
    #[must_use]
    pub fn is_maintenance(&self) -> bool {
        self.maintenance.load(Ordering::Acquire)
    }

    /// Toggle maintenance mode, returning the previous value.
    pub fn set_maintenance(&self, enabled: bool) -> bool {
        let previous = self.maintenance.swap(enabled, Ordering::AcqRel);
        if previous != enabled {
            info!(enabled, "Maintenance mode changed");
        }
        previous
    }

    /// Current command prefix.
    pub async fn prefix(&self) -> String {
        self.prefix.read().await.clone()
    }

    /// Replace the command prefix.
    pub async fn set_prefix(&self, prefix: &str) {
        *self.prefix.write().await = prefix.to_string();
        info!(prefix, "Command prefix changed");
    }

    /// Record `user` as active.
    pub async fn mark_active(&self, user: &UserId) {
        let known = self.active_users.read().await.contains(user);
        if !known {
            self.active_users.write().await.insert(user.clone());
        }
    }

    /// Active users, sorted.
    pub async fn active_users(&self) -> Vec<UserId> {
        let mut users: Vec<_> = self.active_users.read().await.iter().cloned().collect();
        users.sort();
        users
    }

    /// Number of distinct active users since start or last restart.
    pub async fn active_user_count(&self) -> usize {
        self.active_users.read().await.len()
    }

    /// Record that `user` ran `command`.
    pub async fn track_usage(&self, command: &str, user: &UserId) {
        self.usage
            .write()
            .await
            .entry(command.to_string())
            .or_default()
            .insert(user.clone());
    }

    /// Sum of distinct users over all commands.
    pub async fn total_usage(&self) -> usize {
        self.usage.read().await.values().map(HashSet::len).sum()
    }

    /// Usage per command, most used first, ties by name.
    pub async fn usage_stats(&self) -> Vec<CommandUsage> {
        let mut stats: Vec<_> = self
            .usage
            .read()
            .await
            .iter()
            .map(|(command, users)| CommandUsage {
                command: command.clone(),
                users: users.len(),
            })
            .collect();
        stats.sort_by(|a, b| b.users.cmp(&a.users).then_with(|| a.command.cmp(&b.command)));
        stats
    }

    /// Whether `user` is blacklisted.
    pub async fn is_blacklisted(&self, user: &UserId) -> bool {
        self.blacklist.read().await.contains(user)
    }

    /// Add `user` to the blacklist. Returns `false` if already listed.
    pub async fn blacklist_add(&self, user: &UserId) -> bool {
        self.blacklist.write().await.insert(user.clone())
    }

    /// Remove `user` from the blacklist. Returns `false` if not listed.
    pub async fn blacklist_remove(&self, user: &UserId) -> bool {
        self.blacklist.write().await.remove(user)
    }

    /// Blacklisted users, sorted.
    pub async fn blacklisted(&self) -> Vec<UserId> {
        let mut users: Vec<_> = self.blacklist.read().await.iter().cloned().collect();
        users.sort();
        users
    }

    /// Whether `command` is disabled.
    pub async fn is_command_disabled(&self, command: &str) -> bool {
        self.disabled_commands
            .read()
            .await
            .contains(&command.to_lowercase())
    }

    /// Disable or enable `command`. Returns `false` if nothing changed.
    pub async fn set_command_disabled(&self, command: &str, disabled: bool) -> bool {
        let mut set = self.disabled_commands.write().await;
        let name = command.to_lowercase();
        if disabled {
            set.insert(name)
        } else {
            set.remove(&name)
        }
    }

    /// Disabled commands, sorted.
    pub async fn disabled_commands(&self) -> Vec<String> {
        sorted(&*self.disabled_commands.read().await)
    }

    /// Whether the event handler `key` is disabled.
    pub async fn is_event_disabled(&self, key: &str) -> bool {
        self.disabled_events
            .read()
            .await
            .contains(&key.to_lowercase())
    }

    /// Disable or enable event handler `key`. Returns `false` if nothing changed.
    pub async fn set_event_disabled(&self, key: &str, disabled: bool) -> bool {
        let mut set = self.disabled_events.write().await;
        let key = key.to_lowercase();
        if disabled {
            set.insert(key)
        } else {
            set.remove(&key)
        }
    }

    /// Disabled event handlers, sorted.
    pub async fn disabled_events(&self) -> Vec<String> {
        sorted(&*self.disabled_events.read().await)
    }

    /// Cooldown that applies to `command`: override, else global, else `default_secs`.
    pub async fn effective_cooldown(&self, command: &str, default_secs: u64) -> u64 {
        let policy = self.cooldowns.read().await;
        policy
            .overrides
            .get(&command.to_lowercase())
            .copied()
            .or(policy.global)
            .unwrap_or(default_secs)
    }

    /// Override the cooldown of one command; 0 restores its default.
    pub async fn set_cooldown_override(&self, command: &str, secs: u64) {
        let mut policy = self.cooldowns.write().await;
        let name = command.to_lowercase();
        if secs == 0 {
            policy.overrides.remove(&name);
        } else {
            policy.overrides.insert(name, secs);
        }
    }

    /// Set the global cooldown and drop per-command overrides; 0 restores defaults.
    pub async fn set_global_cooldown(&self, secs: u64) {
        let mut policy = self.cooldowns.write().await;
        policy.overrides.clear();
        policy.global = (secs > 0).then_some(secs);
    }

    /// Current global cooldown.
    pub async fn global_cooldown(&self) -> Option<u64> {
        self.cooldowns.read().await.global
    }

    /// Per-command overrides, sorted by name.
    pub async fn cooldown_overrides(&self) -> Vec<(String, u64)> {
        let mut overrides: Vec<_> = self
            .cooldowns
            .read()
            .await
            .overrides
            .iter()
            .map(|(name, secs)| (name.clone(), *secs))
            .collect();
        overrides.sort();
        overrides
    }

    /// Longest configured cooldown window, at least `floor_secs`.
    pub async fn longest_cooldown(&self, floor_secs: u64) -> Duration {
        let policy = self.cooldowns.read().await;
        let secs = policy
            .overrides
            .values()
            .copied()
            .chain(policy.global)
            .fold(floor_secs, u64::max);
        Duration::from_secs(secs)
    }

    /// Clear usage statistics and active users and stamp the restart time.
    pub async fn simulate_restart(&self) -> DateTime<Utc> {
        self.usage.write().await.clear();
        self.active_users.write().await.clear();
        let now = Utc::now();
        *self.last_restart.write().await = Some(now);
        info!("Simulated restart, usage statistics cleared");
        now
    }

    /// Time of the last simulated restart.
    pub async fn last_restart(&self) -> Option<DateTime<Utc>> {
        *self.last_restart.read().await
    }

    /// Time since the state was created.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Wall-clock start time.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at_utc
    }
}

fn sorted(set: &HashSet<String>) -> Vec<String> {
    let mut items: Vec<_> = set.iter().cloned().collect();
    items.sort();
    items
}
