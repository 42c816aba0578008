//! Configuration and settings management
//!
//! Loads router settings from configuration files and environment variables.

use crate::event::UserId;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Default command prefix.
pub const DEFAULT_PREFIX: &str = "/";
/// Cooldown (seconds) applied to a postback payload after it was handled.
pub const DEFAULT_POSTBACK_COOLDOWN_SECS: u64 = 3;
/// Locks older than this (seconds) are considered leaked and swept.
pub const DEFAULT_STALE_LOCK_SECS: u64 = 300;
/// Interval (seconds) between sweeper runs.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
/// Lifetime (seconds) of a pending reply session.
pub const DEFAULT_REPLY_SESSION_TTL_SECS: u64 = 300;
/// Maximum number of messages kept for reply / reaction enrichment.
pub const DEFAULT_MESSAGE_CACHE_CAPACITY: u64 = 1000;

/// Build the layered configuration source shared by every settings struct.
///
/// Sources, later ones override earlier ones:
/// `config/default`, `config/{RUN_MODE}`, `config/local`, `APP__*` env vars,
/// then plain env vars (empty values ignored).
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Router settings: prefix, admins and admission-control tuning.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RouterSettings {
    /// Command prefix (e.g. `/`).
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Comma-separated list of admin user IDs.
    #[serde(rename = "admins", default)]
    pub admins_str: Option<String>,
    /// Start in maintenance mode.
    #[serde(default)]
    pub maintenance: bool,
    /// Send a "mark seen" sender action for every inbound event.
    #[serde(default)]
    pub mark_as_seen: bool,
    /// Process the page's own echo messages.
    #[serde(default)]
    pub self_listen: bool,
    /// Default postback cooldown in seconds.
    #[serde(default = "default_postback_cooldown")]
    pub postback_cooldown_secs: u64,
    /// Age in seconds after which a held lock is swept.
    #[serde(default = "default_stale_lock")]
    pub stale_lock_secs: u64,
    /// Sweeper interval in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Pending reply session lifetime in seconds.
    #[serde(default = "default_reply_ttl")]
    pub reply_session_ttl_secs: u64,
    /// Message cache capacity.
    #[serde(default = "default_cache_capacity")]
    pub message_cache_capacity: u64,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

const fn default_postback_cooldown() -> u64 {
    DEFAULT_POSTBACK_COOLDOWN_SECS
}

const fn default_stale_lock() -> u64 {
    DEFAULT_STALE_LOCK_SECS
}

const fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}

const fn default_reply_ttl() -> u64 {
    DEFAULT_REPLY_SESSION_TTL_SECS
}

const fn default_cache_capacity() -> u64 {
    DEFAULT_MESSAGE_CACHE_CAPACITY
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            admins_str: None,
            maintenance: false,
            mark_as_seen: false,
            self_listen: false,
            postback_cooldown_secs: DEFAULT_POSTBACK_COOLDOWN_SECS,
            stale_lock_secs: DEFAULT_STALE_LOCK_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            reply_session_ttl_secs: DEFAULT_REPLY_SESSION_TTL_SECS,
            message_cache_capacity: DEFAULT_MESSAGE_CACHE_CAPACITY,
        }
    }
}

impl RouterSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Returns the set of admin user IDs.
    #[must_use]
    pub fn admins(&self) -> HashSet<UserId> {
        self.admins_str
            .as_ref()
            .map(|s| {
                s.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                    .filter(|token| !token.is_empty())
                    .map(UserId::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Lock age after which the sweeper reclaims it.
    #[must_use]
    pub const fn stale_lock_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }

    /// Sweeper tick interval (never zero).
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Pending reply session lifetime.
    #[must_use]
    pub const fn reply_session_ttl(&self) -> Duration {
        Duration::from_secs(self.reply_session_ttl_secs)
    }
}
