//! Handler contracts and execution context.
//!
//! Commands are addressed by name from a text message; event handlers see
//! every message-like event that no command claimed. Both may claim button
//! presses through `on_postback`.

use crate::config::RouterSettings;
use crate::cooldown::CooldownTracker;
use crate::event::{InboundEvent, UserId};
use crate::locks::ExecutionLocks;
use crate::logging::LogControl;
use crate::message_cache::MessageCache;
use crate::messenger::{Messenger, MessengerError, SenderAction};
use crate::registry::HandlerRegistry;
use crate::replies::ReplySessions;
use crate::state::BotState;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by handlers
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Sending a response failed
    #[error("Messenger error: {0}")]
    Messenger(#[from] MessengerError),
    /// The user supplied arguments the handler cannot work with
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// A third-party service the handler depends on failed
    #[error("Upstream error: {0}")]
    Upstream(String),
    /// The handler panicked
    #[error("Handler panicked: {0}")]
    Panicked(String),
    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Static description of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Name the user types (matched case-insensitively).
    pub name: String,
    /// One-line description shown by `help`.
    pub description: String,
    /// Author credit.
    pub author: String,
    /// Version string.
    pub version: String,
    /// Help category.
    pub category: String,
    /// Whether the command must be typed with the prefix.
    pub use_prefix: bool,
    /// Restrict to admins.
    pub admin_only: bool,
    /// Default per-user cooldown in seconds (0 disables).
    pub cooldown_secs: u64,
}

impl CommandSpec {
    /// New spec with defaults: prefixed, open to everyone, no cooldown.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            author: String::new(),
            version: "1.0.0".to_string(),
            category: "general".to_string(),
            use_prefix: true,
            admin_only: false,
            cooldown_secs: 0,
        }
    }

    /// Set the author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set the version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the help category.
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Match the command without a prefix.
    #[must_use]
    pub const fn without_prefix(mut self) -> Self {
        self.use_prefix = false;
        self
    }

    /// Restrict to admins.
    #[must_use]
    pub const fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    /// Set the default cooldown.
    #[must_use]
    pub const fn cooldown(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }
}

/// Static description of an event handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    /// Registry key.
    pub key: String,
    /// Display name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Author credit.
    pub author: String,
    /// Also run for the page's own echo messages.
    pub self_listen: bool,
}

impl EventSpec {
    /// New spec that ignores echoes.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: description.into(),
            author: String::new(),
            self_listen: false,
        }
    }

    /// Set the author.
    #[must_use]
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Run for echo messages too.
    #[must_use]
    pub const fn self_listen(mut self) -> Self {
        self.self_listen = true;
        self
    }
}

/// Result of offering a postback to a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostbackOutcome {
    /// Not this handler's payload.
    Ignored,
    /// Claimed; optionally with a payload cooldown overriding the default.
    Handled {
        /// Cooldown in seconds for this payload.
        cooldown_secs: Option<u64>,
    },
}

impl PostbackOutcome {
    /// Claimed with the default cooldown.
    pub const HANDLED: Self = Self::Handled {
        cooldown_secs: None,
    };
}

/// A named command.
#[async_trait]
pub trait Command: Send + Sync {
    /// Static description.
    fn spec(&self) -> &CommandSpec;

    /// Run the command.
    async fn run(&self, ctx: &HandlerContext<'_>) -> Result<(), HandlerError>;

    /// Offer a postback payload.
    async fn on_postback(
        &self,
        _ctx: &HandlerContext<'_>,
        _payload: &str,
    ) -> Result<PostbackOutcome, HandlerError> {
        Ok(PostbackOutcome::Ignored)
    }

    /// Continue after the user answered a prompt armed with [`HandlerContext::expect_reply`].
    async fn on_reply(&self, _ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }
}

/// A handler that observes events no command claimed.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Static description.
    fn spec(&self) -> &EventSpec;

    /// Handle a message-like event.
    async fn run(&self, _ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Offer a postback payload.
    async fn on_postback(
        &self,
        _ctx: &HandlerContext<'_>,
        _payload: &str,
    ) -> Result<PostbackOutcome, HandlerError> {
        Ok(PostbackOutcome::Ignored)
    }
}

/// Shared services available to the dispatcher and every handler.
#[derive(Clone)]
pub struct Services {
    /// Outbound messaging.
    pub messenger: Arc<dyn Messenger>,
    /// Runtime state.
    pub state: Arc<BotState>,
    /// Single-flight locks.
    pub locks: Arc<ExecutionLocks>,
    /// Cooldown bookkeeping.
    pub cooldowns: Arc<CooldownTracker>,
    /// Pending reply sessions.
    pub replies: ReplySessions,
    /// Recent message bodies.
    pub messages: MessageCache,
    /// Router settings.
    pub settings: Arc<RouterSettings>,
    /// Configured admins.
    pub admins: Arc<HashSet<UserId>>,
    /// Debug logging switch, when the process installed one.
    pub logs: Option<Arc<dyn LogControl>>,
}

impl Services {
    /// Wire fresh state around `messenger`.
    #[must_use]
    pub fn new(messenger: Arc<dyn Messenger>, settings: RouterSettings) -> Self {
        Self {
            messenger,
            state: Arc::new(BotState::new(&settings)),
            locks: Arc::new(ExecutionLocks::new()),
            cooldowns: Arc::new(CooldownTracker::new()),
            replies: ReplySessions::new(settings.reply_session_ttl()),
            messages: MessageCache::new(settings.message_cache_capacity),
            admins: Arc::new(settings.admins()),
            settings: Arc::new(settings),
            logs: None,
        }
    }

    /// Attach the process' log switch.
    #[must_use]
    pub fn with_log_control(mut self, logs: Arc<dyn LogControl>) -> Self {
        self.logs = Some(logs);
        self
    }

    /// Whether `user` is a configured admin.
    #[must_use]
    pub fn is_admin(&self, user: &UserId) -> bool {
        self.admins.contains(user)
    }
}

/// Everything a handler sees for one event.
pub struct HandlerContext<'a> {
    /// The event being handled.
    pub event: &'a InboundEvent,
    /// Arguments after the command name (all words for event handlers).
    pub args: Vec<String>,
    /// Whether the sender is an admin.
    pub is_admin: bool,
    /// Prefix in effect for this event.
    pub prefix: String,
    /// Shared services.
    pub services: &'a Services,
    /// Registered handlers.
    pub registry: &'a HandlerRegistry,
}

impl HandlerContext<'_> {
    /// The user the event came from.
    #[must_use]
    pub fn sender(&self) -> &UserId {
        &self.event.sender.id
    }

    /// Reply with text to the sender.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Messenger`] if sending fails.
    pub async fn reply(&self, text: &str) -> Result<(), HandlerError> {
        self.services
            .messenger
            .send_text(self.sender(), text)
            .await
            .map_err(HandlerError::from)
    }

    /// Send a raw message object to the sender.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Messenger`] if sending fails.
    pub async fn send(&self, message: serde_json::Value) -> Result<(), HandlerError> {
        self.services
            .messenger
            .send_message(self.sender(), message)
            .await
            .map_err(HandlerError::from)
    }

    /// Show or hide the typing indicator.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Messenger`] if sending fails.
    pub async fn typing(&self, on: bool) -> Result<(), HandlerError> {
        let action = if on {
            SenderAction::TypingOn
        } else {
            SenderAction::TypingOff
        };
        self.services
            .messenger
            .sender_action(self.sender(), action)
            .await
            .map_err(HandlerError::from)
    }

    /// Route the sender's next reply to `command`.
    pub async fn expect_reply(&self, command: &str) {
        self.services.replies.expect(self.sender(), command).await;
    }
}
