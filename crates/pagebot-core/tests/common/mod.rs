#![allow(dead_code)]

use async_trait::async_trait;
use pagebot_core::builtin::register_builtins;
use pagebot_core::config::RouterSettings;
use pagebot_core::handler::{
    Command, CommandSpec, EventHandler, EventSpec, HandlerContext, HandlerError, PostbackOutcome,
    Services,
};
use pagebot_core::logging::{LogControl, LogControlError};
use pagebot_core::messenger::{Messenger, MessengerError, SenderAction};
use pagebot_core::registry::HandlerRegistry;
use pagebot_core::{Dispatcher, InboundEvent, UserId};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const ADMIN: &str = "900";

/// Messenger that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingMessenger {
    texts: Mutex<Vec<(UserId, String)>>,
    messages: Mutex<Vec<(UserId, serde_json::Value)>>,
    actions: Mutex<Vec<(UserId, SenderAction)>>,
}

impl RecordingMessenger {
    pub fn texts_for(&self, user: &str) -> Vec<String> {
        let user = UserId::from(user);
        self.texts
            .lock()
            .expect("texts lock")
            .iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn last_text_for(&self, user: &str) -> Option<String> {
        self.texts_for(user).pop()
    }

    pub fn text_count(&self) -> usize {
        self.texts.lock().expect("texts lock").len()
    }

    pub fn messages_for(&self, user: &str) -> Vec<serde_json::Value> {
        let user = UserId::from(user);
        self.messages
            .lock()
            .expect("messages lock")
            .iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn actions_for(&self, user: &str) -> Vec<SenderAction> {
        let user = UserId::from(user);
        self.actions
            .lock()
            .expect("actions lock")
            .iter()
            .filter(|(to, _)| *to == user)
            .map(|(_, action)| *action)
            .collect()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, recipient: &UserId, text: &str) -> Result<(), MessengerError> {
        self.texts
            .lock()
            .expect("texts lock")
            .push((recipient.clone(), text.to_string()));
        Ok(())
    }

    async fn send_message(
        &self,
        recipient: &UserId,
        message: serde_json::Value,
    ) -> Result<(), MessengerError> {
        self.messages
            .lock()
            .expect("messages lock")
            .push((recipient.clone(), message));
        Ok(())
    }

    async fn sender_action(
        &self,
        recipient: &UserId,
        action: SenderAction,
    ) -> Result<(), MessengerError> {
        self.actions
            .lock()
            .expect("actions lock")
            .push((recipient.clone(), action));
        Ok(())
    }
}

pub fn settings() -> RouterSettings {
    RouterSettings {
        admins_str: Some(ADMIN.to_string()),
        ..RouterSettings::default()
    }
}

/// Dispatcher with the built-ins plus whatever `extra` registers.
pub fn harness(
    settings: RouterSettings,
    extra: impl FnOnce(&mut HandlerRegistry),
) -> (Dispatcher, Arc<RecordingMessenger>) {
    build(settings, None, extra)
}

/// Built-ins only, with a log switch installed.
pub fn harness_with_logs(logs: Arc<dyn LogControl>) -> (Dispatcher, Arc<RecordingMessenger>) {
    build(settings(), Some(logs), |_| {})
}

fn build(
    settings: RouterSettings,
    logs: Option<Arc<dyn LogControl>>,
    extra: impl FnOnce(&mut HandlerRegistry),
) -> (Dispatcher, Arc<RecordingMessenger>) {
    let messenger = Arc::new(RecordingMessenger::default());
    let mut services = Services::new(messenger.clone(), settings);
    if let Some(logs) = logs {
        services = services.with_log_control(logs);
    }
    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry).expect("builtins");
    extra(&mut registry);
    (Dispatcher::new(services, Arc::new(registry)), messenger)
}

pub fn text(sender: &str, text: &str) -> InboundEvent {
    InboundEvent::text_message(sender, text)
}

pub fn postback(sender: &str, payload: &str) -> InboundEvent {
    InboundEvent::postback(sender, payload)
}

/// Command that runs until released.
pub struct Blocking {
    spec: CommandSpec,
    pub started: Notify,
    pub release: Notify,
}

impl Blocking {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            spec: CommandSpec::new(name, "blocks until released"),
            started: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl Command for Blocking {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn run(&self, _ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(())
    }

    async fn on_postback(
        &self,
        _ctx: &HandlerContext<'_>,
        payload: &str,
    ) -> Result<PostbackOutcome, HandlerError> {
        if payload != "SLOW_BUTTON" {
            return Ok(PostbackOutcome::Ignored);
        }
        self.started.notify_one();
        self.release.notified().await;
        Ok(PostbackOutcome::HANDLED)
    }
}

/// How a [`Scripted`] command behaves.
#[derive(Clone, Copy)]
pub enum Behavior {
    Succeed,
    Fail,
    Panic,
}

/// Command with a fixed behavior, also used for postbacks starting with `BTN_`.
pub struct Scripted {
    spec: CommandSpec,
    behavior: Behavior,
    pub runs: AtomicUsize,
}

impl Scripted {
    pub fn new(spec: CommandSpec, behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            spec,
            behavior,
            runs: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn act(&self) -> Result<(), HandlerError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Fail => Err(HandlerError::Upstream("content api down".into())),
            Behavior::Panic => panic!("scripted panic"),
        }
    }
}

#[async_trait]
impl Command for Scripted {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn run(&self, ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        self.act()?;
        ctx.reply(&format!("{} ok", self.spec.name)).await
    }

    async fn on_postback(
        &self,
        _ctx: &HandlerContext<'_>,
        payload: &str,
    ) -> Result<PostbackOutcome, HandlerError> {
        if !payload.starts_with("BTN_") {
            return Ok(PostbackOutcome::Ignored);
        }
        self.act()?;
        Ok(PostbackOutcome::Handled {
            cooldown_secs: payload.strip_prefix("BTN_").and_then(|s| s.parse().ok()),
        })
    }
}

/// Command that asks a question and waits for the answer.
pub struct Quiz {
    spec: CommandSpec,
}

impl Quiz {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            spec: CommandSpec::new("quiz", "asks a question"),
        })
    }
}

#[async_trait]
impl Command for Quiz {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn run(&self, ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        ctx.reply("Pick 1 or 2").await?;
        ctx.expect_reply("quiz").await;
        Ok(())
    }

    async fn on_reply(&self, ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        ctx.reply(&format!("You picked {}", ctx.event.text())).await
    }
}

/// Event handler that counts its runs.
pub struct Counter {
    spec: EventSpec,
    fail: bool,
    pub runs: AtomicUsize,
}

impl Counter {
    pub fn new(key: &str, self_listen: bool, fail: bool) -> Arc<Self> {
        let mut spec = EventSpec::new(key, key, "counts events");
        if self_listen {
            spec = spec.self_listen();
        }
        Arc::new(Self {
            spec,
            fail,
            runs: AtomicUsize::new(0),
        })
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for Counter {
    fn spec(&self) -> &EventSpec {
        &self.spec
    }

    async fn run(&self, _ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(HandlerError::InvalidInput("cannot handle".into()));
        }
        Ok(())
    }
}

/// Event handler that claims postbacks starting with `prefix` and counts offers.
pub struct Claimer {
    spec: EventSpec,
    prefix: String,
    pub offers: AtomicUsize,
}

impl Claimer {
    pub fn new(key: &str, prefix: &str) -> Arc<Self> {
        Arc::new(Self {
            spec: EventSpec::new(key, key, "claims buttons"),
            prefix: prefix.to_string(),
            offers: AtomicUsize::new(0),
        })
    }

    pub fn offers(&self) -> usize {
        self.offers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for Claimer {
    fn spec(&self) -> &EventSpec {
        &self.spec
    }

    async fn on_postback(
        &self,
        _ctx: &HandlerContext<'_>,
        payload: &str,
    ) -> Result<PostbackOutcome, HandlerError> {
        self.offers.fetch_add(1, Ordering::SeqCst);
        if payload.starts_with(&self.prefix) {
            return Ok(PostbackOutcome::HANDLED);
        }
        Ok(PostbackOutcome::Ignored)
    }
}

/// Log switch that only remembers the last request.
#[derive(Default)]
pub struct SwitchableLogs {
    debug: AtomicBool,
    pub broken: AtomicBool,
}

impl LogControl for SwitchableLogs {
    fn set_debug(&self, enabled: bool) -> Result<(), LogControlError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(LogControlError::Reload("subscriber gone".into()));
        }
        self.debug.store(enabled, Ordering::SeqCst);
        Ok(())
    }

    fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }
}
