//! Routing state machine.
//!
//! [`Dispatcher::dispatch`] takes one inbound event through admission
//! control (echo, blacklist, maintenance, permissions, disabled handlers,
//! cooldowns, single-flight locks) and hands it to at most one command, one
//! postback claimant, one reply continuation, or the event handlers.

mod command;
mod outcome;
mod postback;

pub use outcome::{
    DispatchOutcome, DropReason, Rejection, COMMAND_FAILED_NOTICE, MAINTENANCE_NOTICE,
    NO_PERMISSION_NOTICE, POSTBACK_FAILED_NOTICE,
};

use crate::event::{EventType, InboundEvent, UserId};
use crate::handler::{HandlerContext, HandlerError, Services};
use crate::messenger::SenderAction;
use crate::registry::{HandlerRegistry, Resolution};
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Routes inbound events to handlers.
#[derive(Clone)]
pub struct Dispatcher {
    services: Services,
    registry: Arc<HandlerRegistry>,
}

/// Per-event facts computed once at admission.
struct Admission {
    user: UserId,
    is_admin: bool,
    echo: bool,
    prefix: String,
}

impl Dispatcher {
    /// Creates a dispatcher over `services` and `registry`.
    #[must_use]
    pub const fn new(services: Services, registry: Arc<HandlerRegistry>) -> Self {
        Self { services, registry }
    }

    /// Shared services.
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Registered handlers.
    #[must_use]
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Route one event.
    #[instrument(skip_all, fields(user = %event.sender.id, event_type = %event.event_type()))]
    pub async fn dispatch(&self, mut event: InboundEvent) -> DispatchOutcome {
        let echo = event.is_echo();
        if echo {
            if !self.services.settings.self_listen {
                debug!("Dropping echo event");
                return DispatchOutcome::Dropped(DropReason::Echo);
            }
            event.normalize_echo();
        }

        let user = event.sender.id.clone();
        let is_admin = self.services.is_admin(&user);
        let state = &self.services.state;

        if !is_admin && state.is_blacklisted(&user).await {
            debug!("Dropping event from blacklisted user");
            return DispatchOutcome::Dropped(DropReason::Blacklisted);
        }

        if self.services.settings.mark_as_seen && !echo {
            self.spawn_mark_seen(&user);
        }
        state.mark_active(&user).await;

        let event_type = event.event_type();
        if state.is_maintenance() && !is_admin {
            let rejection = Rejection::Maintenance;
            if !echo && is_conversational(event_type) {
                self.notify(&user, &rejection.notice()).await;
            }
            return DispatchOutcome::Rejected(rejection);
        }

        let admission = Admission {
            user,
            is_admin,
            echo,
            prefix: state.prefix().await,
        };

        if event_type == EventType::Postback {
            return self.handle_postback(&event, &admission).await;
        }

        let line = event.command_line();
        match self.registry.resolve(&line.head, &admission.prefix) {
            Resolution::PrefixNotRequired(command) => {
                self.reject(&admission.user, Rejection::PrefixNotRequired { command })
                    .await
            }
            Resolution::Matched(command) => {
                self.run_command(command, &event, line.args, &admission)
                    .await
            }
            Resolution::NoMatch => {
                if !echo && matches!(event_type, EventType::Message | EventType::MessageReply) {
                    if let Some(command) = self.services.replies.pending(&admission.user).await {
                        return self.run_reply(&command, &event, &admission).await;
                    }
                }
                self.run_events(&event, line.words(), &admission).await
            }
        }
    }

    /// Run every enabled event handler in registration order.
    async fn run_events(
        &self,
        event: &InboundEvent,
        args: Vec<String>,
        admission: &Admission,
    ) -> DispatchOutcome {
        let ctx = self.context(event, args, admission);
        let mut ran = 0;
        for handler in self.registry.events() {
            let spec = handler.spec();
            if self.services.state.is_event_disabled(&spec.key).await {
                continue;
            }
            if admission.echo && !spec.self_listen {
                debug!(handler = %spec.key, "Skipping echo for handler");
                continue;
            }
            match guarded(handler.run(&ctx)).await {
                Ok(()) => ran += 1,
                Err(e) => error!(handler = %spec.key, error = %e, "Event handler failed"),
            }
        }
        DispatchOutcome::Events { ran }
    }

    fn context<'a>(
        &'a self,
        event: &'a InboundEvent,
        args: Vec<String>,
        admission: &Admission,
    ) -> HandlerContext<'a> {
        HandlerContext {
            event,
            args,
            is_admin: admission.is_admin,
            prefix: admission.prefix.clone(),
            services: &self.services,
            registry: &self.registry,
        }
    }

    /// Send `rejection`'s notice and report it.
    async fn reject(&self, user: &UserId, rejection: Rejection) -> DispatchOutcome {
        debug!(?rejection, "Rejected");
        self.notify(user, &rejection.notice()).await;
        DispatchOutcome::Rejected(rejection)
    }

    /// Best-effort text to `user`.
    async fn notify(&self, user: &UserId, text: &str) {
        if let Err(e) = self.services.messenger.send_text(user, text).await {
            warn!(user = %user, error = %e, "Failed to deliver notice");
        }
    }

    fn spawn_mark_seen(&self, user: &UserId) {
        let messenger = Arc::clone(&self.services.messenger);
        let user = user.clone();
        tokio::spawn(async move {
            if let Err(e) = messenger.sender_action(&user, SenderAction::MarkSeen).await {
                warn!(user = %user, error = %e, "Failed to mark as seen");
            }
        });
    }

    /// Remove stale locks and expired cooldowns once.
    pub async fn sweep(&self) {
        let stale = self
            .services
            .locks
            .sweep_stale(self.services.settings.stale_lock_after());
        let window = self
            .services
            .state
            .longest_cooldown(self.registry.max_command_cooldown())
            .await;
        let expired = self.services.cooldowns.sweep(window);
        if stale > 0 || expired > 0 {
            debug!(stale_locks = stale, expired_cooldowns = expired, "Sweep finished");
        }
    }

    /// Run [`Self::sweep`] periodically until `cancel` fires.
    #[must_use]
    pub fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let dispatcher = self.clone();
        let period = self.services.settings.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => dispatcher.sweep().await,
                }
            }
            info!("Sweeper stopped");
        })
    }
}

/// Events a user actively sent, as opposed to receipts and reactions.
const fn is_conversational(event_type: EventType) -> bool {
    matches!(
        event_type,
        EventType::Message | EventType::MessageReply | EventType::Attachments | EventType::Postback
    )
}

/// Await a handler future, turning a panic into [`HandlerError::Panicked`].
async fn guarded<T, F>(future: F) -> Result<T, HandlerError>
where
    F: Future<Output = Result<T, HandlerError>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
