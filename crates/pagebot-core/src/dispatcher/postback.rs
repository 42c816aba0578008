//! Postback (button press) flow.

use super::{guarded, Admission, DispatchOutcome, Dispatcher, Rejection, POSTBACK_FAILED_NOTICE};
use crate::event::InboundEvent;
use crate::handler::{Command, EventHandler, HandlerContext, HandlerError, PostbackOutcome};
use crate::locks::LockKind;
use crate::registry::RouteTarget;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A handler that may claim a postback.
#[derive(Clone)]
enum Claimant {
    Command(Arc<dyn Command>),
    Event(Arc<dyn EventHandler>),
}

impl Claimant {
    fn name(&self) -> String {
        match self {
            Self::Command(command) => command.spec().name.to_lowercase(),
            Self::Event(handler) => handler.spec().key.to_lowercase(),
        }
    }

    fn is_same(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Command(_), Self::Command(_)) | (Self::Event(_), Self::Event(_))
        ) && self.name() == other.name()
    }

    async fn offer(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &str,
    ) -> Result<PostbackOutcome, HandlerError> {
        match self {
            Self::Command(command) => guarded(command.on_postback(ctx, payload)).await,
            Self::Event(handler) => guarded(handler.on_postback(ctx, payload)).await,
        }
    }
}

impl Dispatcher {
    /// Admission checks and delivery of a postback.
    pub(super) async fn handle_postback(
        &self,
        event: &InboundEvent,
        admission: &Admission,
    ) -> DispatchOutcome {
        let Some(payload) = event.postback_payload() else {
            return DispatchOutcome::Postback {
                handler: None,
                success: false,
            };
        };
        let user = &admission.user;
        let locks = &self.services.locks;

        if let Some(running) = locks.holder(LockKind::Command, user) {
            return self
                .reject(
                    user,
                    Rejection::CommandBusy {
                        running: running.label,
                    },
                )
                .await;
        }
        let _guard = match locks.try_acquire(LockKind::Postback, user, payload) {
            Ok(guard) => guard,
            Err(busy) => {
                return self
                    .reject(user, Rejection::PostbackBusy { running: busy.label })
                    .await
            }
        };
        if let Err(active) = self.services.cooldowns.check_postback(user, payload) {
            return self
                .reject(
                    user,
                    Rejection::PostbackCooldown {
                        payload: payload.to_string(),
                        remaining_secs: active.remaining_secs(),
                    },
                )
                .await;
        }

        let ctx = self.context(event, Vec::new(), admission);
        let default_cooldown = self.services.settings.postback_cooldown_secs;
        for claimant in self.postback_claimants(payload, admission.is_admin).await {
            match claimant.offer(&ctx, payload).await {
                Ok(PostbackOutcome::Ignored) => {}
                Ok(PostbackOutcome::Handled { cooldown_secs }) => {
                    let handler = claimant.name();
                    info!(payload, handler = %handler, "Postback handled");
                    self.services.cooldowns.set_postback(
                        user,
                        payload,
                        cooldown_secs.unwrap_or(default_cooldown),
                    );
                    return DispatchOutcome::Postback {
                        handler: Some(handler),
                        success: true,
                    };
                }
                Err(e) => {
                    let handler = claimant.name();
                    error!(payload, handler = %handler, error = %e, "Postback handler failed");
                    self.notify(user, POSTBACK_FAILED_NOTICE).await;
                    self.services
                        .cooldowns
                        .set_postback(user, payload, default_cooldown);
                    return DispatchOutcome::Postback {
                        handler: Some(handler),
                        success: false,
                    };
                }
            }
        }

        debug!(payload, "Postback not claimed by any handler");
        DispatchOutcome::Postback {
            handler: None,
            success: true,
        }
    }

    /// Priority route target first, then event handlers, then commands.
    ///
    /// Disabled handlers and admin-only commands (for regular users) are left out.
    async fn postback_claimants(&self, payload: &str, is_admin: bool) -> Vec<Claimant> {
        let routed = self
            .registry
            .postback_route(payload)
            .and_then(|target| match target {
                RouteTarget::Command(name) => self.registry.command(name).map(Claimant::Command),
                RouteTarget::Event(key) => self.registry.event(key).map(Claimant::Event),
            });
        let candidates = routed.into_iter().chain(
            self.registry
                .events()
                .iter()
                .cloned()
                .map(Claimant::Event)
                .chain(self.registry.commands().iter().cloned().map(Claimant::Command)),
        );

        let mut claimants: Vec<Claimant> = Vec::new();
        for candidate in candidates {
            if claimants.iter().any(|seen| seen.is_same(&candidate)) {
                continue;
            }
            if self.is_eligible(&candidate, is_admin).await {
                claimants.push(candidate);
            }
        }
        claimants
    }

    async fn is_eligible(&self, claimant: &Claimant, is_admin: bool) -> bool {
        let state = &self.services.state;
        match claimant {
            Claimant::Event(handler) => !state.is_event_disabled(&handler.spec().key).await,
            Claimant::Command(command) => {
                let spec = command.spec();
                (is_admin || !spec.admin_only) && !state.is_command_disabled(&spec.name).await
            }
        }
    }
}
