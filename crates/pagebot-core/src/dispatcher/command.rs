//! Command and reply-continuation flows.

use super::{guarded, Admission, DispatchOutcome, Dispatcher, Rejection, COMMAND_FAILED_NOTICE};
use crate::event::InboundEvent;
use crate::handler::Command;
use crate::locks::LockKind;
use std::sync::Arc;
use tracing::{error, info, warn};

impl Dispatcher {
    /// Admission checks and execution of a resolved command.
    pub(super) async fn run_command(
        &self,
        command: Arc<dyn Command>,
        event: &InboundEvent,
        args: Vec<String>,
        admission: &Admission,
    ) -> DispatchOutcome {
        let spec = command.spec();
        let name = spec.name.to_lowercase();
        let user = &admission.user;
        let state = &self.services.state;

        if spec.admin_only && !admission.is_admin {
            return self
                .reject(user, Rejection::AdminOnly { command: name })
                .await;
        }
        if state.is_command_disabled(&name).await {
            return self.reject(user, Rejection::Disabled { command: name }).await;
        }

        let cooldown_secs = state.effective_cooldown(&name, spec.cooldown_secs).await;
        if let Err(active) =
            self.services
                .cooldowns
                .check_command(user, &name, cooldown_secs, admission.is_admin)
        {
            let remaining_secs = active.remaining_secs();
            return self
                .reject(
                    user,
                    Rejection::Cooldown {
                        command: name,
                        remaining_secs,
                    },
                )
                .await;
        }

        let _guard = match self.services.locks.try_acquire(LockKind::Command, user, &name) {
            Ok(guard) => guard,
            Err(busy) => {
                return self
                    .reject(user, Rejection::CommandBusy { running: busy.label })
                    .await
            }
        };

        self.services
            .cooldowns
            .record_command(user, &name, admission.is_admin);
        state.track_usage(&name, user).await;
        info!(command = %name, user = %user, "Command executed");

        let ctx = self.context(event, args, admission);
        let success = match guarded(command.run(&ctx)).await {
            Ok(()) => true,
            Err(e) => {
                error!(command = %name, user = %user, error = %e, "Command failed");
                self.notify(user, COMMAND_FAILED_NOTICE).await;
                false
            }
        };
        DispatchOutcome::Command { name, success }
    }

    /// Deliver a message to the command that is waiting for the user's reply.
    pub(super) async fn run_reply(
        &self,
        command_name: &str,
        event: &InboundEvent,
        admission: &Admission,
    ) -> DispatchOutcome {
        let user = &admission.user;
        let replies = &self.services.replies;

        let Some(command) = self.registry.command(command_name) else {
            warn!(command = %command_name, "Reply session for unknown command dropped");
            replies.cancel(user).await;
            return self
                .run_events(event, event.command_line().words(), admission)
                .await;
        };
        let name = command.spec().name.to_lowercase();

        if self.services.state.is_command_disabled(&name).await {
            replies.cancel(user).await;
            return self.reject(user, Rejection::Disabled { command: name }).await;
        }

        let _guard = match self.services.locks.try_acquire(LockKind::Command, user, &name) {
            Ok(guard) => guard,
            Err(busy) => {
                return self
                    .reject(user, Rejection::CommandBusy { running: busy.label })
                    .await
            }
        };
        replies.take(user).await;

        let ctx = self.context(event, event.command_line().words(), admission);
        let success = match guarded(command.on_reply(&ctx)).await {
            Ok(()) => true,
            Err(e) => {
                error!(command = %name, user = %user, error = %e, "Reply handler failed");
                self.notify(user, COMMAND_FAILED_NOTICE).await;
                false
            }
        };
        DispatchOutcome::Reply {
            command: name,
            success,
        }
    }
}
