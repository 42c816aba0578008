//! `status`: runtime statistics for admins.

use crate::handler::{Command, CommandSpec, HandlerContext, HandlerError};
use crate::locks::LockKind;
use crate::utils::format_uptime;
use async_trait::async_trait;

const RULE: &str = "━━━━━━━━━━━━━━━";

/// Shows uptime, users, running handlers and cooldowns.
pub struct Status {
    spec: CommandSpec,
}

impl Status {
    /// New command.
    #[must_use]
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new("status", "Shows real-time bot statistics")
                .author("Pagebot")
                .category("admin")
                .admin_only()
                .cooldown(5),
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command for Status {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn run(&self, ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        let services = ctx.services;
        ctx.typing(true).await?;

        let running_commands = services.locks.snapshot(LockKind::Command).len();
        let running_postbacks = services.locks.snapshot(LockKind::Postback).len();
        let cooldowns =
            services.cooldowns.command_entries().len() + services.cooldowns.active_postbacks();

        let text = [
            "🤖 Bot Status".to_string(),
            RULE.to_string(),
            format!("⏰ Uptime: {}", format_uptime(services.state.uptime().as_secs())),
            format!("👥 Active Users: {}", services.state.active_user_count().await),
            format!("🔧 Maintenance: {}", on_off(services.state.is_maintenance())),
            RULE.to_string(),
            format!("🔄 Running Commands: {running_commands}"),
            format!("🔘 Running Postbacks: {running_postbacks}"),
            format!("⏳ Active Cooldowns: {cooldowns}"),
            format!("💬 Pending Replies: {}", services.replies.len()),
            RULE.to_string(),
        ]
        .join("\n");

        ctx.reply(&text).await?;
        ctx.typing(false).await
    }
}

pub(super) const fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}
