//! `ac`: admin control panel.

use super::status::on_off;
use crate::event::UserId;
use crate::handler::{Command, CommandSpec, HandlerContext, HandlerError};
use crate::locks::LockKind;
use crate::utils::format_uptime;
use async_trait::async_trait;
use std::fmt::Write;
use tracing::{info, warn};

/// Runtime administration: maintenance, blacklist, cooldowns, toggles.
pub struct AdminControl {
    spec: CommandSpec,
}

impl AdminControl {
    /// New command.
    #[must_use]
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new("ac", "Admin control commands for bot management")
                .author("Pagebot")
                .category("admin")
                .admin_only(),
        }
    }
}

impl Default for AdminControl {
    fn default() -> Self {
        Self::new()
    }
}

fn panel(prefix: &str) -> String {
    let p = format!("{prefix}ac");
    format!(
        "🔧 ADMIN CONTROL PANEL\n\n\
         📊 Status\n\
         {p} status - Show bot status\n\
         {p} stats - Show command usage statistics\n\n\
         ⚙️ System\n\
         {p} maintenance [on/off] - Toggle maintenance mode\n\
         {p} restart - Simulate bot restart\n\
         {p} prefix [new_prefix] - Change bot prefix\n\
         {p} log [on/off] - Toggle debug logging\n\n\
         🔒 Users\n\
         {p} blacklist [add/remove] [userID] - Manage blacklist\n\
         {p} unlock [userID] - Release stuck command and button locks\n\n\
         ⚡ Commands\n\
         {p} cooldown [command] [seconds] - Set command cooldown\n\
         {p} cooldown -global [seconds] - Set cooldown for all commands\n\
         {p} disable [command] - Disable a command\n\
         {p} enable [command] - Enable a command\n\
         {p} event [enable/disable] [event] - Toggle event handlers\n\n\
         📢 Broadcast\n\
         {p} broadcast [message] - Broadcast message to all users\n\n\
         ⚠️ All commands require admin privileges."
    )
}

fn arg<'a>(ctx: &'a HandlerContext<'_>, idx: usize) -> Option<&'a str> {
    ctx.args.get(idx).map(String::as_str)
}

async fn status(ctx: &HandlerContext<'_>) -> String {
    let state = &ctx.services.state;
    let last_restart = state.last_restart().await.map_or_else(
        || "Never".to_string(),
        |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    let global = state
        .global_cooldown()
        .await
        .map_or_else(|| "default".to_string(), |secs| format!("{secs}s"));
    let debug_logging = ctx
        .services
        .logs
        .as_ref()
        .map_or("n/a", |logs| on_off(logs.debug_enabled()));
    format!(
        "📊 BOT STATUS\n\n\
         🟢 Maintenance Mode: {}\n\
         📝 Debug Logging: {debug_logging}\n\
         ⏰ Uptime: {}\n\
         👥 Active Users: {}\n\
         🚫 Blacklisted Users: {}\n\
         🔄 Last Restart: {last_restart}\n\
         📈 Total Commands Used: {}\n\
         ⏳ Global Cooldown: {global}\n\
         ❌ Disabled Commands: {}\n\
         ❌ Disabled Events: {}",
        on_off(state.is_maintenance()),
        format_uptime(state.uptime().as_secs()),
        state.active_user_count().await,
        state.blacklisted().await.len(),
        state.total_usage().await,
        state.disabled_commands().await.len(),
        state.disabled_events().await.len(),
    )
}

async fn stats(ctx: &HandlerContext<'_>) -> String {
    let state = &ctx.services.state;
    let mut message = String::from("📊 COMMAND USAGE STATISTICS\n\n");
    let usage = state.usage_stats().await;
    if usage.is_empty() {
        message.push_str("No commands used yet.\n");
    }
    for entry in usage {
        let _ = writeln!(message, "{}: {} unique users", entry.command, entry.users);
    }
    let _ = write!(
        message,
        "\n👥 Total Active Users: {}",
        state.active_user_count().await
    );
    message
}

fn maintenance(ctx: &HandlerContext<'_>) -> String {
    let enabled = match arg(ctx, 1).map(str::to_lowercase).as_deref() {
        Some("on") => true,
        Some("off") => false,
        _ => return "❌ Please specify 'on' or 'off'".to_string(),
    };
    ctx.services.state.set_maintenance(enabled);
    format!(
        "✅ Maintenance mode {}",
        if enabled { "enabled" } else { "disabled" }
    )
}

async fn blacklist(ctx: &HandlerContext<'_>) -> String {
    let (Some(action), Some(target)) = (arg(ctx, 1), arg(ctx, 2)) else {
        return "❌ Usage: ac blacklist [add/remove] [userID]".to_string();
    };
    let state = &ctx.services.state;
    let target = UserId::from(target);
    match action.to_lowercase().as_str() {
        "add" => {
            if ctx.services.is_admin(&target) {
                return format!("❌ User {target} is an admin and cannot be blacklisted");
            }
            if !state.blacklist_add(&target).await {
                return format!("❌ User {target} is already blacklisted");
            }
            info!(user = %target, "User blacklisted");
            format!("✅ User {target} added to blacklist")
        }
        "remove" => {
            if state.blacklist_remove(&target).await {
                format!("✅ User {target} removed from blacklist")
            } else {
                format!("❌ User {target} is not blacklisted")
            }
        }
        _ => "❌ Usage: ac blacklist [add/remove] [userID]".to_string(),
    }
}

async fn cooldown(ctx: &HandlerContext<'_>) -> String {
    let Some(target) = arg(ctx, 1) else {
        return "❌ Usage: ac cooldown [command/-global] [seconds]".to_string();
    };
    let Some(secs) = arg(ctx, 2).and_then(|value| value.parse::<u64>().ok()) else {
        return "❌ Invalid cooldown value".to_string();
    };
    let state = &ctx.services.state;

    if target.eq_ignore_ascii_case("-global") {
        state.set_global_cooldown(secs).await;
        let count = ctx.registry.commands().len();
        return if secs == 0 {
            format!("✅ Global cooldown restored to default for {count} commands")
        } else {
            format!("✅ Global cooldown set to {secs} seconds for {count} commands")
        };
    }

    let Some(command) = ctx.registry.command(target) else {
        return format!("❌ Command {target} not found");
    };
    let name = command.spec().name.clone();
    state.set_cooldown_override(&name, secs).await;
    if secs == 0 {
        format!("✅ Cooldown for {name} restored to default")
    } else {
        format!("✅ Cooldown for {name} set to {secs} seconds")
    }
}

async fn toggle_command(ctx: &HandlerContext<'_>, disable: bool) -> String {
    let verb = if disable { "disable" } else { "enable" };
    let Some(target) = arg(ctx, 1) else {
        return format!("❌ Usage: ac {verb} [command]");
    };
    let Some(command) = ctx.registry.command(target) else {
        return format!("❌ Command {target} not found");
    };
    let name = command.spec().name.to_lowercase();
    if disable && name == "ac" {
        return "❌ Command ac cannot be disabled".to_string();
    }
    ctx.services
        .state
        .set_command_disabled(&name, disable)
        .await;
    format!("✅ Command {name} {verb}d")
}

async fn toggle_event(ctx: &HandlerContext<'_>) -> String {
    let (Some(action), Some(target)) = (arg(ctx, 1), arg(ctx, 2)) else {
        return "❌ Usage: ac event [enable/disable] [event]".to_string();
    };
    let disable = match action.to_lowercase().as_str() {
        "disable" => true,
        "enable" => false,
        _ => return "❌ Usage: ac event [enable/disable] [event]".to_string(),
    };
    let Some(handler) = ctx.registry.event(target) else {
        return format!("❌ Event {target} not found");
    };
    let key = handler.spec().key.clone();
    ctx.services.state.set_event_disabled(&key, disable).await;
    format!(
        "✅ Event {key} {}",
        if disable { "disabled" } else { "enabled" }
    )
}

fn log(ctx: &HandlerContext<'_>) -> String {
    let enabled = match arg(ctx, 1).map(str::to_lowercase).as_deref() {
        Some("on") => true,
        Some("off") => false,
        _ => return "❌ Please specify 'on' or 'off'".to_string(),
    };
    let Some(logs) = &ctx.services.logs else {
        return "❌ Log control is not available".to_string();
    };
    match logs.set_debug(enabled) {
        Ok(()) => {
            info!(debug = enabled, "Log level switched by admin");
            format!(
                "✅ Debug logging {}",
                if enabled { "enabled" } else { "disabled" }
            )
        }
        Err(e) => {
            warn!(error = %e, "Log level switch failed");
            format!("❌ {e}")
        }
    }
}

async fn prefix(ctx: &HandlerContext<'_>) -> String {
    let Some(new_prefix) = arg(ctx, 1) else {
        return "❌ Please provide a new prefix".to_string();
    };
    ctx.services.state.set_prefix(new_prefix).await;
    format!("✅ Bot prefix changed to: {new_prefix}")
}

async fn restart(ctx: &HandlerContext<'_>) -> String {
    ctx.services.state.simulate_restart().await;
    "🔄 Bot restart simulated. All temporary data has been reset.".to_string()
}

fn unlock(ctx: &HandlerContext<'_>) -> String {
    let Some(target) = arg(ctx, 1) else {
        return "❌ Usage: ac unlock [userID]".to_string();
    };
    let target = UserId::from(target);
    let locks = &ctx.services.locks;
    let released: Vec<String> = [LockKind::Command, LockKind::Postback]
        .into_iter()
        .filter_map(|kind| locks.release(kind, &target))
        .map(|entry| entry.label)
        .collect();
    if released.is_empty() {
        return format!("ℹ️ User {target} holds no locks");
    }
    warn!(user = %target, released = ?released, "Locks released by admin");
    format!("🔓 Released for {target}: {}", released.join(", "))
}

async fn broadcast(ctx: &HandlerContext<'_>) -> Result<String, HandlerError> {
    if ctx.args.len() < 2 {
        return Ok("❌ Please provide a message to broadcast".to_string());
    }
    let text = format!("📢 Broadcast from Admin:\n\n{}", ctx.args[1..].join(" "));
    let messenger = &ctx.services.messenger;

    let mut sent = 0;
    let mut failed = 0;
    for user in ctx.services.state.active_users().await {
        match messenger.send_text(&user, &text).await {
            Ok(()) => sent += 1,
            Err(e) => {
                warn!(user = %user, error = %e, "Broadcast delivery failed");
                failed += 1;
            }
        }
    }
    info!(sent, failed, "Broadcast finished");
    Ok(format!(
        "📢 Broadcast Results:\n✅ Successfully sent: {sent}\n❌ Failed: {failed}"
    ))
}

#[async_trait]
impl Command for AdminControl {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn run(&self, ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        let Some(sub) = arg(ctx, 0).map(str::to_lowercase) else {
            return ctx.reply(&panel(&ctx.prefix)).await;
        };
        let response = match sub.as_str() {
            "status" => status(ctx).await,
            "stats" => stats(ctx).await,
            "maintenance" => maintenance(ctx),
            "blacklist" => blacklist(ctx).await,
            "cooldown" => cooldown(ctx).await,
            "disable" => toggle_command(ctx, true).await,
            "enable" => toggle_command(ctx, false).await,
            "event" => toggle_event(ctx).await,
            "prefix" => prefix(ctx).await,
            "log" => log(ctx),
            "restart" => restart(ctx).await,
            "unlock" => unlock(ctx),
            "broadcast" => broadcast(ctx).await?,
            _ => format!("❌ Unknown command. Use {}ac for help.", ctx.prefix),
        };
        ctx.reply(&response).await
    }
}
