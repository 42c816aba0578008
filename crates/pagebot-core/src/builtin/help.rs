//! `help`: list commands and events.

use crate::handler::{Command, CommandSpec, HandlerContext, HandlerError};
use async_trait::async_trait;
use std::fmt::Write;

/// Lists available handlers, or details for one command.
pub struct Help {
    spec: CommandSpec,
}

impl Help {
    /// New command.
    #[must_use]
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new(
                "help",
                "Sends a greeting message and lists all commands and events.",
            )
            .author("Pagebot")
            .category("utility")
            .cooldown(5),
        }
    }
}

impl Default for Help {
    fn default() -> Self {
        Self::new()
    }
}

fn invocation(spec: &CommandSpec, prefix: &str) -> String {
    if spec.use_prefix {
        format!("{prefix}{}", spec.name)
    } else {
        spec.name.clone()
    }
}

/// Help listing as seen by the context's sender.
///
/// Admin-only and disabled commands are hidden from regular users.
pub async fn render_help(ctx: &HandlerContext<'_>) -> String {
    let state = &ctx.services.state;
    let mut message = String::from("Here are the available commands and events:\n\nCommands:\n");

    for command in ctx.registry.commands() {
        let spec = command.spec();
        if spec.admin_only && !ctx.is_admin {
            continue;
        }
        if state.is_command_disabled(&spec.name).await && !ctx.is_admin {
            continue;
        }
        let _ = writeln!(message, "{}", invocation(spec, &ctx.prefix));
        if !spec.author.is_empty() {
            let _ = writeln!(message, "Author: {}", spec.author);
        }
        let _ = writeln!(message, "Description: {}\n", spec.description);
    }

    message.push_str("Events:\n");
    for handler in ctx.registry.events() {
        let spec = handler.spec();
        if state.is_event_disabled(&spec.key).await {
            continue;
        }
        let _ = writeln!(message, "- {}", spec.name);
        let _ = writeln!(message, "Description: {}\n", spec.description);
    }

    message.push_str("Feel free to use these commands and events as you wish.");
    message
}

fn render_details(spec: &CommandSpec, prefix: &str, cooldown_secs: u64) -> String {
    let mut message = format!("📖 {}\n\n", invocation(spec, prefix));
    let _ = writeln!(message, "Description: {}", spec.description);
    let _ = writeln!(message, "Category: {}", spec.category);
    let _ = writeln!(message, "Version: {}", spec.version);
    if !spec.author.is_empty() {
        let _ = writeln!(message, "Author: {}", spec.author);
    }
    let _ = writeln!(message, "Cooldown: {cooldown_secs}s");
    if spec.admin_only {
        message.push_str("Admin only\n");
    }
    message.trim_end().to_string()
}

#[async_trait]
impl Command for Help {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn run(&self, ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        if let Some(name) = ctx.args.first() {
            let command = ctx
                .registry
                .command(name)
                .filter(|c| ctx.is_admin || !c.spec().admin_only);
            let Some(command) = command else {
                return ctx.reply(&format!("❌ Command {name} not found")).await;
            };
            let spec = command.spec();
            let cooldown = ctx
                .services
                .state
                .effective_cooldown(&spec.name, spec.cooldown_secs)
                .await;
            return ctx.reply(&render_details(spec, &ctx.prefix, cooldown)).await;
        }
        let text = render_help(ctx).await;
        ctx.reply(&text).await
    }
}
