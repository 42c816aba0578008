//! First-contact welcome card and its buttons.

use super::help::render_help;
use crate::event::{EventType, UserId};
use crate::handler::{EventHandler, EventSpec, HandlerContext, HandlerError, PostbackOutcome};
use async_trait::async_trait;
use dashmap::DashSet;
use serde_json::json;
use tracing::info;

/// Payload of the "Pick your AI" button.
pub const START_CHAT: &str = "START_CHAT";
/// Payload of the "View Commands" button.
pub const HELP_PAYLOAD: &str = "HELP_PAYLOAD";

const GETTING_STARTED: &str = "🤖 You're all set! Just send me a message and I'll answer.\n\nType a command at any time, or tap 📚 View Commands to see what I can do.";

/// Sends a welcome card the first time a user writes.
pub struct WelcomeMessage {
    spec: EventSpec,
    welcomed: DashSet<UserId>,
}

impl WelcomeMessage {
    /// New handler with nobody welcomed yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            spec: EventSpec::new(
                "welcomemessage",
                "Welcome Message",
                "Handles the welcome message for new users",
            )
            .author("Pagebot"),
            welcomed: DashSet::new(),
        }
    }

    /// Registry key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.spec.key
    }
}

impl Default for WelcomeMessage {
    fn default() -> Self {
        Self::new()
    }
}

fn welcome_card() -> serde_json::Value {
    json!({
        "attachment": {
            "type": "template",
            "payload": {
                "template_type": "generic",
                "elements": [{
                    "title": "Hey there newbie!",
                    "subtitle": "Thank you for using Pagebot.",
                    "buttons": [
                        {"type": "postback", "title": "🤖 Pick your AI", "payload": START_CHAT},
                        {"type": "postback", "title": "📚 View Commands", "payload": HELP_PAYLOAD}
                    ]
                }]
            }
        }
    })
}

#[async_trait]
impl EventHandler for WelcomeMessage {
    fn spec(&self) -> &EventSpec {
        &self.spec
    }

    async fn run(&self, ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        if ctx.event.event_type() != EventType::Message {
            return Ok(());
        }
        let user = ctx.sender().clone();
        if !self.welcomed.insert(user.clone()) {
            return Ok(());
        }
        if let Err(e) = ctx.send(welcome_card()).await {
            // Try again on the next message.
            self.welcomed.remove(&user);
            return Err(e);
        }
        info!(user = %user, "Welcome message sent");
        Ok(())
    }

    async fn on_postback(
        &self,
        ctx: &HandlerContext<'_>,
        payload: &str,
    ) -> Result<PostbackOutcome, HandlerError> {
        match payload {
            START_CHAT => ctx.reply(GETTING_STARTED).await?,
            HELP_PAYLOAD => {
                let text = render_help(ctx).await;
                ctx.reply(&text).await?;
            }
            _ => return Ok(PostbackOutcome::Ignored),
        }
        Ok(PostbackOutcome::HANDLED)
    }
}
