//! `getid`: tell users their page-scoped id.

use crate::handler::{Command, CommandSpec, HandlerContext, HandlerError};
use async_trait::async_trait;

/// Replies with the sender's id.
pub struct GetId {
    spec: CommandSpec,
}

impl GetId {
    /// New command.
    #[must_use]
    pub fn new() -> Self {
        Self {
            spec: CommandSpec::new("getid", "Get your user ID")
                .author("Pagebot")
                .category("utility"),
        }
    }
}

impl Default for GetId {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command for GetId {
    fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    async fn run(&self, ctx: &HandlerContext<'_>) -> Result<(), HandlerError> {
        ctx.typing(true).await?;
        let id = ctx.sender();
        let text = format!(
            "🔍 Your User ID: {id}\n\nTo make this account an admin, add the ID to the ADMINS setting (comma separated) and restart the bot."
        );
        ctx.reply(&text).await?;
        ctx.typing(false).await
    }
}
