//! Built-in handlers: welcome flow, help, id lookup, status and admin control.

mod admin;
mod getid;
mod help;
mod status;
mod welcome;

pub use admin::AdminControl;
pub use getid::GetId;
pub use help::{render_help, Help};
pub use status::Status;
pub use welcome::{WelcomeMessage, HELP_PAYLOAD, START_CHAT};

use crate::registry::{HandlerRegistry, RegistryError, RouteTarget};
use std::sync::Arc;

/// Register every built-in handler and the welcome postback routes.
///
/// # Errors
///
/// Returns [`RegistryError`] if a built-in name is already taken.
pub fn register_builtins(registry: &mut HandlerRegistry) -> Result<(), RegistryError> {
    registry.register_command(Arc::new(Help::new()))?;
    registry.register_command(Arc::new(GetId::new()))?;
    registry.register_command(Arc::new(Status::new()))?;
    registry.register_command(Arc::new(AdminControl::new()))?;

    let welcome = WelcomeMessage::new();
    let key = welcome.key().to_string();
    registry.register_event(Arc::new(welcome))?;
    registry.route_postback(START_CHAT, RouteTarget::Event(key.clone()))?;
    registry.route_postback(HELP_PAYLOAD, RouteTarget::Event(key))?;
    Ok(())
}
