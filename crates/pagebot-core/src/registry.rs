//! Handler registry and command resolution.

use crate::handler::{Command, EventHandler};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while building the registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two commands share a name
    #[error("Duplicate command name: {0}")]
    DuplicateCommand(String),
    /// Two event handlers share a key
    #[error("Duplicate event handler key: {0}")]
    DuplicateEvent(String),
    /// A postback route points at nothing
    #[error("Postback route {route} targets unknown handler {target}")]
    UnknownRouteTarget {
        /// Route pattern
        route: String,
        /// Missing handler
        target: String,
    },
}

/// Handler a postback route points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// Command by (lower-cased) name.
    Command(String),
    /// Event handler by key.
    Event(String),
}

#[derive(Debug, Clone)]
enum RouteMatch {
    Exact(String),
    Prefix(String),
}

impl RouteMatch {
    fn matches(&self, payload: &str) -> bool {
        match self {
            Self::Exact(expected) => payload == expected,
            Self::Prefix(prefix) => payload.starts_with(prefix.as_str()),
        }
    }

    fn pattern(&self) -> String {
        match self {
            Self::Exact(expected) => expected.clone(),
            Self::Prefix(prefix) => format!("{prefix}*"),
        }
    }
}

/// Result of resolving the head token of a message.
pub enum Resolution {
    /// A command to run.
    Matched(Arc<dyn Command>),
    /// A no-prefix command was typed with the prefix.
    PrefixNotRequired(String),
    /// No command.
    NoMatch,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matched(command) => f
                .debug_tuple("Matched")
                .field(&command.spec().name)
                .finish(),
            Self::PrefixNotRequired(name) => {
                f.debug_tuple("PrefixNotRequired").field(name).finish()
            }
            Self::NoMatch => f.write_str("NoMatch"),
        }
    }
}

/// Registered commands, event handlers and priority postback routes.
#[derive(Default)]
pub struct HandlerRegistry {
    commands: Vec<Arc<dyn Command>>,
    command_index: HashMap<String, usize>,
    events: Vec<Arc<dyn EventHandler>>,
    event_index: HashMap<String, usize>,
    routes: Vec<(RouteMatch, RouteTarget)>,
}

impl HandlerRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateCommand`] if the name is taken.
    pub fn register_command(&mut self, command: Arc<dyn Command>) -> Result<(), RegistryError> {
        let name = command.spec().name.to_lowercase();
        if self.command_index.contains_key(&name) {
            return Err(RegistryError::DuplicateCommand(name));
        }
        self.command_index.insert(name, self.commands.len());
        self.commands.push(command);
        Ok(())
    }

    /// Register an event handler.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateEvent`] if the key is taken.
    pub fn register_event(&mut self, handler: Arc<dyn EventHandler>) -> Result<(), RegistryError> {
        let key = handler.spec().key.to_lowercase();
        if self.event_index.contains_key(&key) {
            return Err(RegistryError::DuplicateEvent(key));
        }
        self.event_index.insert(key, self.events.len());
        self.events.push(handler);
        Ok(())
    }

    /// Route `payload` exactly to `target` ahead of the general search.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownRouteTarget`] if the target is not registered.
    pub fn route_postback(
        &mut self,
        payload: &str,
        target: RouteTarget,
    ) -> Result<(), RegistryError> {
        self.add_route(RouteMatch::Exact(payload.to_string()), target)
    }

    /// Route every payload starting with `prefix` to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownRouteTarget`] if the target is not registered.
    pub fn route_postback_prefix(
        &mut self,
        prefix: &str,
        target: RouteTarget,
    ) -> Result<(), RegistryError> {
        self.add_route(RouteMatch::Prefix(prefix.to_string()), target)
    }

    fn add_route(&mut self, route: RouteMatch, target: RouteTarget) -> Result<(), RegistryError> {
        let target = match target {
            RouteTarget::Command(name) => RouteTarget::Command(name.to_lowercase()),
            RouteTarget::Event(key) => RouteTarget::Event(key.to_lowercase()),
        };
        let known = match &target {
            RouteTarget::Command(name) => self.command_index.contains_key(name),
            RouteTarget::Event(key) => self.event_index.contains_key(key),
        };
        if !known {
            let target = match target {
                RouteTarget::Command(name) | RouteTarget::Event(name) => name,
            };
            return Err(RegistryError::UnknownRouteTarget {
                route: route.pattern(),
                target,
            });
        }
        self.routes.push((route, target));
        Ok(())
    }

    /// First priority route matching `payload`.
    #[must_use]
    pub fn postback_route(&self, payload: &str) -> Option<&RouteTarget> {
        self.routes
            .iter()
            .find(|(route, _)| route.matches(payload))
            .map(|(_, target)| target)
    }

    /// Resolve the head token of a message against the registered commands.
    #[must_use]
    pub fn resolve(&self, head: &str, prefix: &str) -> Resolution {
        if head.is_empty() {
            return Resolution::NoMatch;
        }
        if !prefix.is_empty() {
            if let Some(stripped) = head.strip_prefix(prefix) {
                if let Some(command) = self.command(stripped) {
                    return if command.spec().use_prefix {
                        Resolution::Matched(command)
                    } else {
                        Resolution::PrefixNotRequired(command.spec().name.clone())
                    };
                }
            }
        }
        match self.command(head) {
            Some(command) if !command.spec().use_prefix => Resolution::Matched(command),
            _ => Resolution::NoMatch,
        }
    }

    /// Command by case-insensitive name.
    #[must_use]
    pub fn command(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.command_index
            .get(&name.to_lowercase())
            .and_then(|&idx| self.commands.get(idx))
            .cloned()
    }

    /// Event handler by key.
    #[must_use]
    pub fn event(&self, key: &str) -> Option<Arc<dyn EventHandler>> {
        self.event_index
            .get(&key.to_lowercase())
            .and_then(|&idx| self.events.get(idx))
            .cloned()
    }

    /// Commands in registration order.
    #[must_use]
    pub fn commands(&self) -> &[Arc<dyn Command>] {
        &self.commands
    }

    /// Event handlers in registration order.
    #[must_use]
    pub fn events(&self) -> &[Arc<dyn EventHandler>] {
        &self.events
    }

    /// Largest default command cooldown in seconds.
    #[must_use]
    pub fn max_command_cooldown(&self) -> u64 {
        self.commands
            .iter()
            .map(|command| command.spec().cooldown_secs)
            .max()
            .unwrap_or(0)
    }
}
