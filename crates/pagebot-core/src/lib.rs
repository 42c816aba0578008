#![deny(missing_docs)]
//! Pagebot core library.
//!
//! Event model, handler contracts and the dispatch / admission-control core
//! that decides which handler runs for an inbound webhook event.

/// Built-in command and event handlers.
pub mod builtin;
/// Configuration management.
pub mod config;
/// Per-user command and postback cooldowns.
pub mod cooldown;
/// Routing state machine.
pub mod dispatcher;
/// Inbound webhook event model.
pub mod event;
/// Handler contracts and execution context.
pub mod handler;
/// Per-user single-flight execution locks.
pub mod locks;
/// Runtime log verbosity switch.
pub mod logging;
/// Reply / reaction enrichment cache.
pub mod message_cache;
/// Outbound messaging contract.
pub mod messenger;
/// Handler registry and command resolution.
pub mod registry;
/// Pending reply sessions.
pub mod replies;
/// Runtime bot state (maintenance, blacklist, usage).
pub mod state;
/// Utility functions.
pub mod utils;

pub use dispatcher::{DispatchOutcome, Dispatcher, DropReason, Rejection};
pub use event::{EventType, InboundEvent, UserId, WebhookPayload};
pub use handler::{
    Command, CommandSpec, EventHandler, EventSpec, HandlerContext, HandlerError, PostbackOutcome,
    Services,
};
pub use messenger::{Messenger, MessengerError, SenderAction};
pub use registry::{HandlerRegistry, RegistryError};
