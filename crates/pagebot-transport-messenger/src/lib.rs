#![deny(missing_docs)]
//! Messenger Platform transport adapter for Pagebot.

/// Messenger transport configuration.
pub mod config;
/// Graph Send API client.
pub mod graph;
/// Server runtime entrypoint.
pub mod runner;
/// Webhook HTTP surface.
pub mod webhook;
