//! Runtime log verbosity control.
//!
//! The process owns the subscriber; the core only asks it to switch between
//! the production filter and the debug filter.

use thiserror::Error;

/// Errors raised while swapping the active log filter
#[derive(Debug, Error)]
pub enum LogControlError {
    /// The filter could not be swapped
    #[error("Log filter reload failed: {0}")]
    Reload(String),
}

/// Switch for debug logging, installed by the binary.
#[cfg_attr(test, mockall::automock)]
pub trait LogControl: Send + Sync {
    /// Turn debug logging on or off.
    ///
    /// # Errors
    ///
    /// Returns [`LogControlError`] if the subscriber rejected the new filter.
    fn set_debug(&self, enabled: bool) -> Result<(), LogControlError>;

    /// Whether debug logging is currently on.
    fn debug_enabled(&self) -> bool;
}
