//! Dispatch results and user-facing rejection notices.

/// Sent when a non-admin writes during maintenance.
pub const MAINTENANCE_NOTICE: &str =
    "🔧 The bot is currently under maintenance. Please try again later.";
/// Sent when a non-admin invokes an admin-only command.
pub const NO_PERMISSION_NOTICE: &str = "You do not have permission to use this command.";
/// Sent when a command or reply handler fails.
pub const COMMAND_FAILED_NOTICE: &str = "An error occurred while executing the command.";
/// Sent when a postback handler fails.
pub const POSTBACK_FAILED_NOTICE: &str =
    "❌ An error occurred while processing your request. Please try again.";

/// Why an event was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Maintenance mode is on.
    Maintenance,
    /// Admin-only command invoked by a regular user.
    AdminOnly {
        /// Command name.
        command: String,
    },
    /// Command disabled at runtime.
    Disabled {
        /// Command name.
        command: String,
    },
    /// No-prefix command typed with the prefix.
    PrefixNotRequired {
        /// Command name.
        command: String,
    },
    /// Command cooldown still running.
    Cooldown {
        /// Command name.
        command: String,
        /// Seconds left.
        remaining_secs: u64,
    },
    /// Another command of this user is still running.
    CommandBusy {
        /// Label of the running command.
        running: String,
    },
    /// Another postback of this user is still running.
    PostbackBusy {
        /// Payload of the running postback.
        running: String,
    },
    /// Button cooldown still running.
    PostbackCooldown {
        /// Postback payload.
        payload: String,
        /// Seconds left.
        remaining_secs: u64,
    },
}

impl Rejection {
    /// Text sent to the user.
    #[must_use]
    pub fn notice(&self) -> String {
        match self {
            Self::Maintenance => MAINTENANCE_NOTICE.to_string(),
            Self::AdminOnly { .. } => NO_PERMISSION_NOTICE.to_string(),
            Self::Disabled { command } => {
                format!("❌ Command {command} is currently disabled by an administrator.")
            }
            Self::PrefixNotRequired { command } => format!(
                "The \"{command}\" command does not require a prefix. Please try again without it."
            ),
            Self::Cooldown { remaining_secs, .. } => format!(
                "Please wait {remaining_secs} second(s) before using this command again."
            ),
            Self::CommandBusy { running } => format!(
                "⏳ Please wait for your current command ({running}) to finish before using another command."
            ),
            Self::PostbackBusy { running } => format!(
                "⏳ Please wait for your current action ({running}) to finish before using another button."
            ),
            Self::PostbackCooldown { remaining_secs, .. } => format!(
                "⏳ Please wait {remaining_secs} second(s) before using this button again."
            ),
        }
    }
}

/// Why an event was ignored without a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The page's own message and self-listen is off.
    Echo,
    /// Sender is blacklisted.
    Blacklisted,
}

/// What the dispatcher did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A command ran.
    Command {
        /// Command name.
        name: String,
        /// Whether it returned without error.
        success: bool,
    },
    /// A pending reply session was delivered.
    Reply {
        /// Command that received the reply.
        command: String,
        /// Whether it returned without error.
        success: bool,
    },
    /// A postback was processed.
    Postback {
        /// Handler that claimed or failed it; `None` when unclaimed.
        handler: Option<String>,
        /// Whether handling finished without error.
        success: bool,
    },
    /// Event handlers ran.
    Events {
        /// Number of handlers that completed without error.
        ran: usize,
    },
    /// Refused with a notice.
    Rejected(Rejection),
    /// Ignored silently.
    Dropped(DropReason),
}
