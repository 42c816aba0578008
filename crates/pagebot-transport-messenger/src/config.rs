//! Messenger transport settings.

use config::ConfigError;
use pagebot_core::config::RouterSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Graph API version used when none is configured.
pub const DEFAULT_GRAPH_API_VERSION: &str = "v22.0";
/// Graph API host.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com";
/// Address the webhook server binds to.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Initial backoff (ms) between Send API retries.
pub const SEND_API_INITIAL_BACKOFF_MS: u64 = 200;
/// Upper bound (ms) on a single Send API backoff.
pub const SEND_API_MAX_BACKOFF_MS: u64 = 5_000;
/// Number of retries after the first failed Send API call.
pub const SEND_API_MAX_RETRIES: usize = 3;
/// Timeout (seconds) for a single Send API request.
pub const SEND_API_TIMEOUT_SECS: u64 = 30;

/// Messenger transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct MessengerSettings {
    /// Page access token used for the Send API.
    #[serde(default)]
    pub page_access_token: String,
    /// Token expected in the webhook verification handshake.
    #[serde(default)]
    pub verify_token: String,
    /// Graph API version, e.g. `v22.0`.
    #[serde(default = "default_graph_api_version")]
    pub graph_api_version: String,
    /// Graph API base URL.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
    /// Socket address for the webhook server.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_graph_api_version() -> String {
    DEFAULT_GRAPH_API_VERSION.to_string()
}

fn default_graph_base_url() -> String {
    DEFAULT_GRAPH_BASE_URL.to_string()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

impl MessengerSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        pagebot_core::config::build_config()?.try_deserialize()
    }

    /// Send API endpoint without the access token.
    #[must_use]
    pub fn send_api_url(&self) -> String {
        format!(
            "{}/{}/me/messages",
            self.graph_base_url.trim_end_matches('/'),
            self.graph_api_version
        )
    }

    /// Send API request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(SEND_API_TIMEOUT_SECS)
    }
}

/// Combined settings used by the transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Router settings shared with the dispatcher.
    pub router: Arc<RouterSettings>,
    /// Messenger-specific settings.
    pub messenger: Arc<MessengerSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(router: RouterSettings, messenger: MessengerSettings) -> Self {
        Self {
            router: Arc::new(router),
            messenger: Arc::new(messenger),
        }
    }
}
