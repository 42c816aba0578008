use crate::config::BotSettings;
use crate::graph::GraphMessenger;
use crate::webhook::{router, WebhookState};
use anyhow::{Context, Result};
use pagebot_core::builtin::register_builtins;
use pagebot_core::logging::LogControl;
use pagebot_core::{Dispatcher, HandlerRegistry, Messenger, Services};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Build the dispatcher with every built-in handler registered.
///
/// # Errors
///
/// Returns an error if the built-in handlers fail to register.
pub fn build_dispatcher(
    settings: &BotSettings,
    messenger: Arc<dyn Messenger>,
    logs: Option<Arc<dyn LogControl>>,
) -> Result<Dispatcher> {
    let mut services = Services::new(messenger, settings.router.as_ref().clone());
    if let Some(logs) = logs {
        services = services.with_log_control(logs);
    }

    let mut registry = HandlerRegistry::new();
    register_builtins(&mut registry).context("Failed to register built-in handlers")?;
    info!(
        commands = registry.commands().len(),
        events = registry.events().len(),
        "Handlers registered"
    );

    Ok(Dispatcher::new(services, Arc::new(registry)))
}

/// Run the webhook server until Ctrl-C.
///
/// `logs` lets admins toggle debug logging at runtime.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_server(
    settings: Arc<BotSettings>,
    logs: Option<Arc<dyn LogControl>>,
) -> Result<()> {
    let messenger: Arc<dyn Messenger> = Arc::new(GraphMessenger::new(&settings.messenger));
    info!("Graph API client initialized.");

    let dispatcher = build_dispatcher(&settings, messenger, logs)?;
    if settings.router.maintenance {
        info!("Starting in maintenance mode");
    }

    let cancel = CancellationToken::new();
    let sweeper = dispatcher.spawn_sweeper(cancel.clone());

    let app = router(WebhookState::new(
        dispatcher,
        &settings.messenger.verify_token,
    ));
    let addr = settings.messenger.listen_addr.as_str();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind webhook server on {addr}"))?;

    info!("Bot is running on {addr}...");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        error!("Sweeper task failed: {}", e);
    }
    served.context("Webhook server error")?;

    info!("Bot stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
