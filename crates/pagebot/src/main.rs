use dotenvy::dotenv;
use pagebot_core::config::RouterSettings;
use pagebot_core::logging::{LogControl, LogControlError};
use pagebot_transport_messenger::config::{BotSettings, MessengerSettings};
use pagebot_transport_messenger::runner::run_server;
use regex::Regex;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, reload, EnvFilter, Registry};

const PRODUCTION_FILTER: &str = "pagebot=info,pagebot_core=info,pagebot_transport_messenger=info,\
hyper=warn,h2=error,reqwest=warn,tokio=warn,tower=warn,axum=warn";
const DEBUG_FILTER: &str = "debug";

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    query_token: Regex,
    page_token: Regex,
    env_page_token: Regex,
    env_verify_token: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            query_token: Regex::new(r#"(access_token=)[^&\s"']+"#)?,
            page_token: Regex::new(r"EAA[A-Za-z0-9]{20,}")?,
            env_page_token: Regex::new(r"PAGE_ACCESS_TOKEN=[^\s&]+")?,
            env_verify_token: Regex::new(r"VERIFY_TOKEN=[^\s&]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .query_token
            .replace_all(&output, "$1[MASKED]")
            .to_string();
        output = self
            .page_token
            .replace_all(&output, "[PAGE_TOKEN]")
            .to_string();
        output = self
            .env_page_token
            .replace_all(&output, "PAGE_ACCESS_TOKEN=[MASKED]")
            .to_string();
        output = self
            .env_verify_token
            .replace_all(&output, "VERIFY_TOKEN=[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // The caller's buffer was consumed even though fewer or more bytes went out.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

/// Swaps the global `EnvFilter` through a reload handle.
struct ReloadLogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    /// Directives active at startup, restored when debug is switched off.
    base: String,
    debug: AtomicBool,
}

impl ReloadLogControl {
    fn new(handle: reload::Handle<EnvFilter, Registry>, base: String, debug: bool) -> Self {
        Self {
            handle,
            base,
            debug: AtomicBool::new(debug),
        }
    }
}

impl LogControl for ReloadLogControl {
    fn set_debug(&self, enabled: bool) -> Result<(), LogControlError> {
        let directives = if enabled { DEBUG_FILTER } else { self.base.as_str() };
        self.handle
            .reload(EnvFilter::new(directives))
            .map_err(|e| LogControlError::Reload(e.to_string()))?;
        self.debug.store(enabled, Ordering::Relaxed);
        Ok(())
    }

    fn debug_enabled(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // Patterns must exist before the first log line.
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    let logs = init_logging(patterns);

    info!("Starting Pagebot...");

    let settings = init_settings();

    run_server(settings, Some(logs)).await?;

    Ok(())
}

fn debug_mode_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("true" | "1"))
}

fn init_logging(patterns: Arc<RedactionPatterns>) -> Arc<dyn LogControl> {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);

    let debug_mode = debug_mode_enabled(std::env::var("DEBUG_MODE").ok().as_deref());

    let base = EnvFilter::try_from_default_env()
        .map_or_else(|_| PRODUCTION_FILTER.to_string(), |filter| filter.to_string());
    let filter = if debug_mode {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::new(&base)
    };
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();

    Arc::new(ReloadLogControl::new(handle, base, debug_mode))
}

fn init_settings() -> Arc<BotSettings> {
    let router_settings = match RouterSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load router configuration: {}", e);
            std::process::exit(1);
        }
    };
    let messenger_settings = match MessengerSettings::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load messenger configuration: {}", e);
            std::process::exit(1);
        }
    };
    if messenger_settings.page_access_token.is_empty() {
        error!("PAGE_ACCESS_TOKEN is not set");
        std::process::exit(1);
    }

    info!(
        admins = router_settings.admins().len(),
        prefix = %router_settings.prefix,
        "Configuration loaded successfully."
    );
    Arc::new(BotSettings::new(router_settings, messenger_settings))
}
