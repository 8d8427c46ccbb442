use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a log level, case-insensitive
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Build the filter directive used when `RUST_LOG` is not set
fn default_directive(log_mode: &str) -> String {
    let level = LogLevel::parse(log_mode).unwrap_or_default();
    format!("socks4a_proxy={}", level.as_str())
}

/// Install the global subscriber. Diagnostics go to stderr.
pub fn init_logger(log_mode: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_mode)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(true)
                .with_ansi(true)
                .compact(),
        )
        .init();
}

pub mod log {
    pub use tracing::{debug, error, info, trace, warn};

    /// Connection lifecycle event
    pub fn connection(peer: &str, event: &str) {
        debug!(peer = peer, event = event, "Connection");
    }

    /// Session teardown, mirrors the successful-connect line
    pub fn closing(description: &str) {
        info!("Closing {}", description);
    }

    /// Request rejected while parsing the handshake
    pub fn protocol(peer: &str, error: &str) {
        warn!(peer = peer, "Connection error: while parsing request: {}", error);
    }

    /// Basic credential observed in clear-text HTTP
    pub fn credential(peer: &str, url: &str) {
        info!(peer = peer, "Password Found! {}", url);
    }
}
