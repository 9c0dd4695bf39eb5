//! Telemetry initialization (tracing/tracing-subscriber).
//!
//! - LOG_LEVEL: filter directives, e.g. "debug" or
//!   "info,session=debug,challenge=debug,smartdoc=debug,tower_http=info".
//! - LOG_FORMAT: "pretty" (default) or "json".
//!
//! Targets in use: `smartdoc` (service/transport), `session` (chat memory and
//! document lifecycle), `challenge` (question generation and grading).

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,session=debug,challenge=debug,smartdoc=debug,tower_http=info,axum=info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_env_value(v: Option<&str>) -> Self {
        match v.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // The two builders have different types, so each arm initializes its own.
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
    tracing::debug!(target: "smartdoc", ?format, "Tracing initialized");
}
