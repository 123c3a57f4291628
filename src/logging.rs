//! # Structured Logging Module
//!
//! Environment-aware structured logging for the provisioning client and CLI.

use chrono::Utc;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::progress::tracker::TrackerState;
use crate::types::CreationId;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging.
///
/// `RUST_LOG` wins over `default_level` when set. With `json` the console
/// output is newline-delimited JSON, suitable for log shipping.
pub fn init_structured_logging(default_level: &str, json: bool) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = || {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        };

        let console = if json {
            fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .json()
                .with_filter(filter())
                .boxed()
        } else {
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_filter(filter())
                .boxed()
        };

        // Use try_init to avoid panic if global subscriber already set
        if tracing_subscriber::registry().with(console).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
        }

        tracing::debug!(
            environment = %environment,
            json = json,
            "Structured logging initialized"
        );
    });
}

/// Map a `-v` count to a tracing level directive
pub fn level_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("TENANT_SIGNUP_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Log a tracker state transition with structured fields
pub fn log_tracker_transition(
    from: TrackerState,
    to: TrackerState,
    creation_id: Option<&CreationId>,
    details: Option<&str>,
) {
    let creation_id = creation_id.map(CreationId::as_str);
    match to {
        TrackerState::Failed | TrackerState::TimedOut => tracing::warn!(
            from = %from,
            to = %to,
            creation_id = creation_id,
            details = details,
            timestamp = %Utc::now().to_rfc3339(),
            "TRACKER_TRANSITION"
        ),
        _ => tracing::info!(
            from = %from,
            to = %to,
            creation_id = creation_id,
            details = details,
            timestamp = %Utc::now().to_rfc3339(),
            "TRACKER_TRANSITION"
        ),
    }
}
