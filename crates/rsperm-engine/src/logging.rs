//! Structured logging initialization.
//!
//! Wires `tracing-subscriber` according to [`LoggingSettings`]: JSON
//! output for production, pretty text for development. `RUST_LOG` takes
//! precedence over the configured default level.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingSettings;

/// Initializes the global tracing subscriber.
///
/// Call once at process startup; later calls are no-ops because the
/// global subscriber can only be installed once.
pub fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.level.clone()));

    if settings.json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_current_span(true));
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_target(true));
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
