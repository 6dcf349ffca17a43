//! Logging configuration utilities.
//!
//! Configures the tracing-based logging system used by the shoalfs
//! daemons and tools.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive, e.g. "info" or "shoalfs_meta=debug".
    /// `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Whether to include target (module path).
    pub target: bool,
    /// Whether to output in JSON format.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            target: true,
            json: false,
        }
    }
}

impl LogConfig {
    /// Creates a new log configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter directive.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Enables or disables JSON output format.
    #[must_use]
    pub const fn with_json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }
}

/// Initializes the logging system with the given configuration.
///
/// This should be called once at the start of the application.
///
/// # Panics
///
/// Panics if the logging system has already been initialized.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.clone()));

    if config.json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(config.target));
        tracing::subscriber::set_global_default(subscriber)
            .expect("failed to set global subscriber");
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(config.target));
        tracing::subscriber::set_global_default(subscriber)
            .expect("failed to set global subscriber");
    }
}

/// Tries to initialize logging, ignoring errors if already initialized.
///
/// Useful in tests where multiple tests might try to initialize logging.
pub fn try_init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter.clone()));

    if config.json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(config.target));
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(config.target));
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
