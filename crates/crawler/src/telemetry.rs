// Logging setup for crawler binaries
//
// Console logging through tracing-subscriber with an env-driven filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default log filter when neither `RUST_LOG` nor `LOG_LEVEL` is set
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Whether to enable console logging
    pub enable_console: bool,
    /// Log filter (e.g., "info", "debug", "crawler=debug")
    pub log_filter: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "crawler".to_string(),
            enable_console: true,
            log_filter: None,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SERVICE_NAME`: Service name (default: "crawler")
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            service_name: lookup("SERVICE_NAME").unwrap_or_else(|| "crawler".to_string()),
            enable_console: true,
            log_filter: lookup("RUST_LOG").or_else(|| lookup("LOG_LEVEL")),
        }
    }

    /// Filter built from `log_filter`, falling back to [`DEFAULT_LOG_FILTER`]
    /// when it is unset or does not parse
    pub fn env_filter(&self) -> EnvFilter {
        self.log_filter
            .as_ref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Install the global tracing subscriber
///
/// Returns `false` when a subscriber was already installed, e.g. by a test
/// harness; logging then goes to that subscriber.
///
/// # Example
///
/// ```ignore
/// use crawler::telemetry::{init_tracing, TelemetryConfig};
///
/// #[tokio::main]
/// async fn main() {
///     init_tracing(TelemetryConfig::from_env());
///     // ... your application code
/// }
/// ```
pub fn init_tracing(config: TelemetryConfig) -> bool {
    let console_layer = if config.enable_console {
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(config.env_filter()),
        )
    } else {
        None
    };

    let installed = tracing_subscriber::registry()
        .with(console_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %config.service_name, "Tracing initialized");
    }
    installed
}
