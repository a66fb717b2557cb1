//! # Observability
//!
//! Shared logging setup for Xase binaries.
//!
//! Libraries in this workspace only emit events through `tracing` macros and
//! never install a subscriber. Binaries call `observability::init()` once at
//! startup; events go to stderr so stdout stays free for command output.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init("xase-cli");
//!     tracing::info!("ready");
//! }
//! ```
//!
//! Or with configuration:
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "xase-cli".into(),
//!     default_level: "debug".into(),
//!     json: true,
//! });
//! ```

use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::EnvFilter;

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "xase-cli").
    /// Logged once at startup.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Emit one JSON object per line instead of compact text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            json: false,
        }
    }
}

/// Initialize logging with default settings.
///
/// Does nothing if a global subscriber is already installed.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize logging with custom configuration.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_with_config(config: LogConfig) {
    let _ = try_init_with_config(config);
}

/// Like [`init_with_config`], but reports a subscriber that is already set.
pub fn try_init_with_config(config: LogConfig) -> Result<(), TryInitError> {
    let filter = build_filter(&config.default_level);

    if config.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .finish()
            .try_init()?;
    } else {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .finish()
            .try_init()?;
    }

    tracing::debug!(
        service = %config.service_name,
        pid = std::process::id(),
        "Logging initialized"
    );
    Ok(())
}

/// `RUST_LOG` when set and valid, else `default_level` parsed leniently.
fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_level(default_level).to_string().to_lowercase()))
}

/// Map a level name to a [`Level`].
///
/// Case-insensitive; `warning` is accepted for `warn`, anything unknown is
/// `INFO`.
pub fn parse_level(raw: &str) -> Level {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Re-export tracing macros for convenience.
/// Services can use `observability::info!()` or `tracing::info!()`.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;
