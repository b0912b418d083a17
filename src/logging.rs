//! Log subscriber setup for binaries embedding the tracer
//!
//! The library itself only emits `tracing` events (dropped events, retries,
//! rejections). Installing a subscriber is left to the host; this helper does
//! it the usual way for the bundled binary and for hosts without their own.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
const DEFAULT_FILTER: &str = "info,taskscope=debug";

/// Output format for the console layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else is text
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Use `directives` when they parse, the default filter otherwise
fn build_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install a global subscriber with an env filter and a console layer
///
/// # Arguments
/// * `service_name` - Recorded in the startup log line
/// * `format` - Human-readable text or one JSON object per line
///
/// # Example
/// ```ignore
/// init_logging("taskscope", LogFormat::Text)?;
/// ```
pub fn init_logging(
    service_name: &str,
    format: LogFormat,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = build_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref());

    match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?,
    }

    tracing::info!(service = service_name, ?format, "Logging initialized");
    Ok(())
}
