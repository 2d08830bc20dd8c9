//! Process-wide tracing setup for both roles.

use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::TelemetryConfig;

/// Transport crates that are chatty at `debug`; kept at `warn` unless `RUST_LOG` says otherwise.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "hyper_util=warn", "reqwest=warn", "h2=warn"];

/// Event encoding on stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Single-line human output for local runs.
    Compact,
    /// One JSON object per event, for log shippers.
    Json,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" | "pretty" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("log filter '{directive}' is not a valid tracing directive")]
    Directive {
        directive: String,
        #[source]
        source: ParseError,
    },
    #[error("a global subscriber is already installed")]
    AlreadyInstalled(#[from] TryInitError),
}

/// `RUST_LOG` verbatim when set; otherwise the configured level with transport crates quieted.
pub fn event_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }

    let invalid = |directive: &str, source| TelemetryError::Directive {
        directive: directive.to_string(),
        source,
    };
    let mut filter =
        EnvFilter::try_new(&config.log_level).map_err(|source| invalid(&config.log_level, source))?;
    for quiet in QUIET_DEPENDENCIES {
        let directive: Directive = quiet.parse().map_err(|source| invalid(quiet, source))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn output_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_ansi(false)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
    }
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = event_filter(config)?;
    tracing_subscriber::registry()
        .with(output_layer(config.format))
        .with(filter)
        .try_init()?;
    Ok(())
}
