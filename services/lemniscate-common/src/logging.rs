//! Logging setup for the scanner binary.
//!
//! Two output formats: `pretty` for terminals and `json` (one flattened
//! object per event) for log shippers. HTTP and TLS internals are pinned to
//! `warn` so a scan at `debug` shows per-ticker scoring, not socket chatter.
//! `RUST_LOG` replaces the computed filter entirely when set.

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Targets always capped at `warn`.
pub const NOISY_MODULES: &[&str] = &[
    "hyper",
    "hyper_util",
    "reqwest",
    "h2",
    "rustls",
    "tower_http",
];

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format {:?}", other)),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

fn filter_directives(log_level: &str, excluded_targets: &[String]) -> String {
    std::iter::once(log_level.to_string())
        .chain(
            NOISY_MODULES
                .iter()
                .map(|m| m.to_string())
                .chain(excluded_targets.iter().cloned())
                .map(|target| format!("{}=warn", target)),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber.
pub fn init_logging(log_level: &str, log_format: &str) {
    init_logging_with_exclusions(log_level, log_format, &[]);
}

/// Install the global subscriber, also capping `excluded_targets` at `warn`.
///
/// An unknown format falls back to `pretty`. A second call is a no-op.
pub fn init_logging_with_exclusions(
    log_level: &str,
    log_format: &str,
    excluded_targets: &[String],
) {
    let format = log_format.parse::<LogFormat>().unwrap_or_default();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(log_level, excluded_targets)));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_target(true)
                    .with_current_span(false),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    if installed.is_ok() {
        tracing::info!(
            log_level,
            log_format = %format,
            capped_targets = NOISY_MODULES.len() + excluded_targets.len(),
            "Logging initialized"
        );
    }
}
