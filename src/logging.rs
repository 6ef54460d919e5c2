//! Structured logging setup using the `tracing` ecosystem.
//!
//! Configures a `tracing-subscriber` with either JSON output (for
//! production) or pretty-printed output (for a TTY). The format is
//! auto-detected from the terminal but can be forced via `--json` or
//! `--pretty`.

use tracing_subscriber::filter::Targets;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[must_use]
pub fn resolve_format(pretty: bool, json: bool) -> LogFormat {
    if json {
        LogFormat::Json
    } else if pretty || std::io::IsTerminal::is_terminal(&std::io::stdout()) {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

/// Filter for the forwarder's own events. hyper and rustls stay at `warn`
/// unless the level is `trace`, so connection-pool chatter does not drown
/// per-request lines.
#[must_use]
pub fn filter(level: LogLevel) -> Targets {
    let tracing_level = level.to_tracing_level();
    let noisy = if level == LogLevel::Trace {
        tracing::Level::TRACE
    } else {
        tracing::Level::WARN
    };
    Targets::new()
        .with_default(tracing_level)
        .with_target("hyper", noisy)
        .with_target("hyper_util", noisy)
        .with_target("rustls", noisy)
}

pub fn init(level: LogLevel, format: LogFormat) {
    let targets = filter(level);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(targets)
                .with(fmt::layer().json().with_target(false))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(targets)
                .with(fmt::layer().pretty())
                .init();
        }
    }
}
