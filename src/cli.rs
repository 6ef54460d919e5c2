//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, init, validate, health), and their associated
//! argument structs. Every `run` flag has an environment variable
//! equivalent for container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::model::RedirectMode;

#[derive(Parser)]
#[command(
    name = "edge-forwarder",
    version,
    about = "Streaming reverse proxy for edge hostnames",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        edge-forwarder init                                Create a starter config\n  \
        edge-forwarder run                                 Start with ./edge-forwarder.yaml\n  \
        edge-forwarder run --backend-base https://app      Forward everything to one origin"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the forwarder
    Run(Box<RunArgs>),

    /// Generate a starter config file
    Init(InitArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        edge-forwarder run                                        Auto-detect config\n  \
        edge-forwarder run -c forwarder.toml -p 8080 --pretty     Local dev mode\n  \
        edge-forwarder run --backend-base https://backend.internal\n  \
        edge-forwarder run --target-host b.example.net --target-scheme https")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Listen address
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // -- Routing --
    /// Forward every request to this base URL (fixed-origin policy)
    #[arg(
        long,
        env = "BACKEND_BASE",
        conflicts_with = "target_host",
        help_heading = "Routing"
    )]
    pub backend_base: Option<String>,

    /// Replace the inbound hostname with this host (rewrite-origin policy)
    #[arg(long, env = "TARGET_HOST", help_heading = "Routing")]
    pub target_host: Option<String>,

    /// Scheme forced on rewritten requests
    #[arg(
        long,
        env = "TARGET_SCHEME",
        requires = "target_host",
        help_heading = "Routing"
    )]
    pub target_scheme: Option<String>,

    // -- Upstream --
    /// Origin response deadline in milliseconds (0 disables it)
    #[arg(long, env = "ORIGIN_TIMEOUT_MS", help_heading = "Upstream")]
    pub timeout_ms: Option<u64>,

    /// Relay origin redirects or follow them
    #[arg(long, env = "REDIRECT_MODE", help_heading = "Upstream")]
    pub redirect: Option<RedirectMode>,

    /// Shared secret sent to the origin on every fixed-origin request
    #[arg(
        long,
        env = "ORIGIN_SECRET",
        hide_env_values = true,
        help_heading = "Upstream"
    )]
    pub secret: Option<String>,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        edge-forwarder init                              Fixed-origin config (yaml)\n  \
        edge-forwarder init --rewrite                    Rewrite-origin config\n  \
        edge-forwarder init -f toml -o forwarder.toml    TOML format, custom path")]
pub struct InitArgs {
    /// Output format
    #[arg(short, long, default_value = "yaml")]
    pub format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Generate a rewrite-origin template instead of a fixed-origin one
    #[arg(long)]
    pub rewrite: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "edge-forwarder.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// URL of the running instance
    #[arg(default_value = "http://localhost:3000")]
    pub url: String,

    /// Health endpoint path on the instance
    #[arg(long, default_value = crate::config::model::DEFAULT_HEALTH_PATH)]
    pub path: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "edge-forwarder",
            "run",
            "--backend-base",
            "https://backend.internal",
            "--timeout-ms",
            "2500",
            "--redirect",
            "follow",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.backend_base.as_deref(), Some("https://backend.internal"));
        assert_eq!(args.timeout_ms, Some(2500));
        assert_eq!(args.redirect, Some(RedirectMode::Follow));
    }

    #[test]
    fn backend_base_conflicts_with_target_host() {
        let result = Cli::try_parse_from([
            "edge-forwarder",
            "run",
            "--backend-base",
            "https://backend.internal",
            "--target-host",
            "b.example.net",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn health_path_defaults_to_forwarder_endpoint() {
        let cli = Cli::try_parse_from(["edge-forwarder", "health"]).unwrap();
        let Some(Commands::Health(args)) = cli.command else {
            panic!("expected health");
        };
        assert_eq!(args.path, "/_forwarder/health");
        assert_eq!(args.url, "http://localhost:3000");
    }
}
