//! `edge-forwarder run`: start the forwarder.
//!
//! Loads the optional config file, layers CLI / environment overrides on
//! top, freezes the result into [`Settings`] and serves until Ctrl+C or
//! SIGTERM. Shutdown is broadcast over a watch channel so in-flight origin
//! calls abort instead of holding the process open.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::model::{Config, PolicyConfig};
use crate::config::settings::Settings;
use crate::config::sources::{self, AUTO_DETECT_CANDIDATES};
use crate::config::ConfigVersion;
use crate::error::ForwarderError;
use crate::logging;
use crate::server::{self, AppState};

pub async fn execute(args: RunArgs) -> Result<(), ForwarderError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(args.log_level, log_format);

    let (mut config, source_name, version) = load_config(args.config.as_deref()).await?;
    apply_overrides(&mut config, &args);

    if config.policy.is_none() {
        return Err(ForwarderError::NoConfigSource {
            hint: "Provide --backend-base <url>, --target-host <host>, or --config <file>.\n  \
                   Run 'edge-forwarder init' to create a config file."
                .into(),
        });
    }

    let settings = Settings::from_config(&config)?;
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        policy = settings.policy.mode(),
        origin = %settings.policy.origin(),
        timeout_ms = settings
            .timeout
            .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
        redirect = settings.redirect.as_str(),
        config_source = %source_name,
        config_version = version.short(),
        "edge-forwarder started"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let state = Arc::new(AppState::new(settings, source_name, version, shutdown_rx));
    let router = server::build_router(state);

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    tracing::info!("edge-forwarder stopped");
    Ok(())
}

/// Read the config file if one is given or found in the working directory.
/// With neither, start from defaults and let the flags supply the policy.
async fn load_config(
    explicit: Option<&Path>,
) -> Result<(Config, String, ConfigVersion), ForwarderError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => auto_detect().await,
    };

    let Some(path) = path else {
        return Ok((Config::default(), "flags".to_string(), ConfigVersion::Inline));
    };

    let source = sources::for_path(&path)?;
    let (config, version) = source.load().await?;
    tracing::debug!(
        path = %source.path().display(),
        format = source.name(),
        "config file loaded"
    );
    Ok((config, format!("file:{}", path.display()), version))
}

async fn auto_detect() -> Option<PathBuf> {
    for name in AUTO_DETECT_CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return Some(path);
        }
    }
    None
}

/// Layer flag and environment values over whatever the file provided.
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(base_url) = &args.backend_base {
        config.policy = Some(PolicyConfig::Fixed {
            base_url: base_url.clone(),
        });
    }

    if let Some(target_host) = &args.target_host {
        let scheme = args
            .target_scheme
            .clone()
            .or_else(|| match &config.policy {
                Some(PolicyConfig::Rewrite { scheme, .. }) => Some(scheme.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "https".to_string());
        config.policy = Some(PolicyConfig::Rewrite {
            target_host: target_host.clone(),
            scheme,
        });
    }

    if let Some(timeout_ms) = args.timeout_ms {
        config.upstream.timeout_ms = Some(timeout_ms);
    }
    if let Some(redirect) = args.redirect {
        config.upstream.redirect = Some(redirect);
    }
    if let Some(secret) = &args.secret {
        config.forwarding.secret = Some(secret.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::config::model::RedirectMode;
    use clap::Parser;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["edge-forwarder", "run"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Some(Commands::Run(args)) => *args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn backend_base_selects_fixed_policy() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            &run_args(&["--backend-base", "https://backend.internal"]),
        );
        assert_eq!(
            config.policy,
            Some(PolicyConfig::Fixed {
                base_url: "https://backend.internal".into()
            })
        );
    }

    #[test]
    fn target_host_keeps_file_scheme_unless_overridden() {
        let mut config = Config {
            policy: Some(PolicyConfig::Rewrite {
                target_host: "old.example.net".into(),
                scheme: "http".into(),
            }),
            ..Config::default()
        };
        apply_overrides(&mut config, &run_args(&["--target-host", "b.example.net"]));
        assert_eq!(
            config.policy,
            Some(PolicyConfig::Rewrite {
                target_host: "b.example.net".into(),
                scheme: "http".into(),
            })
        );

        apply_overrides(
            &mut config,
            &run_args(&["--target-host", "b.example.net", "--target-scheme", "https"]),
        );
        assert!(matches!(
            config.policy,
            Some(PolicyConfig::Rewrite { ref scheme, .. }) if scheme == "https"
        ));
    }

    #[test]
    fn upstream_flags_override_file_values() {
        let mut config = Config::default();
        config.upstream.timeout_ms = Some(1000);
        apply_overrides(
            &mut config,
            &run_args(&["--timeout-ms", "0", "--redirect", "follow", "--secret", "s3cr3t"]),
        );
        assert_eq!(config.upstream.timeout_ms, Some(0));
        assert_eq!(config.upstream.redirect, Some(RedirectMode::Follow));
        assert_eq!(config.forwarding.secret.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn absent_flags_leave_config_untouched() {
        let mut config = Config::default();
        config.upstream.timeout_ms = Some(1000);
        apply_overrides(&mut config, &run_args(&[]));
        assert_eq!(config.upstream.timeout_ms, Some(1000));
        assert!(config.policy.is_none());
    }
}
