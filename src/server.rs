//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the frozen
//! settings, HTTP client, stats, uptime and the shutdown receiver),
//! [`build_router`] for the health route plus the forwarding fallback,
//! [`build_http_client`] for the connection-pooled hyper client, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::settings::Settings;
use crate::config::ConfigVersion;
use crate::health::health_handler;
use crate::proxy;

#[derive(Debug)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    /// Subset of `failed` where the origin deadline elapsed.
    pub timed_out: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
        }
    }
}

pub type HttpsConnector =
    hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>;
/// Request bodies are streamed through as [`axum::body::Body`], never buffered.
pub type HttpClient = Client<HttpsConnector, axum::body::Body>;

pub struct AppState {
    pub settings: Settings,
    pub http_client: HttpClient,
    pub start_time: Instant,
    pub config_source: String,
    pub config_version: ConfigVersion,
    pub stats: Stats,
    /// Flips to `true` once shutdown starts; in-flight dispatches abort.
    pub shutdown: watch::Receiver<bool>,
}

impl AppState {
    #[must_use]
    pub fn new(
        settings: Settings,
        config_source: String,
        config_version: ConfigVersion,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settings,
            http_client: build_http_client(),
            start_time: Instant::now(),
            config_source,
            config_version,
            stats: Stats::new(),
            shutdown,
        }
    }
}

#[must_use]
pub fn build_http_client() -> HttpClient {
    // When multiple rustls crypto providers are compiled in, rustls cannot
    // pick one on its own. Install `ring` explicitly.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .build();
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let router = match state.settings.health_path.as_deref() {
        Some(path) => Router::new().route(path, get(health_handler)),
        None => Router::new(),
    };

    router
        .fallback(proxy::forward_handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
