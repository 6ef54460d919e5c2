//! Integration tests: a mock origin and the forwarder on ephemeral ports,
//! driven over real sockets with reqwest.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::OriginalUri;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use axum::{Json, Router};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{oneshot, watch};

use edge_forwarder::config::model::{Config, PolicyConfig, RedirectMode};
use edge_forwarder::config::settings::Settings;
use edge_forwarder::config::ConfigVersion;
use edge_forwarder::health::HealthResponse;
use edge_forwarder::server::{self, AppState};

// -- Mock origin --

async fn echo(method: Method, OriginalUri(uri): OriginalUri, headers: HeaderMap) -> Json<Value> {
    let headers: BTreeMap<String, String> = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    Json(serde_json::json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "headers": headers,
    }))
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "too late"
}

async fn upload(body: Bytes) -> Bytes {
    body
}

async fn stream_back(headers: HeaderMap, body: axum::body::Body) -> Response {
    let framing = headers
        .get(header::TRANSFER_ENCODING)
        .cloned()
        .unwrap_or(HeaderValue::from_static("none"));
    let mut response = Response::new(body);
    response.headers_mut().insert("x-origin-te", framing);
    response
}

async fn hop_headers() -> Response {
    (
        [
            ("keep-alive", "timeout=5"),
            ("proxy-connection", "keep-alive"),
            ("x-kept", "yes"),
        ],
        "ok",
    )
        .into_response()
}

async fn final_hop(method: Method) -> String {
    format!("final {method}")
}

async fn start_origin() -> SocketAddr {
    let router = Router::new()
        .route("/echo", any(echo))
        .route("/slow", get(slow))
        .route("/upload", post(upload))
        .route("/stream", post(stream_back))
        .route("/hop", get(hop_headers))
        .route(
            "/redirect",
            get(|| async { (StatusCode::FOUND, [(header::LOCATION, "/final")]) }),
        )
        .route(
            "/see-other",
            post(|| async { (StatusCode::SEE_OTHER, [(header::LOCATION, "/final")]) }),
        )
        .route("/final", any(final_hop))
        .fallback(|| async { (StatusCode::NOT_FOUND, "origin 404") })
        .layer(axum::extract::DefaultBodyLimit::disable());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Accepts one connection, never answers, and reports when the peer hangs up.
async fn start_silent_origin() -> (SocketAddr, oneshot::Receiver<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (closed_tx, closed_rx) = oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        while let Ok(n) = socket.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
        let _ = closed_tx.send(());
    });
    (addr, closed_rx)
}

/// Promises 100 body bytes, sends 7, then drops the connection.
async fn start_truncating_origin() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut head = Vec::new();
        let mut buf = [0u8; 4096];
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            head.extend_from_slice(&buf[..n]);
        }
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
            .await
            .unwrap();
        socket.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    });
    addr
}

fn decode_chunked(mut raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let line_end = raw.windows(2).position(|w| w == b"\r\n").unwrap();
        let size_line = std::str::from_utf8(&raw[..line_end]).unwrap();
        let size = usize::from_str_radix(size_line.split(';').next().unwrap().trim(), 16).unwrap();
        raw = &raw[line_end + 2..];
        if size == 0 {
            return out;
        }
        out.extend_from_slice(&raw[..size]);
        raw = &raw[size + 2..];
    }
}

// -- Forwarder --

struct Forwarder {
    addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl Forwarder {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn health(&self) -> HealthResponse {
        reqwest::get(self.url("/_forwarder/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap()
    }
}

fn fixed(origin: SocketAddr) -> Config {
    Config {
        policy: Some(PolicyConfig::Fixed {
            base_url: format!("http://{origin}"),
        }),
        ..Config::default()
    }
}

fn rewrite(origin: SocketAddr) -> Config {
    Config {
        policy: Some(PolicyConfig::Rewrite {
            target_host: origin.to_string(),
            scheme: "http".into(),
        }),
        ..Config::default()
    }
}

async fn start_forwarder(config: Config) -> Forwarder {
    let settings = Settings::from_config(&config).unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Arc::new(AppState::new(
        settings,
        "test".into(),
        ConfigVersion::Inline,
        shutdown_rx.clone(),
    ));
    let router = server::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut stop = shutdown_rx;
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop.wait_for(|v| *v).await;
        })
        .await
        .unwrap();
    });

    Forwarder {
        addr,
        shutdown: shutdown_tx,
    }
}

fn no_redirects() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

// -- Fixed origin --

#[tokio::test]
async fn fixed_origin_forwards_path_query_and_context() {
    let origin = start_origin().await;
    let fwd = start_forwarder(fixed(origin)).await;

    let resp = reqwest::get(fwd.url("/echo?x=1&y=%20z")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["x-proxy-origin"], origin.to_string().as_str());
    assert_eq!(resp.headers()["x-proxy-worker"], "edge-forwarder");
    assert_eq!(resp.headers()["x-proxy-policy"], "fixed");

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["method"], "GET");
    assert_eq!(body["uri"], "/echo?x=1&y=%20z");
    let headers = &body["headers"];
    assert_eq!(headers["host"], origin.to_string());
    assert_eq!(headers["x-forwarded-host"], "127.0.0.1");
    assert_eq!(headers["x-forwarded-proto"], "http");
    assert_eq!(headers["x-forwarded-uri"], "/echo?x=1&y=%20z");
    assert!(headers.get("x-worker-proxy-secret").is_none());
    assert!(headers.get("x-real-ip").is_none());

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn fixed_origin_sends_secret_and_real_ip() {
    let origin = start_origin().await;
    let mut config = fixed(origin);
    config.forwarding.secret = Some("s3cr3t".into());
    let fwd = start_forwarder(config).await;

    let body: Value = reqwest::Client::new()
        .get(fwd.url("/echo"))
        .header("cf-connecting-ip", "198.51.100.4")
        .header("x-forwarded-host", "spoofed.example")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let headers = &body["headers"];
    assert_eq!(headers["x-worker-proxy-secret"], "s3cr3t");
    assert_eq!(headers["x-real-ip"], "198.51.100.4");
    assert_eq!(headers["x-forwarded-host"], "127.0.0.1");

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn origin_status_passes_through() {
    let origin = start_origin().await;
    let fwd = start_forwarder(fixed(origin)).await;

    let resp = reqwest::get(fwd.url("/missing")).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text().await.unwrap(), "origin 404");

    let _ = fwd.shutdown.send(true);
}

// -- Rewrite origin --

#[tokio::test]
async fn rewrite_origin_spoofs_host_and_referer() {
    let origin = start_origin().await;
    let fwd = start_forwarder(rewrite(origin)).await;

    let resp = reqwest::Client::new()
        .post(fwd.url("/echo?q=1"))
        .header("referer", "http://a.example.net/page")
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.headers()["x-proxy-policy"], "rewrite");

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["method"], "POST");
    assert_eq!(body["uri"], "/echo?q=1");
    let headers = &body["headers"];
    assert_eq!(headers["host"], origin.to_string());
    assert_eq!(headers["referer"], format!("http://{origin}/"));
    assert!(headers.get("x-forwarded-host").is_none());

    let _ = fwd.shutdown.send(true);
}

// -- Header hygiene --

#[tokio::test]
async fn hop_by_hop_headers_are_stripped_both_ways() {
    let origin = start_origin().await;
    let fwd = start_forwarder(fixed(origin)).await;

    let body: Value = reqwest::Client::new()
        .get(fwd.url("/echo"))
        .header("connection", "x-trace-hop")
        .header("x-trace-hop", "1")
        .header("keep-alive", "timeout=5")
        .header("proxy-connection", "keep-alive")
        .header("x-kept", "yes")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let headers = &body["headers"];
    assert!(headers.get("x-trace-hop").is_none());
    assert!(headers.get("keep-alive").is_none());
    assert!(headers.get("proxy-connection").is_none());
    assert_eq!(headers["x-kept"], "yes");

    let resp = reqwest::get(fwd.url("/hop")).await.unwrap();
    assert!(resp.headers().get("keep-alive").is_none());
    assert!(resp.headers().get("proxy-connection").is_none());
    assert_eq!(resp.headers()["x-kept"], "yes");

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn diagnostics_can_be_disabled() {
    let origin = start_origin().await;
    let mut config = fixed(origin);
    config.diagnostics.enabled = false;
    let fwd = start_forwarder(config).await;

    let resp = reqwest::get(fwd.url("/echo")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("x-proxy-origin").is_none());
    assert!(resp.headers().get("x-proxy-worker").is_none());
    assert!(resp.headers().get("x-proxy-policy").is_none());

    let _ = fwd.shutdown.send(true);
}

// -- Bodies --

#[tokio::test]
async fn large_body_arrives_byte_identical() {
    let origin = start_origin().await;
    let fwd = start_forwarder(fixed(origin)).await;

    let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let resp = reqwest::Client::new()
        .post(fwd.url("/upload"))
        .body(payload.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let echoed = resp.bytes().await.unwrap();
    assert_eq!(echoed.len(), payload.len());
    assert!(echoed.as_ref() == payload.as_slice());

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn chunked_bodies_stream_through_both_ways() {
    let origin = start_origin().await;
    let fwd = start_forwarder(fixed(origin)).await;

    let mut socket = tokio::net::TcpStream::connect(fwd.addr).await.unwrap();
    socket
        .write_all(
            b"POST /stream HTTP/1.1\r\n\
              host: edge.example.com\r\n\
              transfer-encoding: chunked\r\n\
              connection: close\r\n\r\n\
              5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
        )
        .await
        .unwrap();
    let mut raw = Vec::new();
    socket.read_to_end(&mut raw).await.unwrap();

    let split = raw.windows(4).position(|w| w == b"\r\n\r\n").unwrap();
    let head = String::from_utf8_lossy(&raw[..split]).to_ascii_lowercase();
    assert!(head.starts_with("http/1.1 200"), "{head}");
    assert!(head.contains("transfer-encoding: chunked"), "{head}");
    assert!(head.contains("x-origin-te: chunked"), "{head}");
    assert_eq!(decode_chunked(&raw[split + 4..]), b"hello world");

    let _ = fwd.shutdown.send(true);
}

// -- Failures --

#[tokio::test]
async fn slow_origin_times_out_with_502() {
    let origin = start_origin().await;
    let mut config = fixed(origin);
    config.upstream.timeout_ms = Some(200);
    let fwd = start_forwarder(config).await;

    let started = Instant::now();
    let resp = reqwest::get(fwd.url("/slow")).await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(resp.status(), 502);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    assert!(resp.headers().get("x-proxy-origin").is_none());
    let text = resp.text().await.unwrap();
    assert!(text.starts_with("Bad Gateway: origin timed out."), "{text}");

    let health = fwd.health().await;
    assert_eq!(health.stats.requests_failed, 1);
    assert_eq!(health.stats.requests_timed_out, 1);

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn timeout_releases_origin_connection() {
    let (origin, closed) = start_silent_origin().await;
    let mut config = fixed(origin);
    config.upstream.timeout_ms = Some(200);
    let fwd = start_forwarder(config).await;

    let resp = reqwest::get(fwd.url("/hang")).await.unwrap();
    assert_eq!(resp.status(), 502);

    tokio::time::timeout(Duration::from_secs(2), closed)
        .await
        .expect("origin connection left open after timeout")
        .unwrap();

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn origin_failure_mid_body_truncates_stream() {
    let origin = start_truncating_origin().await;
    let fwd = start_forwarder(fixed(origin)).await;

    let resp = reqwest::get(fwd.url("/partial")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.bytes().await.is_err());

    let health = fwd.health().await;
    assert_eq!(health.stats.requests_forwarded, 1);
    assert_eq!(health.stats.requests_failed, 0);

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn unreachable_origin_returns_502() {
    let closed = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let fwd = start_forwarder(fixed(closed)).await;

    let resp = reqwest::get(fwd.url("/anything")).await.unwrap();
    assert_eq!(resp.status(), 502);
    let text = resp.text().await.unwrap();
    assert!(text.starts_with("Bad Gateway: failed to reach origin."), "{text}");

    let health = fwd.health().await;
    assert_eq!(health.stats.requests_failed, 1);
    assert_eq!(health.stats.requests_timed_out, 0);

    let _ = fwd.shutdown.send(true);
}

// -- Redirects --

#[tokio::test]
async fn manual_mode_relays_redirects() {
    let origin = start_origin().await;
    let fwd = start_forwarder(fixed(origin)).await;

    let resp = no_redirects()
        .get(fwd.url("/redirect"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 302);
    assert_eq!(resp.headers()[header::LOCATION], "/final");

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn follow_mode_returns_final_response() {
    let origin = start_origin().await;
    let mut config = fixed(origin);
    config.upstream.redirect = Some(RedirectMode::Follow);
    let fwd = start_forwarder(config).await;

    let resp = no_redirects()
        .get(fwd.url("/redirect"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "final GET");

    let resp = no_redirects()
        .post(fwd.url("/see-other"))
        .body("form=1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "final GET");

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn rewrite_policy_follows_redirects_by_default() {
    let origin = start_origin().await;
    let fwd = start_forwarder(rewrite(origin)).await;

    let resp = no_redirects()
        .get(fwd.url("/redirect"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "final GET");

    let _ = fwd.shutdown.send(true);
}

// -- Health & lifecycle --

#[tokio::test]
async fn health_endpoint_reports_policy_and_stats() {
    let origin = start_origin().await;
    let fwd = start_forwarder(fixed(origin)).await;

    reqwest::get(fwd.url("/echo")).await.unwrap();

    let health = fwd.health().await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
    assert_eq!(health.policy, "fixed");
    assert_eq!(health.origin, format!("http://{origin}"));
    assert_eq!(health.timeout_ms, Some(8000));
    assert_eq!(health.redirect, "manual");
    assert_eq!(health.config.source, "test");
    assert_eq!(health.config.version, "inline");
    assert_eq!(health.stats.requests_forwarded, 1);
    assert_eq!(health.stats.requests_failed, 0);

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn empty_health_path_proxies_everything() {
    let origin = start_origin().await;
    let mut config = fixed(origin);
    config.health_path = String::new();
    let fwd = start_forwarder(config).await;

    let resp = reqwest::get(fwd.url("/_forwarder/health")).await.unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(resp.text().await.unwrap(), "origin 404");

    let _ = fwd.shutdown.send(true);
}

#[tokio::test]
async fn shutdown_cancels_in_flight_dispatch() {
    let origin = start_origin().await;
    let mut config = fixed(origin);
    config.upstream.timeout_ms = Some(0);
    let fwd = start_forwarder(config).await;

    let url = fwd.url("/slow");
    let pending = tokio::spawn(async move { reqwest::get(url).await });
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let _ = fwd.shutdown.send(true);
    let resp = pending.await.unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(resp.status(), 502);
    assert!(resp.text().await.unwrap().contains("dispatch cancelled"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(reqwest::get(fwd.url("/echo")).await.is_err());
}
