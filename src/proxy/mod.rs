//! Core forwarding pipeline.
//!
//! [`forward_handler`] is the Axum fallback that receives every request
//! not aimed at the health endpoint and runs it through the three stages
//! once: [`rewrite`] (target URI and header set), [`dispatch`] (bounded,
//! cancellable origin call) and [`relay`] (sanitized streaming response or
//! synthesized error). [`policy`] holds the routing strategies, [`context`]
//! the inbound capture and [`headers`] the individual header steps.
//!
//! Nothing is shared between requests except the read-only settings and
//! the pooled HTTP client; every failure is turned into a response here and
//! never escapes the handler.

pub mod context;
pub mod dispatch;
pub mod headers;
pub mod policy;
pub mod relay;
pub mod rewrite;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::ProxyError;
use crate::server::AppState;
use context::InboundRequest;
use dispatch::Dispatcher;

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let inbound = match InboundRequest::from_request(request, Some(addr)) {
        Ok(inbound) => inbound,
        Err(e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                client = %addr,
                error = %e,
                "rejecting malformed request"
            );
            return (StatusCode::BAD_REQUEST, format!("Bad Request: {e}")).into_response();
        }
    };

    let settings = &state.settings;
    let method = inbound.method.clone();
    let host = inbound.host.clone();
    let path = inbound.path_and_query.clone();
    let ctx = inbound.forwarded_context(&settings.client_ip_header);

    tracing::debug!(
        correlation_id = %correlation_id,
        method = %method,
        host = %host,
        path = %path,
        client = %addr,
        policy = settings.policy.mode(),
        "request received"
    );

    let outbound = match rewrite::rewrite(inbound, &ctx, settings) {
        Ok(outbound) => outbound,
        Err(e) => {
            record_failure(&state, &correlation_id, &e);
            return relay::relay_error(&e);
        }
    };
    let target = outbound.uri.clone();

    let dispatcher = Dispatcher {
        client: &state.http_client,
        timeout: settings.timeout,
        redirect: settings.redirect,
        max_redirects: settings.max_redirects,
        secret_header: &settings.secret_header,
    };

    let result = match dispatcher.dispatch(outbound, state.shutdown.clone()).await {
        Ok(origin) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                correlation_id = %correlation_id,
                method = %method,
                host = %host,
                target = %target,
                status = origin.response.status().as_u16(),
                redirects = origin.redirects,
                latency_ms = u64::try_from(origin.latency.as_millis()).unwrap_or(u64::MAX),
                "origin responded"
            );
            Ok(origin)
        }
        Err(e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                method = %method,
                target = %target,
                kind = e.kind.as_str(),
                detail = %e.detail,
                "upstream dispatch failed"
            );
            let err = ProxyError::Upstream(e);
            record_failure(&state, &correlation_id, &err);
            Err(err)
        }
    };

    relay::relay(result, settings)
}

fn record_failure(state: &AppState, correlation_id: &str, err: &ProxyError) {
    state.stats.failed.fetch_add(1, Ordering::Relaxed);
    if err.is_timeout() {
        state.stats.timed_out.fetch_add(1, Ordering::Relaxed);
    }
    if let ProxyError::Internal(detail) = err {
        tracing::error!(
            correlation_id = %correlation_id,
            error = %detail,
            "internal forwarding error"
        );
    }
}
