//! Header transformation steps.
//!
//! Each step takes a [`HeaderMap`] by value and returns the transformed
//! map, so the request and response pipelines are plain compositions:
//!
//! - request, fixed origin: [`strip_hop_by_hop`] → [`set_host`] →
//!   [`inject_forwarded`]
//! - request, rewrite origin: [`strip_hop_by_hop`] → [`spoof_host_and_referer`]
//! - response: [`strip_hop_by_hop`] → [`append_diagnostics`]
//!
//! Later steps overwrite what earlier steps set.

use axum::http::uri::{Authority, Scheme};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use super::context::ForwardedContext;

pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");
pub const X_FORWARDED_URI: HeaderName = HeaderName::from_static("x-forwarded-uri");
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");
pub const X_PROXY_ORIGIN: HeaderName = HeaderName::from_static("x-proxy-origin");
pub const X_PROXY_WORKER: HeaderName = HeaderName::from_static("x-proxy-worker");
pub const X_PROXY_POLICY: HeaderName = HeaderName::from_static("x-proxy-policy");

/// Connection-scoped headers that never cross the proxy in either direction.
pub static HOP_BY_HOP: [HeaderName; 5] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any header the `Connection` header
/// nominates as connection-specific.
#[must_use]
pub fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    let nominated: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| token.trim().parse::<HeaderName>().ok())
        .collect();

    for name in nominated.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
    headers
}

/// Point `Host` at the origin authority instead of the edge hostname.
#[must_use]
pub fn set_host(mut headers: HeaderMap, authority: &Authority) -> HeaderMap {
    if let Ok(val) = HeaderValue::from_str(authority.as_str()) {
        headers.insert(header::HOST, val);
    }
    headers
}

/// Secret attached to every outbound request so the origin can reject
/// traffic that bypassed the forwarder.
#[derive(Debug, Clone, Copy)]
pub struct ProxySecret<'a> {
    pub header: &'a HeaderName,
    pub value: &'a HeaderValue,
}

/// Report the original request to the origin: `X-Forwarded-Host`,
/// `X-Forwarded-Proto`, `X-Forwarded-Uri`, `X-Real-IP` (when the edge
/// supplied a client IP) and the proxy secret (when configured).
#[must_use]
pub fn inject_forwarded(
    mut headers: HeaderMap,
    ctx: &ForwardedContext,
    secret: Option<ProxySecret<'_>>,
) -> HeaderMap {
    let forwarded = [
        (X_FORWARDED_HOST, ctx.host.as_str()),
        (X_FORWARDED_PROTO, ctx.scheme.as_str()),
        (X_FORWARDED_URI, ctx.uri.as_str()),
    ];
    for (name, value) in forwarded {
        match HeaderValue::from_str(value) {
            Ok(val) => {
                headers.insert(name, val);
            }
            Err(_) => {
                tracing::warn!(header = %name, "unrepresentable forwarded header value, skipping");
            }
        }
    }

    if let Some(ip) = &ctx.client_ip {
        headers.insert(X_REAL_IP, ip.clone());
    }

    if let Some(secret) = secret {
        headers.insert(secret.header.clone(), secret.value.clone());
    }

    headers
}

/// Overwrite `Host` and `Referer` so they name the target host, whatever
/// the caller sent.
#[must_use]
pub fn spoof_host_and_referer(
    mut headers: HeaderMap,
    target_host: &Authority,
    scheme: &Scheme,
) -> HeaderMap {
    if let Ok(val) = HeaderValue::from_str(target_host.as_str()) {
        headers.insert(header::HOST, val);
    }
    if let Ok(val) = HeaderValue::from_str(&format!("{scheme}://{target_host}/")) {
        headers.insert(header::REFERER, val);
    }
    headers
}

/// Label a relayed response with the resolved origin, the forwarder name
/// and the routing policy that handled it.
#[must_use]
pub fn append_diagnostics(
    mut headers: HeaderMap,
    origin: &Authority,
    worker: &HeaderValue,
    policy: &'static str,
) -> HeaderMap {
    if let Ok(val) = HeaderValue::from_str(origin.as_str()) {
        headers.insert(X_PROXY_ORIGIN, val);
    }
    headers.insert(X_PROXY_WORKER, worker.clone());
    headers.insert(X_PROXY_POLICY, HeaderValue::from_static(policy));
    headers
}
