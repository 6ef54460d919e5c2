//! Response relay: origin response or pipeline failure → caller response.
//!
//! On success the status line, extensions (including a non-canonical
//! reason phrase) and body stream are handed over untouched; only the
//! header map is sanitized. Once this returns, the status is committed: an
//! origin error mid-body ends the caller's stream rather than producing a
//! second response.

use axum::body::Body;
use axum::http::{header, HeaderValue};
use axum::response::Response;

use super::dispatch::OriginResponse;
use super::headers;
use crate::config::settings::Settings;
use crate::error::{ProxyError, UpstreamErrorKind};

#[must_use]
pub fn relay(result: Result<OriginResponse, ProxyError>, settings: &Settings) -> Response {
    match result {
        Ok(origin) => relay_origin(origin, settings),
        Err(err) => relay_error(&err),
    }
}

#[must_use]
pub fn relay_origin(origin: OriginResponse, settings: &Settings) -> Response {
    let (mut parts, body) = origin.response.into_parts();

    let sanitized = headers::strip_hop_by_hop(std::mem::take(&mut parts.headers));
    parts.headers = match &settings.diagnostics {
        Some(worker) => headers::append_diagnostics(
            sanitized,
            settings.policy.origin(),
            worker,
            settings.policy.mode(),
        ),
        None => sanitized,
    };

    Response::from_parts(parts, Body::new(body))
}

/// Plain-text error response. No origin headers exist to forward here.
#[must_use]
pub fn relay_error(err: &ProxyError) -> Response {
    let status = err.status();
    let text = match err {
        ProxyError::Upstream(upstream) => match upstream.kind {
            UpstreamErrorKind::Timeout => {
                format!("Bad Gateway: origin timed out. {}", upstream.detail)
            }
            UpstreamErrorKind::Unreachable => {
                format!("Bad Gateway: failed to reach origin. {}", upstream.detail)
            }
        },
        ProxyError::Internal(detail) => format!("Internal Server Error: {detail}"),
    };

    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
