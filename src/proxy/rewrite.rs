//! Request rewriter: inbound request + routing policy → outbound request.
//!
//! The body is moved into the outbound request unread; nothing here polls
//! it, so arbitrarily large or slow uploads stream straight through.

use axum::body::Body;
use axum::http::{HeaderMap, Method, Uri};

use super::context::{ForwardedContext, InboundRequest};
use super::headers::{self, ProxySecret};
use super::policy::RoutingPolicy;
use crate::config::settings::Settings;
use crate::error::ProxyError;

#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Body,
}

impl OutboundRequest {
    pub fn into_http(self) -> Result<axum::http::Request<Body>, axum::http::Error> {
        let mut request = axum::http::Request::builder()
            .method(self.method)
            .uri(self.uri)
            .body(self.body)?;
        *request.headers_mut() = self.headers;
        Ok(request)
    }
}

/// Header pipeline for the active policy.
#[must_use]
pub fn transform_request_headers(
    inbound: HeaderMap,
    ctx: &ForwardedContext,
    settings: &Settings,
) -> HeaderMap {
    let stripped = headers::strip_hop_by_hop(inbound);

    match &settings.policy {
        RoutingPolicy::Fixed(fixed) => {
            let secret = settings.secret.as_ref().map(|value| ProxySecret {
                header: &settings.secret_header,
                value,
            });
            let hosted = headers::set_host(stripped, &fixed.authority);
            headers::inject_forwarded(hosted, ctx, secret)
        }
        RoutingPolicy::Rewrite(rewrite) => {
            headers::spoof_host_and_referer(stripped, &rewrite.target_host, &rewrite.scheme)
        }
    }
}

/// Build the outbound request for `inbound` under the configured policy.
pub fn rewrite(
    inbound: InboundRequest,
    ctx: &ForwardedContext,
    settings: &Settings,
) -> Result<OutboundRequest, ProxyError> {
    let uri = settings
        .policy
        .target_uri(&inbound.path_and_query)
        .map_err(|e| ProxyError::Internal(format!("failed to build target URI: {e}")))?;

    Ok(OutboundRequest {
        method: inbound.method,
        uri,
        headers: transform_request_headers(inbound.headers, ctx, settings),
        body: inbound.body,
    })
}
