//! Inbound request capture and the forwarded context derived from it.
//!
//! [`InboundRequest`] is what the edge layer hands the pipeline: method,
//! original scheme/host/path, headers, the untouched body stream and the
//! peer address. [`ForwardedContext`] is the immutable metadata the
//! fixed-origin policy reports to the origin in `X-Forwarded-*` headers.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::Request;
use axum::http::uri::Authority;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InboundError {
    #[error("request has no Host header")]
    MissingHost,

    #[error("invalid Host header: {0}")]
    InvalidHost(String),
}

#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    /// Scheme the caller used, without the trailing colon.
    pub scheme: String,
    /// Hostname the caller targeted, without port.
    pub host: String,
    /// Raw path and query exactly as received.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Body,
    pub client_addr: Option<SocketAddr>,
}

impl InboundRequest {
    /// Capture an axum request.
    ///
    /// Host and scheme come from an absolute-form URI when present. Otherwise
    /// the host comes from the `Host` header and the scheme from the first
    /// `X-Forwarded-Proto` value set by the TLS-terminating edge, falling back
    /// to `http` for a plaintext listener.
    pub fn from_request(
        request: Request,
        client_addr: Option<SocketAddr>,
    ) -> Result<Self, InboundError> {
        let (parts, body) = request.into_parts();

        let authority = match parts.uri.authority() {
            Some(authority) => authority.clone(),
            None => {
                let raw = parts
                    .headers
                    .get(header::HOST)
                    .ok_or(InboundError::MissingHost)?;
                let raw = raw
                    .to_str()
                    .map_err(|e| InboundError::InvalidHost(e.to_string()))?;
                raw.parse::<Authority>()
                    .map_err(|e| InboundError::InvalidHost(format!("'{raw}': {e}")))?
            }
        };
        if authority.host().is_empty() {
            return Err(InboundError::MissingHost);
        }

        let scheme = parts.uri.scheme_str().map_or_else(
            || {
                parts
                    .headers
                    .get("x-forwarded-proto")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.split(',').next())
                    .map(|v| v.trim().to_ascii_lowercase())
                    .filter(|v| v == "http" || v == "https")
                    .unwrap_or_else(|| "http".to_string())
            },
            str::to_ascii_lowercase,
        );

        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());

        Ok(Self {
            method: parts.method,
            scheme,
            host: authority.host().to_string(),
            path_and_query,
            headers: parts.headers,
            body,
            client_addr,
        })
    }

    /// Derive the forwarded context. `client_ip_header` names the header the
    /// edge layer uses to report the caller's address.
    #[must_use]
    pub fn forwarded_context(&self, client_ip_header: &HeaderName) -> ForwardedContext {
        ForwardedContext {
            host: self.host.clone(),
            scheme: self.scheme.clone(),
            uri: self.path_and_query.clone(),
            client_ip: self.headers.get(client_ip_header).cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedContext {
    pub host: String,
    pub scheme: String,
    pub uri: String,
    /// Only set when the trusted edge header was present.
    pub client_ip: Option<HeaderValue>,
}
