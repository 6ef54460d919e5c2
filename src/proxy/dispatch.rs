//! Upstream dispatcher: one bounded, cancellable call to the origin.
//!
//! The whole exchange, including any redirects chased in `follow` mode,
//! runs under a single deadline and races the process shutdown signal.
//! Losing either race drops the in-flight hyper future, which tears down
//! the origin connection instead of returning it to the pool.
//!
//! Only the response head is awaited; the body comes back as a live
//! [`Incoming`] stream for the relay.

use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::uri::Authority;
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode, Uri};
use hyper::body::{Body as HttpBody, Incoming};
use tokio::sync::watch;

use super::rewrite::OutboundRequest;
use crate::config::model::RedirectMode;
use crate::error::UpstreamError;
use crate::server::HttpClient;

/// Request headers describing the body, dropped when a redirect turns the
/// request into a bodiless `GET`.
static BODY_HEADERS: [HeaderName; 5] = [
    header::CONTENT_LENGTH,
    header::CONTENT_TYPE,
    header::CONTENT_ENCODING,
    header::CONTENT_LANGUAGE,
    header::CONTENT_LOCATION,
];

#[derive(Debug)]
pub struct OriginResponse {
    pub response: hyper::Response<Incoming>,
    /// Redirect hops followed before this response.
    pub redirects: usize,
    pub latency: Duration,
}

pub struct Dispatcher<'a> {
    pub client: &'a HttpClient,
    pub timeout: Option<Duration>,
    pub redirect: RedirectMode,
    pub max_redirects: usize,
    /// Extra header to withhold from other origins when a redirect leaves
    /// the configured one.
    pub secret_header: &'a HeaderName,
}

impl Dispatcher<'_> {
    /// Send `request` to the origin. Fails with `Timeout` when the deadline
    /// passes before a response head arrives and with `Unreachable` for
    /// transport failures or cancellation.
    pub async fn dispatch(
        &self,
        request: OutboundRequest,
        cancel: watch::Receiver<bool>,
    ) -> Result<OriginResponse, UpstreamError> {
        let start = Instant::now();
        let exchange = self.exchange(request);

        let result = match self.timeout {
            Some(limit) => tokio::select! {
                res = tokio::time::timeout(limit, exchange) => res.unwrap_or_else(|_| {
                    Err(UpstreamError::timeout(format!(
                        "origin did not respond within {}ms",
                        limit.as_millis()
                    )))
                }),
                () = cancelled(cancel) => Err(cancelled_error()),
            },
            None => tokio::select! {
                res = exchange => res,
                () = cancelled(cancel) => Err(cancelled_error()),
            },
        };

        result.map(|(response, redirects)| OriginResponse {
            response,
            redirects,
            latency: start.elapsed(),
        })
    }

    async fn exchange(
        &self,
        request: OutboundRequest,
    ) -> Result<(hyper::Response<Incoming>, usize), UpstreamError> {
        let mut hop = Hop {
            method: request.method,
            uri: request.uri,
            headers: request.headers,
            replayable: request.body.size_hint().exact() == Some(0),
        };
        let mut body = Some(request.body);
        let mut redirects = 0;

        loop {
            let outbound = OutboundRequest {
                method: hop.method.clone(),
                uri: hop.uri.clone(),
                headers: hop.headers.clone(),
                body: body.take().unwrap_or_else(Body::empty),
            };
            let http_request = outbound.into_http().map_err(|e| {
                UpstreamError::unreachable(format!("invalid outbound request: {e}"))
            })?;

            let response = self
                .client
                .request(http_request)
                .await
                .map_err(|e| UpstreamError::unreachable(error_chain(&e)))?;

            if self.redirect == RedirectMode::Manual {
                return Ok((response, redirects));
            }

            let location = response.headers().get(header::LOCATION);
            let Some(next) = hop.follow(response.status(), location, self.secret_header) else {
                return Ok((response, redirects));
            };

            if redirects >= self.max_redirects {
                return Err(UpstreamError::unreachable(format!(
                    "too many redirects (limit {})",
                    self.max_redirects
                )));
            }
            redirects += 1;

            tracing::debug!(
                status = response.status().as_u16(),
                from = %hop.uri,
                to = %next.uri,
                method = %next.method,
                "following origin redirect"
            );
            hop = next;
        }
    }
}

/// Method, target and headers of one request in a redirect chain.
#[derive(Debug, Clone)]
struct Hop {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    /// Only an empty body can be sent again on a 307/308.
    replayable: bool,
}

impl Hop {
    /// Next hop for a redirect response, or `None` when the response should
    /// be relayed as-is.
    fn follow(
        &self,
        status: StatusCode,
        location: Option<&axum::http::HeaderValue>,
        secret_header: &HeaderName,
    ) -> Option<Self> {
        if !matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308) {
            return None;
        }
        let location = location?.to_str().ok()?;
        let uri = resolve_location(&self.uri, location)?;

        let to_get = (status == StatusCode::SEE_OTHER && self.method != Method::HEAD)
            || (matches!(status.as_u16(), 301 | 302) && self.method == Method::POST);

        let mut headers = self.headers.clone();
        let method = if to_get {
            for name in &BODY_HEADERS {
                headers.remove(name);
            }
            Method::GET
        } else {
            if !self.replayable {
                tracing::warn!(
                    status = status.as_u16(),
                    location = %location,
                    "redirect needs the request body again, relaying it unfollowed"
                );
                return None;
            }
            self.method.clone()
        };

        if !same_origin(&self.uri, &uri) {
            for name in [
                header::AUTHORIZATION,
                header::COOKIE,
                header::PROXY_AUTHORIZATION,
                secret_header.clone(),
            ] {
                headers.remove(name);
            }
        }

        if let Some(authority) = uri.authority() {
            if let Ok(val) = authority.as_str().parse() {
                headers.insert(header::HOST, val);
            }
        }

        Some(Self {
            method,
            uri,
            headers,
            replayable: to_get || self.replayable,
        })
    }
}

/// Resolve a `Location` value against the URI that produced it. Only
/// http(s) targets are followed.
fn resolve_location(base: &Uri, location: &str) -> Option<Uri> {
    let base = url::Url::parse(&base.to_string()).ok()?;
    let next = base.join(location).ok()?;
    if !matches!(next.scheme(), "http" | "https") {
        return None;
    }
    next.as_str().parse().ok()
}

fn same_origin(a: &Uri, b: &Uri) -> bool {
    a.scheme() == b.scheme()
        && a.authority().map(Authority::as_str) == b.authority().map(Authority::as_str)
}

async fn cancelled(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        // Sender gone without signalling: never cancel.
        std::future::pending::<()>().await;
    }
}

fn cancelled_error() -> UpstreamError {
    UpstreamError::unreachable("dispatch cancelled: forwarder shutting down")
}

/// Flatten an error and its sources into one line; hyper's top-level
/// client errors alone say little ("client error (Connect)").
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
