//! Routing policies: how the outbound origin is derived from an inbound request.
//!
//! A deployment runs exactly one [`RoutingPolicy`], built once from the
//! config and shared read-only by every request. Both variants keep the
//! inbound path and query byte-for-byte; they differ in where the scheme
//! and authority come from and in which header steps run afterwards.

use axum::http::uri::{Authority, Scheme};
use axum::http::Uri;

use crate::config::model::PolicyConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingPolicy {
    Fixed(FixedOrigin),
    Rewrite(RewriteOrigin),
}

/// Constant origin; inbound path and query are appended verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedOrigin {
    pub scheme: Scheme,
    pub authority: Authority,
}

/// Inbound host replaced by `target_host`, scheme forced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOrigin {
    pub target_host: Authority,
    pub scheme: Scheme,
}

impl RoutingPolicy {
    /// Build a policy from its config form.
    ///
    /// Any path or query on a fixed base URL is discarded: the inbound path
    /// always replaces it.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, String> {
        match config {
            PolicyConfig::Fixed { base_url } => {
                let parsed = url::Url::parse(base_url)
                    .map_err(|e| format!("'{base_url}' is not a valid URL: {e}"))?;
                let host = parsed
                    .host_str()
                    .ok_or_else(|| format!("'{base_url}' has no host"))?;
                let authority = parsed
                    .port()
                    .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"));
                Ok(Self::Fixed(FixedOrigin {
                    scheme: parse_scheme(parsed.scheme())?,
                    authority: parse_authority(&authority)?,
                }))
            }
            PolicyConfig::Rewrite {
                target_host,
                scheme,
            } => Ok(Self::Rewrite(RewriteOrigin {
                target_host: parse_authority(target_host)?,
                scheme: parse_scheme(scheme)?,
            })),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::Fixed(_) => "fixed",
            Self::Rewrite(_) => "rewrite",
        }
    }

    /// Authority of the origin every request resolves to.
    #[must_use]
    pub const fn origin(&self) -> &Authority {
        match self {
            Self::Fixed(fixed) => &fixed.authority,
            Self::Rewrite(rewrite) => &rewrite.target_host,
        }
    }

    #[must_use]
    pub const fn scheme(&self) -> &Scheme {
        match self {
            Self::Fixed(fixed) => &fixed.scheme,
            Self::Rewrite(rewrite) => &rewrite.scheme,
        }
    }

    /// Compute the outbound URI for an inbound path-and-query.
    ///
    /// `path_and_query` is carried over untouched, so percent-encoding and
    /// dot segments reach the origin exactly as the caller sent them.
    pub fn target_uri(&self, path_and_query: &str) -> Result<Uri, axum::http::Error> {
        let path_and_query = if path_and_query.is_empty() {
            "/"
        } else {
            path_and_query
        };
        Uri::builder()
            .scheme(self.scheme().clone())
            .authority(self.origin().clone())
            .path_and_query(path_and_query)
            .build()
    }
}

fn parse_scheme(scheme: &str) -> Result<Scheme, String> {
    match scheme {
        "http" => Ok(Scheme::HTTP),
        "https" => Ok(Scheme::HTTPS),
        other => Err(format!(
            "unsupported scheme '{other}' (expected http or https)"
        )),
    }
}

fn parse_authority(authority: &str) -> Result<Authority, String> {
    if authority.is_empty() {
        return Err("host cannot be empty".into());
    }
    if authority.contains('/') || authority.contains('@') {
        return Err(format!(
            "'{authority}' must be a bare host[:port], without scheme, path or credentials"
        ));
    }
    authority
        .parse::<Authority>()
        .map_err(|e| format!("'{authority}' is not a valid host: {e}"))
}
