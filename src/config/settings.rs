//! Effective runtime settings derived from a validated [`Config`].
//!
//! Built once at startup. Policy-dependent defaults are resolved here
//! (fixed origin: 8 s deadline, manual redirects; rewrite origin: no
//! deadline, followed redirects) and every string is parsed into its
//! `http` type, so request handling never re-parses configuration.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};

use super::model::{Config, RedirectMode, DEFAULT_FIXED_TIMEOUT_MS};
use super::validation::validate;
use crate::error::{ForwarderError, ValidationError};
use crate::proxy::policy::RoutingPolicy;

#[derive(Debug, Clone)]
pub struct Settings {
    pub policy: RoutingPolicy,
    /// `None` means no deadline beyond whatever the transport imposes.
    pub timeout: Option<Duration>,
    pub redirect: RedirectMode,
    pub max_redirects: usize,
    pub secret: Option<HeaderValue>,
    pub secret_header: HeaderName,
    pub client_ip_header: HeaderName,
    /// Value of `X-Proxy-Worker`; `None` disables diagnostic headers.
    pub diagnostics: Option<HeaderValue>,
    pub health_path: Option<String>,
}

impl Settings {
    pub fn from_config(config: &Config) -> Result<Self, ForwarderError> {
        validate(config).map_err(|errors| ForwarderError::ConfigValidation { errors })?;

        let invalid = |field: &str, message: String| ForwarderError::ConfigValidation {
            errors: vec![ValidationError {
                field: field.into(),
                message,
                suggestion: None,
            }],
        };

        let policy_config = config.policy.as_ref().ok_or_else(|| {
            invalid("policy", "no routing policy configured".into())
        })?;
        let policy =
            RoutingPolicy::from_config(policy_config).map_err(|msg| invalid("policy", msg))?;

        let is_fixed = matches!(policy, RoutingPolicy::Fixed(_));
        let timeout_ms = config
            .upstream
            .timeout_ms
            .or_else(|| is_fixed.then_some(DEFAULT_FIXED_TIMEOUT_MS));
        let timeout = timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let redirect = config.upstream.redirect.unwrap_or(if is_fixed {
            RedirectMode::Manual
        } else {
            RedirectMode::Follow
        });

        let secret = config
            .forwarding
            .secret
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .map_err(|e| invalid("forwarding.secret", e.to_string()))?;
        let secret_header = header_name(&config.forwarding.secret_header)
            .map_err(|msg| invalid("forwarding.secret_header", msg))?;
        let client_ip_header = header_name(&config.forwarding.client_ip_header)
            .map_err(|msg| invalid("forwarding.client_ip_header", msg))?;

        let diagnostics = if config.diagnostics.enabled {
            Some(
                HeaderValue::from_str(&config.diagnostics.name)
                    .map_err(|e| invalid("diagnostics.name", e.to_string()))?,
            )
        } else {
            None
        };

        let health_path = Some(config.health_path.clone()).filter(|p| !p.is_empty());

        Ok(Self {
            policy,
            timeout,
            redirect,
            max_redirects: config.upstream.max_redirects,
            secret,
            secret_header,
            client_ip_header,
            diagnostics,
            health_path,
        })
    }
}

fn header_name(name: &str) -> Result<HeaderName, String> {
    name.parse::<HeaderName>()
        .map_err(|_| format!("'{name}' is not a valid header name"))
}
