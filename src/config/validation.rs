//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for a missing or
//! malformed routing policy, unusable header names, a secret that cannot
//! travel in a header, and a bad health path. Returns every problem found
//! as a list of [`ValidationError`] values with suggestions where one helps.

use axum::http::{HeaderName, HeaderValue};

use super::model::{Config, PolicyConfig, RedirectMode, DEFAULT_FIXED_TIMEOUT_MS};
use crate::error::ValidationError;
use crate::proxy::policy::RoutingPolicy;

fn error(field: &str, message: impl Into<String>, suggestion: Option<String>) -> ValidationError {
    ValidationError {
        field: field.into(),
        message: message.into(),
        suggestion,
    }
}

/// Validate a header name. Returns `Ok(())` or a human-readable error.
pub fn validate_header_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("header name cannot be empty".into());
    }
    name.parse::<HeaderName>()
        .map(|_| ())
        .map_err(|_| format!("'{name}' is not a valid header name"))
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match &config.policy {
        None => errors.push(error(
            "policy",
            "no routing policy configured",
            Some("set policy.mode to 'fixed' or 'rewrite'".into()),
        )),
        Some(policy) => {
            if let Err(msg) = RoutingPolicy::from_config(policy) {
                let (field, suggestion) = match policy {
                    PolicyConfig::Fixed { base_url } => (
                        "policy.base_url",
                        (!base_url.contains("://"))
                            .then(|| format!("did you mean 'https://{base_url}'?")),
                    ),
                    PolicyConfig::Rewrite { target_host, .. } => (
                        "policy.target_host",
                        target_host
                            .split_once("://")
                            .map(|(_, rest)| {
                                format!("did you mean '{}'?", rest.trim_end_matches('/'))
                            }),
                    ),
                };
                let scheme_error = msg.starts_with("unsupported scheme");
                let field = if scheme_error && matches!(policy, PolicyConfig::Rewrite { .. }) {
                    "policy.scheme"
                } else {
                    field
                };
                errors.push(error(field, msg, suggestion));
            }
        }
    }

    if config.upstream.redirect == Some(RedirectMode::Follow)
        && config.upstream.max_redirects == 0
    {
        errors.push(error(
            "upstream.max_redirects",
            "must be at least 1 when redirects are followed",
            Some("use redirect: manual to relay redirects instead".into()),
        ));
    }

    if let Err(msg) = validate_header_name(&config.forwarding.secret_header) {
        errors.push(error("forwarding.secret_header", msg, None));
    }

    if let Err(msg) = validate_header_name(&config.forwarding.client_ip_header) {
        errors.push(error("forwarding.client_ip_header", msg, None));
    }

    if let Some(secret) = &config.forwarding.secret {
        if secret.is_empty() {
            errors.push(error(
                "forwarding.secret",
                "secret cannot be empty when set",
                Some("remove the field to disable the secret header".into()),
            ));
        } else if HeaderValue::from_str(secret).is_err() {
            errors.push(error(
                "forwarding.secret",
                "secret contains characters not allowed in a header value",
                None,
            ));
        }
    }

    if config.diagnostics.enabled && HeaderValue::from_str(&config.diagnostics.name).is_err() {
        errors.push(error(
            "diagnostics.name",
            "name contains characters not allowed in a header value",
            None,
        ));
    }

    let health = &config.health_path;
    if !health.is_empty() && !health.starts_with('/') {
        errors.push(error(
            "health_path",
            "path must start with '/'",
            Some(format!("did you mean '/{health}'?")),
        ));
    } else if health.contains(|c| matches!(c, '{' | '}' | '*'))
        || health.split('/').any(|segment| segment.starts_with(':'))
    {
        errors.push(error(
            "health_path",
            "path must be a literal path without captures or wildcards",
            None,
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = Vec::new();

    match &config.policy {
        Some(PolicyConfig::Fixed { base_url }) => {
            lines.push(format!("  policy:    fixed -> {base_url}"));
        }
        Some(PolicyConfig::Rewrite {
            target_host,
            scheme,
        }) => {
            lines.push(format!("  policy:    rewrite -> {scheme}://{target_host}"));
        }
        None => lines.push("  policy:    none".into()),
    }

    let mode = config.policy.as_ref().map_or("fixed", PolicyConfig::mode);
    let timeout = match config.upstream.timeout_ms {
        Some(0) => "unbounded".to_string(),
        Some(ms) => format!("{ms}ms"),
        None if mode == "fixed" => format!("{DEFAULT_FIXED_TIMEOUT_MS}ms (default)"),
        None => "unbounded (default)".to_string(),
    };
    let redirect = config.upstream.redirect.map_or_else(
        || {
            if mode == "fixed" {
                "manual (default)".to_string()
            } else {
                "follow (default)".to_string()
            }
        },
        |r| r.as_str().to_string(),
    );

    lines.push(format!("  timeout:   {timeout}"));
    lines.push(format!("  redirects: {redirect}"));
    lines.push(format!(
        "  secret:    {}",
        if config.forwarding.secret.is_some() {
            format!("set ({})", config.forwarding.secret_header)
        } else {
            "not set".to_string()
        }
    ));

    format!("{path} is valid\n{}", lines.join("\n"))
}
