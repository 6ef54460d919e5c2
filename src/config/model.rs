//! Serde data structures for the forwarder configuration file.
//!
//! Contains [`Config`] (the root), [`PolicyConfig`], [`UpstreamConfig`],
//! [`ForwardingConfig`] and [`DiagnosticsConfig`]. Structs use
//! `deny_unknown_fields` for strict parsing; every section is optional so
//! the whole file can be replaced by CLI flags.

use serde::{Deserialize, Serialize};

pub const DEFAULT_FIXED_TIMEOUT_MS: u64 = 8000;
pub const DEFAULT_MAX_REDIRECTS: usize = 20;
pub const DEFAULT_SECRET_HEADER: &str = "x-worker-proxy-secret";
pub const DEFAULT_CLIENT_IP_HEADER: &str = "cf-connecting-ip";
pub const DEFAULT_HEALTH_PATH: &str = "/_forwarder/health";

fn default_scheme() -> String {
    "https".to_string()
}

const fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

const fn default_true() -> bool {
    true
}

fn default_secret_header() -> String {
    DEFAULT_SECRET_HEADER.to_string()
}

fn default_client_ip_header() -> String {
    DEFAULT_CLIENT_IP_HEADER.to_string()
}

fn default_diagnostics_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_health_path() -> String {
    DEFAULT_HEALTH_PATH.to_string()
}

fn is_https(v: &str) -> bool {
    v == "https"
}

fn is_true(v: &bool) -> bool {
    *v
}

fn is_default_max_redirects(v: &usize) -> bool {
    *v == DEFAULT_MAX_REDIRECTS
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyConfig>,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub forwarding: ForwardingConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default = "default_health_path")]
    pub health_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            policy: None,
            upstream: UpstreamConfig::default(),
            forwarding: ForwardingConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            health_path: default_health_path(),
        }
    }
}

/// How the outbound origin is derived from the inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PolicyConfig {
    /// Every request goes to one base URL; inbound path and query are appended.
    Fixed { base_url: String },
    /// The inbound hostname is replaced by `target_host` and the scheme forced.
    Rewrite {
        target_host: String,
        #[serde(default = "default_scheme", skip_serializing_if = "is_https")]
        scheme: String,
    },
}

impl PolicyConfig {
    #[must_use]
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::Fixed { .. } => "fixed",
            Self::Rewrite { .. } => "rewrite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    /// Relay origin redirects to the caller untouched.
    Manual,
    /// Chase redirects inside the dispatcher and relay only the final response.
    Follow,
}

impl RedirectMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Follow => "follow",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Deadline for the origin response head. `None` picks the policy
    /// default, `Some(0)` disables the deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// `None` picks the policy default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<RedirectMode>,

    #[serde(
        default = "default_max_redirects",
        skip_serializing_if = "is_default_max_redirects"
    )]
    pub max_redirects: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: None,
            redirect: None,
            max_redirects: default_max_redirects(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default = "default_secret_header")]
    pub secret_header: String,

    /// Header set by the edge layer carrying the caller's IP.
    #[serde(default = "default_client_ip_header")]
    pub client_ip_header: String,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_header: default_secret_header(),
            client_ip_header: default_client_ip_header(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub enabled: bool,

    #[serde(default = "default_diagnostics_name")]
    pub name: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            name: default_diagnostics_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_deserializes_from_json() {
        let json = r#"{"policy": {"mode": "fixed", "base_url": "https://backend.internal"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.policy,
            Some(PolicyConfig::Fixed {
                base_url: "https://backend.internal".into()
            })
        );
        assert_eq!(config.health_path, DEFAULT_HEALTH_PATH);
        assert_eq!(config.upstream.max_redirects, DEFAULT_MAX_REDIRECTS);
    }

    #[test]
    fn rewrite_policy_scheme_defaults_to_https() {
        let json = r#"{"policy": {"mode": "rewrite", "target_host": "b.example.net"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.policy,
            Some(PolicyConfig::Rewrite {
                target_host: "b.example.net".into(),
                scheme: "https".into()
            })
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let json = r#"{"upstream": {"timeout": 5}}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }

    #[test]
    fn forwarding_defaults() {
        let config = Config::default();
        assert!(config.forwarding.secret.is_none());
        assert_eq!(config.forwarding.secret_header, DEFAULT_SECRET_HEADER);
        assert_eq!(config.forwarding.client_ip_header, DEFAULT_CLIENT_IP_HEADER);
        assert!(config.diagnostics.enabled);
    }
}
