//! `edge-forwarder init`: generate a starter configuration file.
//!
//! Writes a YAML, JSON, or TOML template for either the fixed-origin
//! policy (default) or the rewrite-origin policy (`--rewrite`).

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::error::ForwarderError;

pub fn execute(args: &InitArgs) -> Result<(), ForwarderError> {
    let output = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("edge-forwarder.{}", args.format.extension()))
    });

    if output.exists() {
        return Err(ForwarderError::FileExists { path: output });
    }

    std::fs::write(&output, template(args.format, args.rewrite))?;
    println!("Created {}", output.display());
    Ok(())
}

const fn template(format: ConfigFormat, rewrite: bool) -> &'static str {
    match (format, rewrite) {
        (ConfigFormat::Yaml, false) => YAML_FIXED,
        (ConfigFormat::Yaml, true) => YAML_REWRITE,
        (ConfigFormat::Json, false) => JSON_FIXED,
        (ConfigFormat::Json, true) => JSON_REWRITE,
        (ConfigFormat::Toml, false) => TOML_FIXED,
        (ConfigFormat::Toml, true) => TOML_REWRITE,
    }
}

const YAML_FIXED: &str = r#"# edge-forwarder config: every request goes to one backend.

policy:
  mode: fixed
  base_url: "https://backend.internal"

upstream:
  timeout_ms: 8000            # 0 disables the deadline
  redirect: manual            # manual | follow
  # max_redirects: 20

forwarding:
  # secret: "change-me"       # sent to the backend on every request
  secret_header: "x-worker-proxy-secret"
  client_ip_header: "cf-connecting-ip"

diagnostics:
  # enabled: true
  name: "edge-forwarder"

# health_path: "/_forwarder/health"   # "" disables the endpoint
"#;

const YAML_REWRITE: &str = r#"# edge-forwarder config: same path, different host.

policy:
  mode: rewrite
  target_host: "b.example.net"
  # scheme: https

upstream:
  # timeout_ms: 0             # unbounded by default
  redirect: follow            # manual | follow
  # max_redirects: 20

diagnostics:
  name: "edge-forwarder"

# health_path: "/_forwarder/health"   # "" disables the endpoint
"#;

const JSON_FIXED: &str = r#"{
  "policy": {
    "mode": "fixed",
    "base_url": "https://backend.internal"
  },
  "upstream": {
    "timeout_ms": 8000,
    "redirect": "manual"
  },
  "forwarding": {
    "secret_header": "x-worker-proxy-secret",
    "client_ip_header": "cf-connecting-ip"
  },
  "diagnostics": {
    "name": "edge-forwarder"
  }
}
"#;

const JSON_REWRITE: &str = r#"{
  "policy": {
    "mode": "rewrite",
    "target_host": "b.example.net",
    "scheme": "https"
  },
  "upstream": {
    "redirect": "follow"
  },
  "diagnostics": {
    "name": "edge-forwarder"
  }
}
"#;

const TOML_FIXED: &str = r#"# edge-forwarder config: every request goes to one backend.

# health_path = "/_forwarder/health"   # "" disables the endpoint

[policy]
mode = "fixed"
base_url = "https://backend.internal"

[upstream]
timeout_ms = 8000           # 0 disables the deadline
redirect = "manual"         # manual | follow
# max_redirects = 20

[forwarding]
# secret = "change-me"      # sent to the backend on every request
secret_header = "x-worker-proxy-secret"
client_ip_header = "cf-connecting-ip"

[diagnostics]
# enabled = true
name = "edge-forwarder"
"#;

const TOML_REWRITE: &str = r#"# edge-forwarder config: same path, different host.

# health_path = "/_forwarder/health"   # "" disables the endpoint

[policy]
mode = "rewrite"
target_host = "b.example.net"
# scheme = "https"

[upstream]
redirect = "follow"         # manual | follow

[diagnostics]
name = "edge-forwarder"
"#;
