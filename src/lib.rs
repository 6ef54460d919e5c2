//! edge-forwarder is a streaming reverse proxy for edge-facing hostnames.
//!
//! Every inbound request is rewritten once under the configured routing
//! policy, sent to the resolved origin under an optional deadline, and the
//! origin response is streamed back with hop-by-hop headers removed. Two
//! policies exist: a fixed origin (one backend base URL, `X-Forwarded-*`
//! context and an optional shared secret) and a rewrite origin (same path,
//! different host, with `Host` and `Referer` spoofed to match).
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Config file model, loading, validation and the frozen
//!   [`Settings`](config::settings::Settings) every request borrows.
//! - [`error`] -- Process-level and per-request error types using `thiserror`.
//! - [`health`] -- Health endpoint handler returning runtime diagnostics.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- The forwarding pipeline: routing policies, request rewriting,
//!   upstream dispatch and response relay.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |
//! | `toml` | TOML config file support |
//! | `file-backends` | All file formats |

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod server;
