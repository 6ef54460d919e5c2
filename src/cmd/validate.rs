//! `edge-forwarder validate`: check a configuration file for errors.
//!
//! Parses and validates the config file, reporting results in either
//! human-readable text or machine-readable JSON format.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::model::PolicyConfig;
use crate::config::sources::parse_config_str;
use crate::config::validation;
use crate::error::ForwarderError;

pub fn execute(args: &ValidateArgs) -> Result<(), ForwarderError> {
    let path = &args.config;

    if !path.exists() {
        return Err(ForwarderError::ConfigFileNotFound { path: path.clone() });
    }

    let content = std::fs::read_to_string(path)?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = parse_config_str(ext, &content, &path.display().to_string())?;

    if let Err(errors) = validation::validate(&config) {
        match args.format {
            ValidateFormat::Text => {
                eprintln!("\u{2717} {} has {} errors\n", path.display(), errors.len());
                for error in &errors {
                    eprintln!("{error}");
                }
            }
            ValidateFormat::Json => {
                let json_errors: Vec<serde_json::Value> = errors
                    .iter()
                    .map(|e| {
                        serde_json::json!({
                            "field": e.field,
                            "message": e.message,
                            "suggestion": e.suggestion,
                        })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": false,
                        "errors": json_errors,
                    })
                );
            }
        }
        return Err(ForwarderError::ConfigValidation { errors });
    }

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&path.display().to_string(), &config)
            );
        }
        ValidateFormat::Json => {
            let origin = match &config.policy {
                Some(PolicyConfig::Fixed { base_url }) => base_url.clone(),
                Some(PolicyConfig::Rewrite {
                    target_host,
                    scheme,
                }) => format!("{scheme}://{target_host}"),
                None => String::new(),
            };
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "policy": config.policy.as_ref().map(PolicyConfig::mode),
                    "origin": origin,
                    "secret": config.forwarding.secret.is_some(),
                })
            );
        }
    }

    Ok(())
}
