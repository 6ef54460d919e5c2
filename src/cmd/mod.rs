//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`init`], [`validate`], or [`health`].
//! Each handler lives in its own submodule.

pub mod health;
pub mod init;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::ForwarderError;

pub async fn dispatch(cli: Cli) -> Result<(), ForwarderError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args).await,
        Some(Commands::Init(ref args)) => init::execute(args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(args).await,
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  edge-forwarder v{version}: streaming reverse proxy for edge hostnames\n\n  \
         No command provided. To get started:\n\n    \
         edge-forwarder init                               Generate a starter config\n    \
         edge-forwarder run                                Start (auto-detects ./edge-forwarder.yaml)\n    \
         edge-forwarder run --backend-base https://app     Forward everything to one origin\n    \
         edge-forwarder --help                             See all commands and options\n"
    );
}
