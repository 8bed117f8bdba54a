//! shcall - run programs and pipelines with function-call semantics.
//!
//! Thin binary entry point that delegates to the handlers in `cli`.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use shcall_config::ConfigManager;

mod cli;
mod main_helpers;

use cli::Cli;
use main_helpers::initialize_tracing;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Cli::parse();

    let manager = ConfigManager::load(args.config.clone())?;
    initialize_tracing(&manager.config().logging)?;
    if let Some(path) = manager.config_path() {
        tracing::debug!(path = %path.display(), "using configuration");
    }

    cli::dispatch(args, manager.config()).await
}
