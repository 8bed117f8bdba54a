use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use shcall_config::ShcallConfig;
use shcall_runner::available_programs;

pub(super) fn handle_programs() -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    for program in available_programs() {
        writeln!(stdout, "{program}").context("Failed to write program list")?;
    }
    Ok(ExitCode::SUCCESS)
}

pub(super) fn handle_config(config: &ShcallConfig) -> Result<ExitCode> {
    print!("{}", config.to_toml_string()?);
    Ok(ExitCode::SUCCESS)
}
