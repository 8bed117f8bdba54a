use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use shcall_config::ShcallConfig;

mod info;
mod run;

#[derive(Debug, Parser)]
#[command(name = "shcall")]
#[command(about = "Run programs and pipelines with function-call semantics")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file layered over the user and workspace files
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Commands {
    /// Run a program or a `|`-separated pipeline and exit with its status
    Run(RunArgs),
    /// Exit 0 if the program succeeds and 1 otherwise
    Test(TestArgs),
    /// List the programs found on PATH
    Programs,
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    /// Exit with the program's status instead of reporting the failure
    #[arg(long)]
    pub(crate) no_check: bool,

    /// Give up waiting after this many seconds and terminate every stage
    #[arg(long, value_name = "SECS")]
    pub(crate) timeout: Option<u64>,

    /// Capture the last stage's stdout and print it once the pipeline ends
    #[arg(long)]
    pub(crate) capture: bool,

    /// Working directory of every stage
    #[arg(long, value_name = "DIR")]
    pub(crate) cwd: Option<PathBuf>,

    /// Program and arguments; separate stages with a literal `|`
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) command: Vec<String>,
}

#[derive(Debug, Args)]
pub(crate) struct TestArgs {
    /// Program and arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) command: Vec<String>,
}

pub(crate) async fn dispatch(args: Cli, config: &ShcallConfig) -> Result<ExitCode> {
    match args.command {
        Commands::Run(run_args) => run::handle_run(&run_args, config).await,
        Commands::Test(test_args) => run::handle_test(&test_args, config).await,
        Commands::Programs => info::handle_programs(),
        Commands::Config => info::handle_config(config),
    }
}
