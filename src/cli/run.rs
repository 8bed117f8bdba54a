use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Result, bail};
use shcall_config::ShcallConfig;
use shcall_runner::{Error, ExitOutcome, Invocation, Process, ProcessOptions, sh};

use super::{RunArgs, TestArgs};

const PIPE_TOKEN: &str = "|";
const TIMEOUT_EXIT: u8 = 124;
const NOT_FOUND_EXIT: u8 = 127;
const SIGNAL_EXIT_BASE: i32 = 128;

pub(super) async fn handle_run(args: &RunArgs, config: &ShcallConfig) -> Result<ExitCode> {
    let stages = split_pipeline(&args.command)?;
    let defaults = process_defaults(config, args);

    let Some((last, upstream)) = stages.split_last() else {
        bail!("missing program to run");
    };
    let mut root = sh().with_process(&defaults);
    for stage in upstream {
        root = match root.index(stage).pipe(Invocation::new()).await {
            Ok(next) => next,
            Err(err) => return Ok(report(&err)),
        };
    }

    let call = Invocation::new().wait(false).capture_stdout(args.capture);
    let process = match root.index(last).call(call).await {
        Ok(process) => process,
        Err(err) => return Ok(report(&err)),
    };

    let outcome = if args.capture {
        match read_captured(&process).await {
            Some(Ok(text)) => {
                print!("{text}");
                process.wait().await
            }
            Some(Err(err)) => Err(err),
            None => Err(Error::Timeout {
                command: process.argv().join(" "),
                timeout: process.timeout().unwrap_or_default(),
            }),
        }
    } else {
        process.wait().await
    };

    match outcome {
        Ok(outcome) => Ok(ExitCode::from(outcome_exit_status(outcome))),
        Err(err) => {
            if err.is_timeout() {
                process.terminate_all()?;
            }
            Ok(report(&err))
        }
    }
}

pub(super) async fn handle_test(args: &TestArgs, config: &ShcallConfig) -> Result<ExitCode> {
    let defaults = base_options(config);
    let command = sh().with_process(&defaults).index(&args.command);
    match command.test(Invocation::new()).await {
        Ok(true) => Ok(ExitCode::SUCCESS),
        Ok(false) => Ok(ExitCode::FAILURE),
        Err(err) => {
            eprintln!("shcall: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Read the captured stdout, giving up when the handle's timeout passes.
async fn read_captured(process: &Process) -> Option<shcall_runner::Result<String>> {
    match process.timeout() {
        Some(timeout) => tokio::time::timeout(timeout, process.read_text()).await.ok(),
        None => Some(process.read_text().await),
    }
}

fn base_options(config: &ShcallConfig) -> ProcessOptions {
    let defaults = &config.defaults;
    let mut options = ProcessOptions::new()
        .check(defaults.check)
        .shell(defaults.shell);
    if let Some(timeout) = defaults.timeout() {
        options = options.timeout(timeout);
    }
    if let Some(cwd) = &defaults.cwd {
        options = options.cwd(cwd);
    }
    options.env.extend(config.env.clone());
    options
}

fn process_defaults(config: &ShcallConfig, args: &RunArgs) -> ProcessOptions {
    let mut options = base_options(config);
    if args.no_check {
        options.check = Some(false);
    }
    if let Some(seconds) = args.timeout {
        options.timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
    }
    if let Some(cwd) = &args.cwd {
        options.cwd = Some(cwd.clone());
    }
    options
}

/// Split `a b | c d` into `[[a, b], [c, d]]`.
fn split_pipeline(words: &[String]) -> Result<Vec<Vec<String>>> {
    let stages: Vec<Vec<String>> = words
        .split(|word| word == PIPE_TOKEN)
        .map(<[String]>::to_vec)
        .collect();
    if stages.iter().any(Vec::is_empty) {
        bail!("empty pipeline stage in '{}'", words.join(" "));
    }
    Ok(stages)
}

/// Shell-style exit status: the code itself, or 128 plus the signal.
fn outcome_exit_status(outcome: ExitOutcome) -> u8 {
    let status = match outcome {
        ExitOutcome::Exited(code) => code,
        ExitOutcome::Signaled(signal) => SIGNAL_EXIT_BASE + signal,
    };
    u8::try_from(status & 0xff).unwrap_or(1)
}

fn report(err: &Error) -> ExitCode {
    eprintln!("shcall: {err}");
    let status = match err {
        Error::Command(failure) => outcome_exit_status(failure.outcome()),
        Error::Timeout { .. } => TIMEOUT_EXIT,
        Error::Spawn { .. } => NOT_FOUND_EXIT,
        _ => 1,
    };
    ExitCode::from(status)
}
