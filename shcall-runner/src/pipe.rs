//! Spawning processes and wiring them into pipelines.
//!
//! A pipeline stage takes the captured stdout pipe of the previous stage as
//! its stdin. The new [`Process`] adopts every upstream stage so that
//! waiting on it joins the whole chain.

use std::io::{self, ErrorKind};
use std::process::Stdio;
use std::sync::OnceLock;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::Mutex as AsyncMutex;

use crate::argv::command_line;
use crate::error::{Error, Result};
use crate::options::{ProcessOptions, Redirect};
use crate::process::{Process, Stage, StageId};
use crate::stream::StdoutPipe;

impl Process {
    /// Spawn `argv`, reading from `upstream`'s stdout when given.
    ///
    /// Never waits; spawning must happen inside a tokio runtime.
    pub(crate) fn spawn(
        argv: Vec<String>,
        options: &ProcessOptions,
        upstream: Option<Process>,
    ) -> Result<Process> {
        options.validate(upstream.is_some())?;

        let (stages, source) = match upstream {
            Some(upstream) => {
                let Process {
                    upstream: mut stages,
                    stage: last,
                    ..
                } = upstream;
                let source = last.stdout.lock().take().ok_or(Error::InvalidOptions(
                    "upstream stage does not pipe its stdout",
                ))?;
                stages.push(last);
                (stages, Some(source))
            }
            None => (Vec::new(), None),
        };

        let tail = stages.len().checked_sub(1).map(StageId);
        let stage = spawn_stage(argv, options, source, tail)?;
        tracing::trace!(stages = stages.len() + 1, "pipeline assembled");
        Ok(Process {
            upstream: stages,
            stage,
            timeout: options.timeout,
        })
    }
}

fn spawn_stage(
    argv: Vec<String>,
    options: &ProcessOptions,
    source: Option<StdoutPipe>,
    tail: Option<StageId>,
) -> Result<Stage> {
    let program = argv.first().ok_or(Error::EmptyCommand)?.clone();

    let mut command = if options.shell.unwrap_or(false) {
        let mut command = Command::new("sh");
        command.arg("-c").arg(command_line(&argv));
        command
    } else {
        let mut command = Command::new(&program);
        command.args(argv.iter().skip(1));
        command
    };

    if let Some(cwd) = &options.cwd {
        command.current_dir(cwd);
    }
    if options.env_clear.unwrap_or(false) {
        command.env_clear();
    }
    command.envs(&options.env);

    let stdin = match source {
        Some(source) => {
            tracing::trace!(program = %program, "connecting stdin to upstream pipe");
            source.into_stdio()?
        }
        None if options.input.is_some() => Stdio::piped(),
        None => redirect_stdio(&program, options.stdin.as_ref(), true)?,
    };
    let (stdout, stderr, merged) = output_stdio(&program, options)?;
    command.stdin(stdin).stdout(stdout).stderr(stderr);

    let mut child = command
        .spawn()
        .map_err(|source| Error::spawn(&program, source))?;
    let pid = child.id();
    tracing::debug!(
        pid = ?pid,
        stage = tail.map_or(0, |id| id.index() + 1),
        argv = %command_line(&argv),
        "spawned process"
    );

    let (stdin, writer) = match (options.input.clone(), child.stdin.take()) {
        (Some(input), Some(stdin)) => (None, Some(tokio::spawn(write_input(stdin, input)))),
        (_, stdin) => (stdin, None),
    };
    let stdout = child.stdout.take().map(StdoutPipe::Child).or(merged);
    let stderr = child.stderr.take();

    Ok(Stage {
        argv,
        pid,
        check: options.check_enabled(),
        tail,
        captures_stdout: options.captures_stdout(),
        captures_stderr: options.captures_stderr(),
        child: AsyncMutex::new(child),
        outcome: OnceLock::new(),
        stdin: Mutex::new(stdin),
        stdout: Mutex::new(stdout),
        stderr: Mutex::new(stderr),
        writer,
    })
}

/// Stdout and stderr of the child, plus the read end when both share a
/// captured pipe.
fn output_stdio(
    program: &str,
    options: &ProcessOptions,
) -> Result<(Stdio, Stdio, Option<StdoutPipe>)> {
    if options.stderr == Some(Redirect::Stdout) {
        return merged_output(program, options).map_err(|source| Error::spawn(program, source));
    }
    let stdout = if options.capture_stdout == Some(true) {
        Stdio::piped()
    } else {
        redirect_stdio(program, options.stdout.as_ref(), false)?
    };
    let stderr = if options.capture_stderr == Some(true) {
        Stdio::piped()
    } else {
        redirect_stdio(program, options.stderr.as_ref(), false)?
    };
    Ok((stdout, stderr, None))
}

/// Give stdout and stderr the same file description, as `2>&1` does.
#[cfg(unix)]
fn merged_output(
    program: &str,
    options: &ProcessOptions,
) -> io::Result<(Stdio, Stdio, Option<StdoutPipe>)> {
    use std::fs::File;
    use std::os::fd::{AsFd, OwnedFd};
    use tokio::net::unix::pipe::Receiver;

    if options.captures_stdout() {
        let (reader, writer) = io::pipe()?;
        let receiver = Receiver::from_owned_fd(OwnedFd::from(reader))?;
        let stderr = writer.try_clone()?;
        tracing::trace!(program = %program, "merging stderr into captured stdout");
        return Ok((writer.into(), stderr.into(), Some(StdoutPipe::Merged(receiver))));
    }

    let target = match &options.stdout {
        Some(Redirect::Null) => return Ok((Stdio::null(), Stdio::null(), None)),
        Some(Redirect::File(path)) => OwnedFd::from(File::create(path)?),
        _ => io::stdout().as_fd().try_clone_to_owned()?,
    };
    let stderr = target.try_clone()?;
    Ok((target.into(), stderr.into(), None))
}

#[cfg(not(unix))]
fn merged_output(
    _program: &str,
    _options: &ProcessOptions,
) -> io::Result<(Stdio, Stdio, Option<StdoutPipe>)> {
    Err(io::Error::new(
        ErrorKind::Unsupported,
        "merging stderr into stdout is only supported on unix",
    ))
}

fn redirect_stdio(
    program: &str,
    redirect: Option<&Redirect>,
    readable: bool,
) -> Result<Stdio> {
    match redirect {
        Some(redirect) => redirect
            .to_stdio(readable)
            .map_err(|source| Error::spawn(program, source)),
        None => Ok(Stdio::inherit()),
    }
}

/// Feed `input` to the child and close its stdin.
async fn write_input(mut stdin: ChildStdin, input: Vec<u8>) {
    if let Err(err) = stdin.write_all(&input).await {
        log_write_error(&err);
        return;
    }
    if let Err(err) = stdin.shutdown().await {
        log_write_error(&err);
    }
}

fn log_write_error(err: &io::Error) {
    // The child may exit without reading all of its input.
    if !matches!(err.kind(), ErrorKind::BrokenPipe | ErrorKind::InvalidInput) {
        tracing::debug!(error = %err, "failed to write process input");
    }
}
