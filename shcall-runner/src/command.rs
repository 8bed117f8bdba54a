//! Reusable descriptions of what to run.
//!
//! A [`Command`] is an immutable value: every builder method returns a new
//! command and every invocation spawns a fresh [`Process`]. Commands built
//! attribute-style, index-style or from a program name compare equal when
//! they resolve to the same argument prefix:
//!
//! ```ignore
//! assert_eq!(sh().sub("git").sub("status"), Command::new("git").index(["status"]));
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::argv::{OptValue, OptionMap, program_name, translate};
use crate::error::{Error, Result};
use crate::options::{Invocation, ProcessOptions};
use crate::process::Process;

type Upstream = Arc<Mutex<Option<Process>>>;

/// A program with bound arguments and default options.
#[derive(Clone, Default)]
pub struct Command {
    argv: Vec<String>,
    options: OptionMap,
    process: ProcessOptions,
    upstream: Option<Upstream>,
}

/// The empty root command, for building commands attribute-style.
pub fn sh() -> Command {
    Command::default()
}

impl Command {
    /// A command for `program`, with underscores translated to dashes.
    pub fn new(program: &str) -> Self {
        sh().sub(program)
    }

    /// A command for `program` taken literally.
    pub fn escaped(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
            ..Self::default()
        }
    }

    /// Append `name` as a subcommand, with underscores translated to dashes.
    ///
    /// On the root command this names the program.
    pub fn sub(&self, name: &str) -> Self {
        self.index([program_name(name)])
    }

    /// Append literal arguments, without any translation.
    pub fn index<I>(&self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let mut command = self.clone();
        command
            .argv
            .extend(args.into_iter().map(|arg| arg.to_string()));
        command
    }

    /// Add a default keyword option; invocation-time options override it.
    pub fn opt(&self, key: impl Into<String>, value: impl Into<OptValue>) -> Self {
        let mut command = self.clone();
        command.options.set(key, value);
        command
    }

    /// Layer default process options under every invocation.
    pub fn with_process(&self, process: &ProcessOptions) -> Self {
        let mut command = self.clone();
        command.process = command.process.merged(process);
        command
    }

    /// Program followed by bound arguments.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn options(&self) -> &OptionMap {
        &self.options
    }

    pub fn process_options(&self) -> &ProcessOptions {
        &self.process
    }

    /// Whether the next invocation reads from a spawned upstream process.
    pub fn is_piped(&self) -> bool {
        self.upstream.is_some()
    }

    /// The argument vector `call` would spawn, without spawning anything.
    pub fn resolve_argv(&self, call: &Invocation) -> Vec<String> {
        let options = self.options.merged(&call.options);
        let mut argv = self.argv.clone();
        argv.extend(translate(&call.args, &options));
        argv
    }

    /// Spawn the command and, unless `wait` is false, wait for it.
    ///
    /// With `check` enabled (the default) a failed process is reported as
    /// [`Error::Command`] when it is waited on.
    pub async fn call(&self, call: Invocation) -> Result<Process> {
        let argv = self.resolve_argv(&call);
        let options = self.process.merged(&call.process);
        let upstream = self.take_upstream()?;
        let process = Process::spawn(argv, &options, upstream)?;
        if options.wait.unwrap_or(true) {
            process.wait().await?;
        }
        Ok(process)
    }

    /// Spawn with stdout captured, without waiting.
    pub async fn capture(&self, mut call: Invocation) -> Result<Process> {
        call.process.wait.get_or_insert(false);
        call.process.capture_stdout = Some(true);
        self.call(call).await
    }

    /// Run to completion and report success, never raising a
    /// [`CommandError`](crate::CommandError), whatever `check` says.
    pub async fn test(&self, mut call: Invocation) -> Result<bool> {
        call.process.check = Some(false);
        call.process.wait = Some(false);
        let process = self.call(call).await?;
        process.success().await
    }

    /// Spawn this command as the source of a pipeline.
    ///
    /// The returned root command has no program yet; the process spawned by
    /// its next invocation reads this command's stdout. Upstream stages
    /// default to `wait = false` and `check = false`.
    pub async fn pipe(&self, mut call: Invocation) -> Result<Command> {
        call.process.wait.get_or_insert(false);
        call.process.check.get_or_insert(false);
        call.process.capture_stdout = Some(true);
        let process = self.call(call).await?;
        Ok(Command {
            argv: Vec::new(),
            options: OptionMap::new(),
            process: self.process.clone(),
            upstream: Some(Arc::new(Mutex::new(Some(process)))),
        })
    }

    fn take_upstream(&self) -> Result<Option<Process>> {
        match &self.upstream {
            Some(upstream) => upstream
                .lock()
                .take()
                .map(Some)
                .ok_or(Error::PipelineConsumed),
            None => Ok(None),
        }
    }
}

impl PartialEq for Command {
    fn eq(&self, other: &Self) -> bool {
        let same_upstream = match (&self.upstream, &other.upstream) {
            (None, None) => true,
            (Some(left), Some(right)) => Arc::ptr_eq(left, right),
            _ => false,
        };
        same_upstream
            && self.argv == other.argv
            && self.options == other.options
            && self.process == other.process
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command({:?}", self.argv)?;
        if !self.options.is_empty() {
            write!(f, ", {:?}", self.options)?;
        }
        if self.upstream.is_some() {
            f.write_str(", piped")?;
        }
        f.write_str(")")
    }
}
