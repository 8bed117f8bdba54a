//! Per-invocation process options and the call description.
//!
//! Every field of [`ProcessOptions`] is optional so that command-level
//! defaults can be layered under invocation-time settings; unset fields fall
//! back to the documented defaults when a process is spawned.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use crate::argv::{OptValue, OptionMap};
use crate::error::{Error, Result};

/// Where a standard stream of the child goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Redirect {
    /// Share the parent's stream.
    #[default]
    Inherit,
    /// Connect the stream to a pipe owned by the process handle.
    Piped,
    /// `/dev/null`.
    Null,
    /// Read from (stdin) or truncate and write to (stdout, stderr) a file.
    File(PathBuf),
    /// Send stderr wherever stdout goes, like `2>&1`. Valid for stderr only.
    Stdout,
}

impl Redirect {
    pub(crate) fn to_stdio(&self, readable: bool) -> std::io::Result<Stdio> {
        Ok(match self {
            Self::Inherit => Stdio::inherit(),
            Self::Piped => Stdio::piped(),
            Self::Null => Stdio::null(),
            Self::File(path) if readable => Stdio::from(File::open(path)?),
            Self::File(path) => Stdio::from(File::create(path)?),
            Self::Stdout => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "only stderr can follow stdout",
                ));
            }
        })
    }
}

/// Options consumed by process spawning rather than turned into flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOptions {
    /// Raise a [`CommandError`](crate::CommandError) on failure. Default `true`.
    pub check: Option<bool>,
    /// Wait for completion before the invocation returns.
    pub wait: Option<bool>,
    /// Default timeout for every wait on the resulting handle.
    pub timeout: Option<Duration>,
    /// Bytes written to stdin, which is closed afterwards.
    pub input: Option<Vec<u8>>,
    pub capture_stdout: Option<bool>,
    pub capture_stderr: Option<bool>,
    pub stdin: Option<Redirect>,
    pub stdout: Option<Redirect>,
    pub stderr: Option<Redirect>,
    pub cwd: Option<PathBuf>,
    /// Variables added to (or replacing those in) the child environment.
    pub env: BTreeMap<String, String>,
    /// Start the child with an empty environment before applying `env`.
    pub env_clear: Option<bool>,
    /// Run the space-joined argv through `sh -c`.
    pub shell: Option<bool>,
}

impl ProcessOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer `overlay` on top of `self`; fields set in `overlay` win and
    /// environment maps are merged key by key.
    pub fn merged(&self, overlay: &ProcessOptions) -> ProcessOptions {
        let mut env = self.env.clone();
        env.extend(overlay.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        ProcessOptions {
            check: overlay.check.or(self.check),
            wait: overlay.wait.or(self.wait),
            timeout: overlay.timeout.or(self.timeout),
            input: overlay.input.clone().or_else(|| self.input.clone()),
            capture_stdout: overlay.capture_stdout.or(self.capture_stdout),
            capture_stderr: overlay.capture_stderr.or(self.capture_stderr),
            stdin: overlay.stdin.clone().or_else(|| self.stdin.clone()),
            stdout: overlay.stdout.clone().or_else(|| self.stdout.clone()),
            stderr: overlay.stderr.clone().or_else(|| self.stderr.clone()),
            cwd: overlay.cwd.clone().or_else(|| self.cwd.clone()),
            env,
            env_clear: overlay.env_clear.or(self.env_clear),
            shell: overlay.shell.or(self.shell),
        }
    }

    pub fn check_enabled(&self) -> bool {
        self.check.unwrap_or(true)
    }

    pub fn captures_stdout(&self) -> bool {
        self.capture_stdout.unwrap_or(false) || self.stdout == Some(Redirect::Piped)
    }

    pub fn captures_stderr(&self) -> bool {
        self.capture_stderr.unwrap_or(false) || self.stderr == Some(Redirect::Piped)
    }

    /// Reject combinations that would silently discard one of two settings.
    pub fn validate(&self, piped_from_upstream: bool) -> Result<()> {
        if piped_from_upstream && self.stdin.is_some() {
            return Err(Error::InvalidOptions("can't pipe and set stdin at the same time"));
        }
        if piped_from_upstream && self.input.is_some() {
            return Err(Error::InvalidOptions("can't pipe and pass input at the same time"));
        }
        if self.stdin == Some(Redirect::Stdout) || self.stdout == Some(Redirect::Stdout) {
            return Err(Error::InvalidOptions("only stderr can be redirected to stdout"));
        }
        if self.input.is_some() && self.stdin.is_some() {
            return Err(Error::InvalidOptions("can't pass input and set stdin at the same time"));
        }
        if self.capture_stdout == Some(true) && self.stdout.is_some() {
            return Err(Error::InvalidOptions("can't capture stdout while redirecting it"));
        }
        if self.capture_stderr == Some(true) && self.stderr.is_some() {
            return Err(Error::InvalidOptions("can't capture stderr while redirecting it"));
        }
        Ok(())
    }

    pub fn check(mut self, check: bool) -> Self {
        self.check = Some(check);
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.input = Some(input.into());
        self
    }

    pub fn capture_stdout(mut self, capture: bool) -> Self {
        self.capture_stdout = Some(capture);
        self
    }

    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = Some(capture);
        self
    }

    pub fn stdin(mut self, redirect: Redirect) -> Self {
        self.stdin = Some(redirect);
        self
    }

    pub fn stdout(mut self, redirect: Redirect) -> Self {
        self.stdout = Some(redirect);
        self
    }

    pub fn stderr(mut self, redirect: Redirect) -> Self {
        self.stderr = Some(redirect);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn env_clear(mut self, clear: bool) -> Self {
        self.env_clear = Some(clear);
        self
    }

    pub fn shell(mut self, shell: bool) -> Self {
        self.shell = Some(shell);
        self
    }
}

/// One call of a command: positionals, keyword flags and process options.
///
/// ```ignore
/// let call = Invocation::new().arg("src").opt("max_depth", 2).flag("a").check(false);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub(crate) args: Vec<String>,
    pub(crate) options: OptionMap,
    pub(crate) process: ProcessOptions,
}

impl Invocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, arg: impl fmt::Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        self.args.extend(args.into_iter().map(|arg| arg.to_string()));
        self
    }

    /// Add a keyword option, translated into a flag.
    pub fn opt(mut self, key: impl Into<String>, value: impl Into<OptValue>) -> Self {
        self.options.set(key, value);
        self
    }

    /// Shorthand for `opt(key, true)`.
    pub fn flag(self, key: impl Into<String>) -> Self {
        self.opt(key, true)
    }

    /// Replace all process options at once.
    pub fn with_process(mut self, process: ProcessOptions) -> Self {
        self.process = process;
        self
    }

    pub fn positionals(&self) -> &[String] {
        &self.args
    }

    pub fn options(&self) -> &OptionMap {
        &self.options
    }

    pub fn process(&self) -> &ProcessOptions {
        &self.process
    }

    pub fn check(mut self, check: bool) -> Self {
        self.process.check = Some(check);
        self
    }

    pub fn wait(mut self, wait: bool) -> Self {
        self.process.wait = Some(wait);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.process.timeout = Some(timeout);
        self
    }

    pub fn input(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.process.input = Some(input.into());
        self
    }

    pub fn capture_stdout(mut self, capture: bool) -> Self {
        self.process.capture_stdout = Some(capture);
        self
    }

    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.process.capture_stderr = Some(capture);
        self
    }

    pub fn stdin(mut self, redirect: Redirect) -> Self {
        self.process.stdin = Some(redirect);
        self
    }

    pub fn stdout(mut self, redirect: Redirect) -> Self {
        self.process.stdout = Some(redirect);
        self
    }

    pub fn stderr(mut self, redirect: Redirect) -> Self {
        self.process.stderr = Some(redirect);
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.process.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.process.env.insert(key.into(), value.into());
        self
    }

    pub fn env_clear(mut self, clear: bool) -> Self {
        self.process.env_clear = Some(clear);
        self
    }

    pub fn shell(mut self, shell: bool) -> Self {
        self.process.shell = Some(shell);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_fields_win() {
        let base = ProcessOptions::new()
            .check(false)
            .cwd("/tmp")
            .env("A", "1")
            .env("B", "2");
        let overlay = ProcessOptions::new().check(true).env("B", "3");
        let merged = base.merged(&overlay);

        assert_eq!(merged.check, Some(true));
        assert_eq!(merged.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(merged.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(merged.env.get("B").map(String::as_str), Some("3"));
    }

    #[test]
    fn check_defaults_to_true() {
        assert!(ProcessOptions::new().check_enabled());
        assert!(!ProcessOptions::new().check(false).check_enabled());
    }

    #[test]
    fn piped_redirect_counts_as_capture() {
        let options = ProcessOptions::new().stdout(Redirect::Piped);
        assert!(options.captures_stdout());
        assert!(!options.captures_stderr());
    }

    #[test]
    fn merged_stderr_is_read_through_stdout() {
        let options = ProcessOptions::new()
            .stderr(Redirect::Stdout)
            .capture_stdout(true);
        assert!(options.captures_stdout());
        assert!(!options.captures_stderr());
    }

    #[test]
    fn conflicting_settings_are_rejected() {
        let conflicts = [
            (ProcessOptions::new().stdout(Redirect::Piped).capture_stdout(true), false),
            (ProcessOptions::new().stderr(Redirect::Null).capture_stderr(true), false),
            (ProcessOptions::new().input("x").stdin(Redirect::Null), false),
            (ProcessOptions::new().stdin(Redirect::Null), true),
            (ProcessOptions::new().input("x"), true),
            (ProcessOptions::new().stdout(Redirect::Stdout), false),
            (ProcessOptions::new().stdin(Redirect::Stdout), false),
            (ProcessOptions::new().stderr(Redirect::Stdout).capture_stderr(true), false),
        ];
        for (options, piped) in conflicts {
            assert!(
                matches!(options.validate(piped), Err(Error::InvalidOptions(_))),
                "{options:?} should be rejected"
            );
        }
    }

    #[test]
    fn independent_redirects_are_allowed() -> Result<()> {
        ProcessOptions::new()
            .stdout(Redirect::Piped)
            .capture_stderr(true)
            .validate(false)?;
        ProcessOptions::new()
            .stderr(Redirect::Piped)
            .capture_stdout(true)
            .validate(false)?;
        ProcessOptions::new()
            .stderr(Redirect::Stdout)
            .capture_stdout(true)
            .validate(false)?;
        Ok(())
    }

    #[test]
    fn invocation_builder_collects_everything() {
        let call = Invocation::new()
            .arg("a")
            .args([1, 2])
            .opt("n", 3)
            .flag("v")
            .check(false)
            .capture_stdout(true);
        assert_eq!(call.positionals(), ["a", "1", "2"]);
        assert_eq!(call.options().len(), 2);
        assert_eq!(call.process().check, Some(false));
        assert!(call.process().captures_stdout());
    }
}
