//! Failure taxonomy for invoked programs.
//!
//! Every finished process has an [`ExitOutcome`]. Unsuccessful outcomes are
//! reported as a [`CommandError`], which can be matched broadly (any
//! failure) or narrowly through its [`ErrorClass`]: one class per exit code
//! and one per signal. Classes are plain values, so two failures with the
//! same code always share a class and different codes never do.

use std::fmt;
use std::io;
use std::process::ExitStatus;
use std::str::FromStr;
use std::time::Duration;

use crate::argv::command_line;
use crate::signal::{signal_name, signal_number};

/// Terminal state of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitOutcome {
    /// Exited normally with a status code.
    Exited(i32),
    /// Terminated by the given signal number.
    Signaled(i32),
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }

    /// Exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }

    /// Terminating signal, if any.
    pub fn signal(&self) -> Option<i32> {
        match self {
            Self::Exited(_) => None,
            Self::Signaled(signal) => Some(*signal),
        }
    }

    /// Single-integer form: signals are reported as their negated number.
    pub fn return_code(&self) -> i32 {
        match self {
            Self::Exited(code) => *code,
            Self::Signaled(signal) => -signal,
        }
    }

    pub fn class(&self) -> ErrorClass {
        ErrorClass::code(self.return_code())
    }

    pub(crate) fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signaled(signal);
            }
        }
        Self::Exited(status.code().unwrap_or(-1))
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "status code {code}"),
            Self::Signaled(signal) => match signal_name(*signal) {
                Some(name) => f.write_str(name),
                None => write!(f, "signal {signal}"),
            },
        }
    }
}

/// Addressable kind of failure: one value per exit code or signal.
///
/// Negative codes denote signals, so `ErrorClass::code(-15)`,
/// `ErrorClass::signal(15)` and `"SIGTERM".parse::<ErrorClass>()` are the
/// same class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ErrorClass {
    return_code: i32,
}

impl ErrorClass {
    pub const fn code(return_code: i32) -> Self {
        Self { return_code }
    }

    pub const fn signal(number: i32) -> Self {
        Self {
            return_code: -number,
        }
    }

    /// Look up a signal class by symbolic name, e.g. `SIGTERM`.
    pub fn signal_named(name: &str) -> Result<Self> {
        signal_number(name)
            .map(Self::signal)
            .ok_or_else(|| Error::UnknownSignal(name.to_owned()))
    }

    pub const fn return_code(&self) -> i32 {
        self.return_code
    }

    pub const fn is_signal(&self) -> bool {
        self.return_code < 0
    }

    /// Symbolic signal name, if this class is a known signal.
    pub fn signal_name(&self) -> Option<&'static str> {
        if self.is_signal() {
            signal_name(-self.return_code)
        } else {
            None
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signal_name() {
            Some(name) => write!(f, "CommandError['{name}']"),
            None => write!(f, "CommandError[{}]", self.return_code),
        }
    }
}

impl FromStr for ErrorClass {
    type Err = Error;

    /// Accepts an integer return code or a signal name.
    fn from_str(value: &str) -> Result<Self> {
        match value.trim().parse::<i32>() {
            Ok(code) => Ok(Self::code(code)),
            Err(_) => Self::signal_named(value.trim()),
        }
    }
}

impl From<ExitOutcome> for ErrorClass {
    fn from(outcome: ExitOutcome) -> Self {
        outcome.class()
    }
}

/// A program finished unsuccessfully.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Command '{}' failed with {outcome}", command_line(.argv))]
pub struct CommandError {
    argv: Vec<String>,
    outcome: ExitOutcome,
}

impl CommandError {
    pub fn new(argv: Vec<String>, outcome: ExitOutcome) -> Self {
        Self { argv, outcome }
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn outcome(&self) -> ExitOutcome {
        self.outcome
    }

    pub fn return_code(&self) -> i32 {
        self.outcome.return_code()
    }

    pub fn class(&self) -> ErrorClass {
        self.outcome.class()
    }

    pub fn matches(&self, class: ErrorClass) -> bool {
        self.class() == class
    }

    pub fn is_code(&self, code: i32) -> bool {
        self.matches(ErrorClass::code(code))
    }

    /// Whether the process was killed by the named signal.
    pub fn is_signal(&self, name: &str) -> bool {
        ErrorClass::signal_named(name).is_ok_and(|class| self.matches(class))
    }
}

/// Errors produced while running commands.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The program exited non-zero or was killed by a signal.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A wait ran out of time. The process keeps running.
    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The program could not be started.
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot run an empty command")]
    EmptyCommand,

    #[error("invalid process options: {0}")]
    InvalidOptions(&'static str),

    #[error("not capturing any output")]
    NotCapturing,

    #[error("capturing both stdout and stderr, read them individually")]
    AmbiguousCapture,

    #[error("pipeline source was already consumed by an earlier invocation")]
    PipelineConsumed,

    #[error("unknown signal {0}")]
    UnknownSignal(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn spawn(program: &str, source: io::Error) -> Self {
        Self::Spawn {
            program: program.to_owned(),
            source,
        }
    }

    /// The classified failure, if this error is one.
    pub fn command_error(&self) -> Option<&CommandError> {
        match self {
            Self::Command(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the executable could not be found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    pub fn is_code(&self, code: i32) -> bool {
        self.command_error().is_some_and(|error| error.is_code(code))
    }

    pub fn is_signal(&self, name: &str) -> bool {
        self.command_error().is_some_and(|error| error.is_signal(name))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(argv: &[&str], outcome: ExitOutcome) -> CommandError {
        CommandError::new(argv.iter().map(|arg| (*arg).to_owned()).collect(), outcome)
    }

    #[test]
    fn same_code_same_class() {
        assert_eq!(ErrorClass::code(10), ErrorClass::code(10));
        assert_ne!(ErrorClass::code(9), ErrorClass::code(10));
        assert_eq!(ErrorClass::code(11).return_code(), 11);

        let first = failure(&["a"], ExitOutcome::Exited(3));
        let second = failure(&["b", "c"], ExitOutcome::Exited(3));
        assert_eq!(first.class(), second.class());
    }

    #[test]
    fn selective_matching() {
        let error = failure(&["false"], ExitOutcome::Exited(1));
        assert!(error.is_code(1));
        assert!(!error.is_code(2));
        assert!(!error.matches(ErrorClass::code(2)));
    }

    #[cfg(unix)]
    #[test]
    fn signals_resolve_by_name_or_number() -> Result<()> {
        let by_name = ErrorClass::signal_named("SIGTERM")?;
        assert_eq!(by_name, ErrorClass::signal(15));
        assert_eq!(by_name, ErrorClass::code(-15));
        assert_eq!("SIGTERM".parse::<ErrorClass>()?, by_name);
        assert_eq!("-15".parse::<ErrorClass>()?, by_name);
        assert!(by_name.is_signal());

        let error = failure(&["sleep", "5"], ExitOutcome::Signaled(15));
        assert!(error.is_signal("SIGTERM"));
        assert!(!error.is_signal("SIGKILL"));
        assert!(!error.is_code(15));
        Ok(())
    }

    #[test]
    fn unknown_signal_names_are_rejected() {
        assert!(matches!(
            ErrorClass::signal_named("SIGNOPE"),
            Err(Error::UnknownSignal(name)) if name == "SIGNOPE"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn class_names() {
        assert_eq!(ErrorClass::code(5).to_string(), "CommandError[5]");
        assert_eq!(ErrorClass::code(-15).to_string(), "CommandError['SIGTERM']");
    }

    #[cfg(unix)]
    #[test]
    fn messages() {
        let error = failure(&["foo", "bar", "baz"], ExitOutcome::Exited(1));
        assert_eq!(
            error.to_string(),
            "Command 'foo bar baz' failed with status code 1"
        );

        let error = failure(&["foo", "bar", "", "baz"], ExitOutcome::Signaled(15));
        assert_eq!(error.to_string(), "Command 'foo bar  baz' failed with SIGTERM");
    }

    #[test]
    fn top_level_helpers_reach_the_command_error() {
        let error = Error::from(failure(&["x"], ExitOutcome::Exited(2)));
        assert!(error.is_code(2));
        assert!(!error.is_timeout());
        assert!(error.command_error().is_some());

        let error = Error::spawn(
            "missing",
            io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        );
        assert!(error.is_not_found());
        assert!(error.command_error().is_none());
    }

    #[test]
    fn outcome_accessors() {
        assert!(ExitOutcome::Exited(0).success());
        assert!(!ExitOutcome::Signaled(9).success());
        assert_eq!(ExitOutcome::Signaled(9).return_code(), -9);
        assert_eq!(ExitOutcome::Exited(4).code(), Some(4));
        assert_eq!(ExitOutcome::Signaled(9).code(), None);
    }
}
