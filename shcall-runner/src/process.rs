//! Handles for spawned processes and the pipelines they form.
//!
//! A [`Process`] owns every stage of its pipeline in a small arena: the
//! upstream stages in spawn order followed by the process itself. Each stage
//! points at its predecessor through a [`StageId`], so the chain stays valid
//! no matter which intermediate handles the caller kept around.
//!
//! Blocking points are explicit `async fn`s:
//! - [`Process::wait`] reaps every stage, upstream first, then applies the
//!   `check` policy of each stage;
//! - [`Process::read_text`], [`Process::read_bytes`] and exhausting
//!   [`Process::lines`] read the captured stream, close all streams and
//!   wait;
//! - [`Process::scope`] runs a body and waits on every exit path.

use std::fmt;
use std::io;
use std::panic::AssertUnwindSafe;
use std::sync::OnceLock;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdin};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::argv::command_line;
use crate::error::{CommandError, Error, ExitOutcome, Result};
use crate::signal;
use crate::stream::{OutputLines, StdoutPipe};

/// Position of a stage inside a pipeline, counted from the first upstream
/// stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub(crate) usize);

impl StageId {
    pub fn index(self) -> usize {
        self.0
    }
}

pub(crate) type CapturedReader = Box<dyn AsyncRead + Send + Unpin>;

/// One spawned OS process.
pub(crate) struct Stage {
    pub(crate) argv: Vec<String>,
    pub(crate) pid: Option<u32>,
    pub(crate) check: bool,
    pub(crate) tail: Option<StageId>,
    pub(crate) captures_stdout: bool,
    pub(crate) captures_stderr: bool,
    pub(crate) child: AsyncMutex<Child>,
    pub(crate) outcome: OnceLock<ExitOutcome>,
    pub(crate) stdin: Mutex<Option<ChildStdin>>,
    pub(crate) stdout: Mutex<Option<StdoutPipe>>,
    pub(crate) stderr: Mutex<Option<ChildStderr>>,
    pub(crate) writer: Option<JoinHandle<()>>,
}

impl Stage {
    /// Reap the child, or return `None` once `deadline` passes.
    ///
    /// Waiters are serialised by the child lock; whoever reaps first records
    /// the outcome and later waiters read it back.
    async fn reap(&self, deadline: Option<Instant>) -> io::Result<Option<ExitOutcome>> {
        if let Some(outcome) = self.outcome.get() {
            return Ok(Some(*outcome));
        }

        let wait = async {
            let mut child = self.child.lock().await;
            if let Some(outcome) = self.outcome.get() {
                return Ok(*outcome);
            }
            let status = child.wait().await?;
            let outcome = *self
                .outcome
                .get_or_init(|| ExitOutcome::from_status(status));
            tracing::debug!(pid = ?self.pid, %outcome, argv = %command_line(&self.argv), "process finished");
            Ok::<_, io::Error>(outcome)
        };

        match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, wait).await {
                Ok(result) => result.map(Some),
                Err(_) => Ok(None),
            },
            None => wait.await.map(Some),
        }
    }

    /// Non-blocking reap. `None` while running or while another task waits.
    fn poll(&self) -> io::Result<Option<ExitOutcome>> {
        if let Some(outcome) = self.outcome.get() {
            return Ok(Some(*outcome));
        }
        let Ok(mut child) = self.child.try_lock() else {
            return Ok(None);
        };
        Ok(child
            .try_wait()?
            .map(|status| *self.outcome.get_or_init(|| ExitOutcome::from_status(status))))
    }

    fn close_streams(&self) {
        drop(self.stdin.lock().take());
        drop(self.stdout.lock().take());
        drop(self.stderr.lock().take());
    }

    fn failure(&self, force: bool) -> Option<CommandError> {
        let outcome = *self.outcome.get()?;
        if (self.check || force) && !outcome.success() {
            Some(CommandError::new(self.argv.clone(), outcome))
        } else {
            None
        }
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
        if self.outcome.get().is_some() {
            return;
        }
        // Exited children are reaped here; running ones are left to the
        // runtime's orphan reaper.
        match self.child.get_mut().try_wait() {
            Ok(Some(status)) => {
                let _ = self.outcome.set(ExitOutcome::from_status(status));
            }
            Ok(None) => {
                tracing::warn!(pid = ?self.pid, argv = %command_line(&self.argv), "dropping handle of a running process");
            }
            Err(err) => {
                tracing::debug!(pid = ?self.pid, error = %err, "failed to reap dropped process");
            }
        }
    }
}

/// A spawned process, possibly the last stage of a pipeline.
pub struct Process {
    pub(crate) upstream: Vec<Stage>,
    pub(crate) stage: Stage,
    pub(crate) timeout: Option<Duration>,
}

impl Process {
    /// The argument vector this process was spawned with.
    pub fn argv(&self) -> &[String] {
        &self.stage.argv
    }

    pub fn pid(&self) -> Option<u32> {
        self.stage.pid
    }

    /// Whether failures of this process are raised when it is waited on.
    pub fn check(&self) -> bool {
        self.stage.check
    }

    /// Default timeout applied by [`wait`](Self::wait).
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Identifier of this process inside its own pipeline.
    pub fn id(&self) -> StageId {
        StageId(self.upstream.len())
    }

    /// Previous pipeline stage, if this process reads from one.
    pub fn tail(&self) -> Option<StageId> {
        self.stage.tail
    }

    /// Number of processes in the pipeline, this one included.
    pub fn stage_count(&self) -> usize {
        self.upstream.len() + 1
    }

    pub fn stage_argv(&self, id: StageId) -> Option<&[String]> {
        self.stage_at(id).map(|stage| stage.argv.as_slice())
    }

    pub fn stage_tail(&self, id: StageId) -> Option<StageId> {
        self.stage_at(id).and_then(|stage| stage.tail)
    }

    /// Outcome recorded for a stage, without waiting.
    pub fn stage_outcome(&self, id: StageId) -> Option<ExitOutcome> {
        self.stage_at(id)
            .and_then(|stage| stage.outcome.get().copied())
    }

    pub fn captures_stdout(&self) -> bool {
        self.stage.captures_stdout
    }

    pub fn captures_stderr(&self) -> bool {
        self.stage.captures_stderr
    }

    /// Take the pipe feeding the first stage, when stdin was [`Piped`](crate::Redirect::Piped).
    pub fn take_stdin(&self) -> Option<ChildStdin> {
        self.stages().next().and_then(|stage| stage.stdin.lock().take())
    }

    /// Take the captured stdout pipe for manual reading.
    ///
    /// With stderr sent to [`Stdout`](crate::Redirect::Stdout) this pipe
    /// carries both streams.
    pub fn take_stdout(&self) -> Option<StdoutPipe> {
        self.stage.stdout.lock().take()
    }

    /// Take the captured stderr pipe for manual reading.
    pub fn take_stderr(&self) -> Option<ChildStderr> {
        self.stage.stderr.lock().take()
    }

    /// Wait for this process and every upstream stage, then raise the first
    /// failure (upstream first) among stages with `check` enabled.
    ///
    /// Uses the handle's configured timeout, if any. On timeout the
    /// processes keep running and a later wait performs the check.
    pub async fn wait(&self) -> Result<ExitOutcome> {
        self.wait_until(self.timeout).await
    }

    /// [`wait`](Self::wait) with an explicit timeout.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<ExitOutcome> {
        self.wait_until(Some(timeout)).await
    }

    async fn wait_until(&self, timeout: Option<Duration>) -> Result<ExitOutcome> {
        let outcome = self.reap_all(timeout).await?;
        self.check_stages(false)?;
        Ok(outcome)
    }

    /// Raise a [`CommandError`] if this process failed, regardless of its
    /// `check` setting. Upstream stages keep their own policy.
    pub async fn check_return_code(&self) -> Result<()> {
        self.reap_all(self.timeout).await?;
        self.check_stages(true)
    }

    /// Wait without raising and report whether the last stage exited zero.
    pub async fn success(&self) -> Result<bool> {
        Ok(self.reap_all(self.timeout).await?.success())
    }

    /// Outcome of the pipeline if every stage already exited.
    pub fn try_outcome(&self) -> Result<Option<ExitOutcome>> {
        let mut last = None;
        for stage in self.stages() {
            match stage.poll()? {
                Some(outcome) => last = Some(outcome),
                None => return Ok(None),
            }
        }
        Ok(last)
    }

    /// Send `signal` to this process (not to upstream stages).
    pub fn send_signal(&self, signal: i32) -> Result<()> {
        if self.stage.outcome.get().is_some() {
            return Ok(());
        }
        match self.stage.pid {
            Some(pid) => Ok(signal::send_signal(pid, signal)?),
            None => Ok(()),
        }
    }

    /// Ask this process to terminate with `SIGTERM`.
    pub fn terminate(&self) -> Result<()> {
        self.send_signal(signal::TERMINATE)
    }

    /// Send `SIGTERM` to every stage of the pipeline that has not exited,
    /// upstream first.
    pub fn terminate_all(&self) -> Result<()> {
        for stage in self.stages() {
            if stage.outcome.get().is_some() {
                continue;
            }
            if let Some(pid) = stage.pid {
                signal::send_signal(pid, signal::TERMINATE)?;
            }
        }
        Ok(())
    }

    /// Read the captured stream to its end, then close all streams and
    /// wait, raising per `check`.
    ///
    /// Exactly one of stdout and stderr must be captured. A stream that was
    /// already consumed reads as empty.
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        let reader = self.take_captured()?;
        let mut buf = Vec::new();
        let read = match reader {
            Some(mut reader) => reader.read_to_end(&mut buf).await.map(|_| ()),
            None => Ok(()),
        };
        let finished = self.finish().await;
        read?;
        finished?;
        Ok(buf)
    }

    /// [`read_bytes`](Self::read_bytes) decoded as UTF-8, lossily.
    pub async fn read_text(&self) -> Result<String> {
        let bytes = self.read_bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Lines of the captured stream, read incrementally.
    ///
    /// Exhausting the lines waits for the process. The stream is single
    /// pass: a second call yields no lines.
    pub fn lines(&self) -> Result<OutputLines<'_>> {
        Ok(OutputLines::new(self, self.take_captured()?))
    }

    /// Run `body` with this handle, then close all streams and wait for the
    /// pipeline, even if `body` fails or panics.
    ///
    /// An error from `body` takes precedence over a failure found while
    /// waiting.
    pub async fn scope<T>(&self, body: impl AsyncFnOnce(&Process) -> Result<T>) -> Result<T> {
        let result = AssertUnwindSafe(body(self)).catch_unwind().await;
        tracing::trace!(argv = %command_line(self.argv()), "leaving process scope");
        let finished = self.finish().await;
        match result {
            Err(panic) => std::panic::resume_unwind(panic),
            Ok(Err(err)) => {
                if let Err(wait_err) = finished {
                    tracing::debug!(error = %wait_err, "suppressed wait error after scope failure");
                }
                Err(err)
            }
            Ok(Ok(value)) => finished.map(|_| value),
        }
    }

    /// Close every stream of the pipeline and wait without a deadline.
    pub(crate) async fn finish(&self) -> Result<ExitOutcome> {
        for stage in self.stages() {
            stage.close_streams();
        }
        let outcome = self.reap_all(None).await?;
        self.check_stages(false)?;
        Ok(outcome)
    }

    fn take_captured(&self) -> Result<Option<CapturedReader>> {
        match (self.stage.captures_stdout, self.stage.captures_stderr) {
            (true, true) => Err(Error::AmbiguousCapture),
            (true, false) => Ok(self
                .take_stdout()
                .map(|stdout| Box::new(stdout) as CapturedReader)),
            (false, true) => Ok(self
                .take_stderr()
                .map(|stderr| Box::new(stderr) as CapturedReader)),
            (false, false) => Err(Error::NotCapturing),
        }
    }

    /// Reap all stages upstream-first under one deadline.
    ///
    /// A timeout too large to represent as an instant waits without one.
    async fn reap_all(&self, timeout: Option<Duration>) -> Result<ExitOutcome> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        for stage in &self.upstream {
            if stage.reap(deadline).await?.is_none() {
                return Err(self.timed_out(timeout));
            }
        }
        match self.stage.reap(deadline).await? {
            Some(outcome) => Ok(outcome),
            None => Err(self.timed_out(timeout)),
        }
    }

    fn timed_out(&self, timeout: Option<Duration>) -> Error {
        Error::Timeout {
            command: command_line(self.argv()),
            timeout: timeout.unwrap_or_default(),
        }
    }

    fn check_stages(&self, force_last: bool) -> Result<()> {
        for stage in &self.upstream {
            if let Some(error) = stage.failure(false) {
                return Err(error.into());
            }
        }
        match self.stage.failure(force_last) {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.upstream.iter().chain(std::iter::once(&self.stage))
    }

    fn stage_at(&self, id: StageId) -> Option<&Stage> {
        self.stages().nth(id.0)
    }

    fn fmt_stage(&self, stage: &Stage, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<Process: ")?;
        if let Some(tail) = stage.tail.and_then(|id| self.stage_at(id)) {
            self.fmt_stage(tail, f)?;
            f.write_str(" | ")?;
        }
        write!(f, "{}>", command_line(&stage.argv))
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_stage(&self.stage, f)
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("argv", &self.stage.argv)
            .field("pid", &self.stage.pid)
            .field("stages", &self.stage_count())
            .field("outcome", &self.stage.outcome.get())
            .finish()
    }
}
