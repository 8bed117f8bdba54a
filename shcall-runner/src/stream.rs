use std::io;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, ReadBuf};
use tokio::process::ChildStdout;

use crate::error::Result;
use crate::process::{CapturedReader, Process};

/// Read end of a process's captured stdout.
#[derive(Debug)]
pub enum StdoutPipe {
    /// The pipe the child was spawned with.
    Child(ChildStdout),
    /// A pipe shared by the child's stdout and stderr.
    #[cfg(unix)]
    Merged(tokio::net::unix::pipe::Receiver),
}

impl StdoutPipe {
    /// Hand the read end to a downstream stage as its stdin.
    pub(crate) fn into_stdio(self) -> io::Result<Stdio> {
        match self {
            Self::Child(stdout) => stdout.try_into(),
            #[cfg(unix)]
            Self::Merged(receiver) => receiver.into_blocking_fd().map(Stdio::from),
        }
    }
}

impl AsyncRead for StdoutPipe {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Child(stdout) => Pin::new(stdout).poll_read(cx, buf),
            #[cfg(unix)]
            Self::Merged(receiver) => Pin::new(receiver).poll_read(cx, buf),
        }
    }
}

/// Lines of a process's captured stream, without line terminators.
///
/// Lines are read on demand. When the stream ends the process is waited on
/// (raising per its `check` policy) and every later call returns `None`.
pub struct OutputLines<'a> {
    process: &'a Process,
    reader: Option<BufReader<CapturedReader>>,
    buf: Vec<u8>,
    finished: bool,
}

impl<'a> OutputLines<'a> {
    pub(crate) fn new(process: &'a Process, reader: Option<CapturedReader>) -> Self {
        Self {
            process,
            reader: reader.map(BufReader::new),
            buf: Vec::new(),
            finished: false,
        }
    }

    /// Next line, or `None` once the stream is exhausted and the process
    /// has exited.
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(reader) = self.reader.as_mut() {
            self.buf.clear();
            if reader.read_until(b'\n', &mut self.buf).await? > 0 {
                return Ok(Some(decode_line(&self.buf)));
            }
            self.reader = None;
        }

        if !self.finished {
            self.finished = true;
            self.process.finish().await?;
        }
        Ok(None)
    }

    /// Drain the remaining lines.
    pub async fn collect(mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line().await? {
            lines.push(line);
        }
        Ok(lines)
    }
}

fn decode_line(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
