//! Signal names and delivery.
//!
//! Outcomes store raw signal numbers; this module maps them to their
//! symbolic names (`SIGTERM`) and back, and sends signals to running
//! children. On non-Unix platforms no names are known and delivery is
//! unsupported.

use std::io;

/// Symbolic name for a signal number, e.g. `15` -> `SIGTERM`.
#[cfg(unix)]
pub fn signal_name(number: i32) -> Option<&'static str> {
    nix::sys::signal::Signal::try_from(number)
        .ok()
        .map(|signal| signal.as_str())
}

#[cfg(not(unix))]
pub fn signal_name(_number: i32) -> Option<&'static str> {
    None
}

/// Signal number for a symbolic name, e.g. `SIGTERM` -> `15`.
///
/// Names are matched exactly, including the `SIG` prefix.
#[cfg(unix)]
pub fn signal_number(name: &str) -> Option<i32> {
    name.parse::<nix::sys::signal::Signal>()
        .ok()
        .map(|signal| signal as i32)
}

#[cfg(not(unix))]
pub fn signal_number(_name: &str) -> Option<i32> {
    None
}

/// Deliver `signal` to the process `pid`.
///
/// A process that already exited is not an error.
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: i32) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let signal = Signal::try_from(signal).map_err(io::Error::from)?;
    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    match kill(Pid::from_raw(pid), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(io::Error::from(errno)),
    }
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, _signal: i32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals are only supported on unix",
    ))
}

/// `SIGTERM` on Unix.
#[cfg(unix)]
pub const TERMINATE: i32 = nix::sys::signal::Signal::SIGTERM as i32;

#[cfg(not(unix))]
pub const TERMINATE: i32 = 15;
