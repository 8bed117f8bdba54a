//! Call external programs like functions.
//!
//! A [`Command`] describes a program with bound arguments. Invoking it with
//! an [`Invocation`] translates keyword options into getopt-style flags,
//! spawns a [`Process`] and, depending on the variant, waits for it,
//! captures its output or wires it into a pipeline. Failures are reported
//! as a [`CommandError`] classified by exit code or terminating signal.
//!
//! ```no_run
//! use shcall_runner::{Command, Invocation};
//!
//! # async fn demo() -> shcall_runner::Result<()> {
//! let grep = Command::new("seq").pipe(Invocation::new().arg(10)).await?;
//! let matches = grep.sub("grep").capture(Invocation::new().arg("8")).await?;
//! assert_eq!(matches.read_text().await?, "8\n");
//! # Ok(())
//! # }
//! ```

pub mod argv;
pub mod command;
pub mod discovery;
pub mod error;
pub mod options;
mod pipe;
pub mod process;
pub mod signal;
pub mod stream;

pub use argv::{OptValue, OptionMap};
pub use command::{Command, sh};
pub use discovery::available_programs;
pub use error::{CommandError, Error, ErrorClass, ExitOutcome, Result};
pub use options::{Invocation, ProcessOptions, Redirect};
pub use process::{Process, StageId};
pub use stream::{OutputLines, StdoutPipe};
