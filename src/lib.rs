//! ptyexpect: drive interactive programs through a pseudo-terminal
//!
//! ptyexpect spawns a child attached to a PTY (so it buffers and prompts as
//! if a human were typing), waits for text to appear in its output, sends
//! input, and reports how each wait ended. It is meant for test harnesses
//! that boot something interactive (an OS image under QEMU, a REPL, a shell)
//! and classify the run.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ptyexpect::{BackgroundMirror, Outcome, PatternSet, Session};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = Session::builder()
//!         .timeout(Duration::from_secs(30))
//!         .mirror(BackgroundMirror::stdout()?)
//!         .spawn("python3 -i")?;
//!
//!     let prompt = PatternSet::exact(">>> ")?;
//!     session.expect_default(&prompt).await?;
//!     session.send_line("print('Hello, World!')").await?;
//!
//!     match session.expect_default(&prompt).await? {
//!         Outcome::Matched(m) => println!("Output: {}", m.before),
//!         Outcome::TimedOut { .. } => eprintln!("no prompt"),
//!         Outcome::EndOfStream { .. } => eprintln!("python exited"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Outcomes
//!
//! Every `expect` resolves to an [`Outcome`]: a match, end-of-stream, or
//! timeout. None of these is an error; `Err` is reserved for the harness
//! itself failing (see [`ExpectError`]). Patterns are tried in declaration
//! order, and the first declared pattern that matches wins.
//!
//! # Scenarios
//!
//! The [`scenario`] module composes expect/send steps and maps the result to
//! a pass/fail [`Verdict`](scenario::Verdict). The `ptyexpect-run` binary
//! (feature `cli`) exposes the same thing on the command line.

#![warn(missing_docs)]

mod buffer;
mod mirror;
mod pattern;
mod process;
mod result;
mod session;

pub mod scenario;

// Public API exports
pub use buffer::{strip_ansi, Encoding, StreamBuffer};
pub use mirror::{BackgroundMirror, Mirror, TranscriptMirror, WriterMirror, DEFAULT_MIRROR_QUEUE};
pub use pattern::{Match, Pattern, PatternSet};
pub use process::{PtyProcess, ReadOutcome};
pub use result::{ExpectError, MatchResult, Outcome, PatternError};
pub use session::{Session, SessionBuilder, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_TIMEOUT_SECS};

// Re-export commonly used types
pub use portable_pty::ExitStatus;
