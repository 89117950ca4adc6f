//! The expect engine: drives one PTY process with expect/send calls

mod builder;

pub use builder::{SessionBuilder, DEFAULT_MAX_BUFFER_SIZE, DEFAULT_TIMEOUT_SECS};

use crate::buffer::StreamBuffer;
use crate::mirror::Mirror;
use crate::pattern::PatternSet;
use crate::process::{PtyProcess, ReadOutcome};
use crate::result::{ExpectError, MatchResult, Outcome};
use portable_pty::ExitStatus;
use std::time::{Duration, Instant};

/// Main session for interacting with a spawned process.
///
/// A `Session` owns a [`PtyProcess`], the buffer of its decoded output and an
/// optional [`Mirror`]. `expect` waits for one of a [`PatternSet`] to appear;
/// `send` writes input.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{Outcome, Pattern, PatternSet, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut session = Session::builder()
///     .timeout(Duration::from_secs(120))
///     .spawn("cargo run")?;
///
/// let shell = PatternSet::exact("Rust user shell\r\n>> ")?;
/// session.expect_default(&shell).await?;
/// session.send_line("ch8b_usertest").await?;
///
/// let verdict = PatternSet::new([
///     Pattern::exact("Shell: Process 2 exited with code 0"),
///     Pattern::exact("Panic"),
///     Pattern::Timeout,
///     Pattern::Eof,
/// ])?;
/// match session.expect(&verdict, Duration::from_secs(300)).await?.pattern_index() {
///     Some(0) => println!("[SUCCESS]"),
///     Some(1) => println!("[FAILURE]"),
///     Some(2) => println!("[TIMEOUT]"),
///     _ => println!("[EOF]"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct Session {
    pub(crate) process: PtyProcess,
    pub(crate) buffer: StreamBuffer,
    pub(crate) mirror: Option<Box<dyn Mirror>>,
    pub(crate) timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) read_size: usize,
}

impl Session {
    /// Create a new session builder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Spawn a command with default settings.
    ///
    /// This is a shorthand for `Session::builder().spawn(command)`.
    pub fn spawn(command: &str) -> Result<Self, ExpectError> {
        SessionBuilder::new().spawn(command)
    }

    /// Wait until one of `patterns` matches, the stream ends, or `timeout` elapses.
    ///
    /// Output is read in slices no longer than the poll interval; each chunk
    /// goes to the mirror and then into the buffer, and the unscanned text is
    /// re-tested after every chunk. On a match the scan cursor moves to the end
    /// of the match, so the same text is never matched twice.
    ///
    /// A timeout leaves the child running. End-of-stream consumes the
    /// remaining text into the outcome's `before`.
    ///
    /// # Errors
    ///
    /// [`ExpectError::Process`] for a PTY read failure that is not a normal
    /// end-of-stream.
    pub async fn expect(
        &mut self,
        patterns: &PatternSet,
        timeout: Duration,
    ) -> Result<Outcome, ExpectError> {
        let started = Instant::now();
        // An unrepresentable deadline means no deadline at all
        let deadline = started.checked_add(timeout);
        let mut polled = false;

        loop {
            if let Some(result) = self.try_match(patterns) {
                tracing::debug!(
                    pattern = result.pattern_index,
                    elapsed = ?started.elapsed(),
                    "pattern matched"
                );
                return Ok(Outcome::Matched(result));
            }

            if self.process.is_eof() {
                tracing::debug!(elapsed = ?started.elapsed(), "end of stream before match");
                let end = self.buffer.end_position();
                let before = self.buffer.unscanned().to_owned();
                self.buffer.advance_cursor(end);
                return Ok(Outcome::EndOfStream {
                    pattern_index: patterns.eof_index(),
                    before,
                });
            }

            let now = Instant::now();
            if polled && deadline.is_some_and(|deadline| now >= deadline) {
                tracing::debug!(?timeout, "timed out waiting for {:?}", patterns);
                return Ok(Outcome::TimedOut {
                    pattern_index: patterns.timeout_index(),
                    before: self.buffer.unscanned().to_owned(),
                });
            }

            let slice = match deadline {
                Some(deadline) => deadline.saturating_duration_since(now).min(self.poll_interval),
                None => self.poll_interval,
            };
            let read = self.process.read_nonblocking(self.read_size, slice).await?;
            polled = true;

            if let ReadOutcome::Data(text) = read {
                tracing::trace!(bytes = text.len(), "read chunk");
                if let Some(mirror) = self.mirror.as_mut() {
                    mirror.on_data(&text);
                }
                self.buffer.append(&text);
            }
        }
    }

    /// [`expect`](Self::expect) with the session's default timeout.
    pub async fn expect_default(&mut self, patterns: &PatternSet) -> Result<Outcome, ExpectError> {
        self.expect(patterns, self.timeout).await
    }

    fn try_match(&mut self, patterns: &PatternSet) -> Option<MatchResult> {
        let base = self.buffer.scanned_position();
        let unscanned = self.buffer.unscanned();
        let (pattern_index, m) = patterns.match_first(unscanned)?;

        let result = MatchResult {
            pattern_index,
            matched: unscanned[m.start..m.end].to_owned(),
            start: base + m.start,
            end: base + m.end,
            before: unscanned[..m.start].to_owned(),
            captures: m.captures,
        };
        self.buffer.advance_cursor(result.end);
        Some(result)
    }

    /// Send raw bytes to the process. No newline is appended.
    ///
    /// Control characters go through unchanged:
    ///
    /// ```no_run
    /// use ptyexpect::Session;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// # let mut session = Session::spawn("sh")?;
    /// session.send(&[0x03]).await?;      // Ctrl-C
    /// session.send(b"password\r").await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// [`ExpectError::ClosedSession`] if the child already exited.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), ExpectError> {
        self.process.write(data).await
    }

    /// Send a line to the process (appends `\n`).
    pub async fn send_line(&mut self, line: &str) -> Result<(), ExpectError> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.process.write(&data).await
    }

    /// Attach or replace the mirror.
    pub fn set_mirror(&mut self, mirror: impl Mirror + 'static) {
        self.mirror = Some(Box::new(mirror));
    }

    /// Detach the mirror, returning it.
    pub fn take_mirror(&mut self) -> Option<Box<dyn Mirror>> {
        self.mirror.take()
    }

    /// Default timeout for [`expect_default`](Self::expect_default)
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the default timeout
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// The output buffer
    pub fn buffer(&self) -> &StreamBuffer {
        &self.buffer
    }

    /// The underlying process
    pub fn process(&self) -> &PtyProcess {
        &self.process
    }

    /// The underlying process, mutably (resize, raw reads)
    pub fn process_mut(&mut self) -> &mut PtyProcess {
        &mut self.process
    }

    /// Check if the process is still alive.
    pub fn is_alive(&mut self) -> Result<bool, ExpectError> {
        self.process.is_alive()
    }

    /// Terminate the process. Idempotent.
    pub async fn terminate(&mut self) -> Result<(), ExpectError> {
        self.process.terminate().await
    }

    /// Wait for the process to exit and return its exit status.
    pub async fn wait(&mut self) -> Result<ExitStatus, ExpectError> {
        self.process.wait().await
    }
}
