//! Session builder for configuration

use crate::buffer::{Encoding, StreamBuffer};
use crate::mirror::Mirror;
use crate::process::{set_working_dir, PtyProcess};
use crate::result::ExpectError;
use crate::session::Session;
use portable_pty::{CommandBuilder, PtySize};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for expect operations (in seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum buffer size (in bytes)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8192;

/// Default PTY rows
const DEFAULT_PTY_ROWS: u16 = 24;

/// Default PTY columns
const DEFAULT_PTY_COLS: u16 = 80;

/// Default poll slice for one read attempt (in milliseconds)
const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Default upper bound on raw bytes decoded per read
const DEFAULT_READ_SIZE: usize = 4096;

/// Builder for configuring and spawning sessions.
///
/// # Defaults
///
/// - Timeout: 30 seconds
/// - Max buffer size: 8192 bytes (only already scanned text is ever discarded)
/// - ANSI stripping: disabled
/// - PTY size: 24 rows x 80 columns
/// - Poll interval: 50 ms
/// - Encoding: UTF-8
/// - Working directory: the current directory
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{BackgroundMirror, Session};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = Session::builder()
///     .timeout(Duration::from_secs(600))
///     .working_dir("os")
///     .mirror(BackgroundMirror::stdout()?)
///     .spawn("cargo run")?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    timeout: Duration,
    max_buffer_size: usize,
    strip_ansi: bool,
    pty_size: PtySize,
    poll_interval: Duration,
    read_size: usize,
    encoding: Encoding,
    working_dir: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    mirror: Option<Box<dyn Mirror>>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("timeout", &self.timeout)
            .field("max_buffer_size", &self.max_buffer_size)
            .field("strip_ansi", &self.strip_ansi)
            .field("pty_size", &(self.pty_size.rows, self.pty_size.cols))
            .field("poll_interval", &self.poll_interval)
            .field("encoding", &self.encoding)
            .field("working_dir", &self.working_dir)
            .field("mirror", &self.mirror.is_some())
            .finish()
    }
}

impl SessionBuilder {
    /// Create a new session builder with default configuration.
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            strip_ansi: false,
            pty_size: PtySize {
                rows: DEFAULT_PTY_ROWS,
                cols: DEFAULT_PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            },
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            read_size: DEFAULT_READ_SIZE,
            encoding: Encoding::Utf8,
            working_dir: None,
            env: Vec::new(),
            mirror: None,
        }
    }

    /// Default timeout used by [`Session::expect_default`].
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set maximum retained buffer size in bytes.
    ///
    /// Beyond this size, scanned text is discarded from the front until two
    /// thirds of the limit remain. Unscanned text is always kept.
    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    /// Strip ANSI escape sequences before matching.
    ///
    /// The mirror still receives the raw output.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }

    /// Set PTY (terminal) size.
    pub fn pty_size(mut self, rows: u16, cols: u16) -> Self {
        self.pty_size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };
        self
    }

    /// Longest single wait for output inside an expect loop.
    ///
    /// Smaller values make the mirror more responsive at the cost of more wakeups.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Upper bound on raw bytes decoded per read.
    pub fn read_size(mut self, size: usize) -> Self {
        self.read_size = size.max(1);
        self
    }

    /// Encoding of the child's output.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Directory the child starts in.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for the child.
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Copy all output to `mirror` as it is read.
    pub fn mirror(mut self, mirror: impl Mirror + 'static) -> Self {
        self.mirror = Some(Box::new(mirror));
        self
    }

    /// Spawn a command line, splitting it on whitespace.
    ///
    /// For arguments containing spaces use [`spawn_program`](Self::spawn_program).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The command string is empty
    /// - The PTY cannot be created
    /// - The process cannot be spawned
    pub fn spawn(self, command: &str) -> Result<Session, ExpectError> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ExpectError::Spawn("Empty command".to_string()))?;
        let args: Vec<&str> = parts.collect();
        self.spawn_program(program, &args)
    }

    /// Spawn `program` with an explicit argument list.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use ptyexpect::Session;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let session = Session::builder()
    ///     .spawn_program("sh", &["-c", "printf 'ready> '; read line; echo \"input: $line\""])?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn_program<S: AsRef<str>>(
        self,
        program: &str,
        args: &[S],
    ) -> Result<Session, ExpectError> {
        if program.is_empty() {
            return Err(ExpectError::Spawn("Empty command".to_string()));
        }

        let mut cmd = CommandBuilder::new(program);
        for arg in args {
            cmd.arg(arg.as_ref());
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        set_working_dir(&mut cmd, self.working_dir.as_deref())?;

        let label = std::iter::once(program)
            .chain(args.iter().map(AsRef::as_ref))
            .collect::<Vec<_>>()
            .join(" ");
        let process = PtyProcess::spawn_command(label, cmd, self.pty_size, self.encoding)?;

        Ok(Session {
            process,
            buffer: StreamBuffer::new(self.max_buffer_size, self.strip_ansi),
            mirror: self.mirror,
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            read_size: self.read_size,
        })
    }
}
