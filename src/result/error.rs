//! Error types for ptyexpect

use thiserror::Error;

/// Errors that can occur while driving a session.
///
/// Running out of time or reaching end-of-stream are not errors; they come
/// back as [`Outcome`](crate::Outcome) variants so every call site handles
/// them explicitly.
#[derive(Error, Debug)]
pub enum ExpectError {
    /// Process spawning error.
    ///
    /// The command was empty, the program could not be found, or the working
    /// directory is invalid.
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    /// PTY error.
    ///
    /// The pseudo-terminal could not be allocated or manipulated.
    #[error("PTY error: {0}")]
    Pty(String),

    /// The child has already exited (or was terminated), so it cannot take
    /// more input.
    #[error("Session is closed: the process has already exited")]
    ClosedSession,

    /// I/O failure on the PTY that is not a normal end-of-stream.
    #[error("Process I/O failure: {0}")]
    Process(String),

    /// Invalid pattern.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] PatternError),

    /// Other I/O error (mirror sinks, waiting for exit).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to pattern creation.
#[derive(Error, Debug)]
pub enum PatternError {
    /// Invalid regex pattern.
    #[error("Invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    /// Exact patterns must not be empty.
    #[error("Pattern cannot be empty")]
    EmptyPattern,

    /// A pattern set needs at least one entry.
    #[error("Pattern set cannot be empty")]
    NoPatterns,
}
