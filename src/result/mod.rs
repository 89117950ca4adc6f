//! Result types for expect operations

mod error;

pub use error::{ExpectError, PatternError};

/// Details of a successful textual match.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::{Outcome, Pattern, PatternSet, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let mut session = Session::spawn("sh")?;
/// session.send_line("echo $((6 * 7))").await?;
/// let answer = PatternSet::new([Pattern::regex(r"(\d+)\r?\n")?])?;
/// if let Outcome::Matched(m) = session.expect(&answer, Duration::from_secs(5)).await? {
///     println!("got {}", m.captures[1]);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the matching pattern within its [`PatternSet`](crate::PatternSet).
    pub pattern_index: usize,

    /// The matched text.
    pub matched: String,

    /// Absolute start offset of the match in the decoded stream.
    pub start: usize,

    /// Absolute end offset of the match; the scan cursor now sits here.
    pub end: usize,

    /// Unscanned text that preceded the match.
    ///
    /// This is usually the interesting part: the output of a command sent
    /// just before waiting for the next prompt.
    pub before: String,

    /// Captured groups for regex patterns (index 0 is the full match).
    ///
    /// Empty for exact patterns.
    pub captures: Vec<String>,
}

/// What a single `expect` call resolved to.
///
/// The sentinel variants carry the index of the matching sentinel pattern when
/// the caller declared one (`Pattern::Eof` / `Pattern::Timeout`), so a pattern
/// list like `[success, panic, Timeout, Eof]` can be dispatched on one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A textual pattern matched.
    Matched(MatchResult),

    /// The child closed its output before any pattern matched.
    EndOfStream {
        /// Index of the `Eof` sentinel in the pattern set, if declared.
        pattern_index: Option<usize>,
        /// Unscanned text left when the stream ended.
        before: String,
    },

    /// The deadline passed before any pattern matched. The child is left running.
    TimedOut {
        /// Index of the `Timeout` sentinel in the pattern set, if declared.
        pattern_index: Option<usize>,
        /// Unscanned text at the moment of the timeout.
        before: String,
    },
}

impl Outcome {
    /// Index of the pattern this outcome corresponds to.
    ///
    /// `None` for a sentinel outcome whose sentinel was not declared.
    pub fn pattern_index(&self) -> Option<usize> {
        match self {
            Outcome::Matched(m) => Some(m.pattern_index),
            Outcome::EndOfStream { pattern_index, .. }
            | Outcome::TimedOut { pattern_index, .. } => *pattern_index,
        }
    }

    /// Whether a textual pattern matched
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Matched(_))
    }

    /// Whether the deadline elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::TimedOut { .. })
    }

    /// Whether the stream ended first
    pub fn is_eof(&self) -> bool {
        matches!(self, Outcome::EndOfStream { .. })
    }

    /// Text that preceded the outcome
    pub fn before(&self) -> &str {
        match self {
            Outcome::Matched(m) => &m.before,
            Outcome::EndOfStream { before, .. } | Outcome::TimedOut { before, .. } => before,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_index_for_sentinels() {
        let timed_out = Outcome::TimedOut {
            pattern_index: Some(2),
            before: String::new(),
        };
        assert_eq!(timed_out.pattern_index(), Some(2));
        assert!(timed_out.is_timeout());

        let eof = Outcome::EndOfStream {
            pattern_index: None,
            before: "boom\r\n".to_string(),
        };
        assert_eq!(eof.pattern_index(), None);
        assert_eq!(eof.before(), "boom\r\n");
        assert!(eof.is_eof());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ExpectError::ClosedSession.to_string(),
            "Session is closed: the process has already exited"
        );
        assert_eq!(
            ExpectError::Spawn("no such file".into()).to_string(),
            "Failed to spawn process: no such file"
        );
        let pattern: ExpectError = PatternError::EmptyPattern.into();
        assert_eq!(pattern.to_string(), "Invalid pattern: Pattern cannot be empty");
    }
}
