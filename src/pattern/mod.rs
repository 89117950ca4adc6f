//! Pattern matching for expect operations

mod matcher;

pub use matcher::{ExactMatcher, Match, Matcher, RegexMatcher};

use crate::result::PatternError;
use regex::Regex;
use std::fmt;

/// A single match target.
///
/// Textual patterns (`Exact`, `Regex`) are tested against the unscanned
/// output. The sentinels `Eof` and `Timeout` are never tested against text:
/// they mark where in a [`PatternSet`] the caller wants the end-of-stream and
/// deadline conditions to be reported.
///
/// # Examples
///
/// ```
/// use ptyexpect::Pattern;
///
/// let prompt = Pattern::exact(">> ");
/// let exit = Pattern::regex(r"exited with code (\d+)").unwrap();
/// let sentinels = [Pattern::Timeout, Pattern::Eof];
/// ```
#[derive(Clone)]
pub enum Pattern {
    /// Substring match.
    Exact(String),

    /// Regular expression match, leftmost-first.
    Regex(Regex),

    /// Reported when the child closes its output before anything matched.
    Eof,

    /// Reported when the deadline passes before anything matched.
    Timeout,
}

impl Pattern {
    /// Create an exact string pattern.
    pub fn exact(s: impl Into<String>) -> Self {
        Pattern::Exact(s.into())
    }

    /// Compile a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidRegex`] if the expression does not compile.
    pub fn regex(pattern: &str) -> Result<Self, PatternError> {
        Ok(Pattern::Regex(Regex::new(pattern)?))
    }

    /// Check if this is a sentinel (`Eof` or `Timeout`)
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Pattern::Eof | Pattern::Timeout)
    }

    fn to_matcher(&self) -> Result<Option<Box<dyn Matcher>>, PatternError> {
        match self {
            Pattern::Exact(s) => Ok(Some(Box::new(ExactMatcher::new(s)?))),
            Pattern::Regex(r) => Ok(Some(Box::new(RegexMatcher::new(r.clone())))),
            Pattern::Eof | Pattern::Timeout => Ok(None),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Exact(s) => f.debug_tuple("Exact").field(s).finish(),
            Pattern::Regex(r) => f.debug_tuple("Regex").field(&r.as_str()).finish(),
            Pattern::Eof => f.write_str("Eof"),
            Pattern::Timeout => f.write_str("Timeout"),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::exact(s)
    }
}

/// An ordered list of patterns, compiled once and reused across calls.
///
/// Declaration order is a priority: when several patterns match the same
/// unscanned text, the one declared first wins even if a later one matches
/// earlier in the text.
pub struct PatternSet {
    patterns: Vec<Pattern>,
    matchers: Vec<(usize, Box<dyn Matcher>)>,
}

impl PatternSet {
    /// Compile a pattern set.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::EmptyPattern`] for an empty exact pattern and
    /// [`PatternError::NoPatterns`] if the list is empty.
    pub fn new(patterns: impl IntoIterator<Item = Pattern>) -> Result<Self, PatternError> {
        let patterns: Vec<Pattern> = patterns.into_iter().collect();
        if patterns.is_empty() {
            return Err(PatternError::NoPatterns);
        }

        let mut matchers = Vec::with_capacity(patterns.len());
        for (idx, pattern) in patterns.iter().enumerate() {
            if let Some(matcher) = pattern.to_matcher()? {
                matchers.push((idx, matcher));
            }
        }

        Ok(Self { patterns, matchers })
    }

    /// Shorthand for a set holding one exact pattern
    pub fn exact(s: impl Into<String>) -> Result<Self, PatternError> {
        Self::new([Pattern::exact(s)])
    }

    /// The patterns in declaration order
    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Number of patterns, sentinels included
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the set is empty (never true for a constructed set)
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Index of the first `Eof` sentinel, if declared
    pub fn eof_index(&self) -> Option<usize> {
        self.patterns.iter().position(|p| matches!(p, Pattern::Eof))
    }

    /// Index of the first `Timeout` sentinel, if declared
    pub fn timeout_index(&self) -> Option<usize> {
        self.patterns
            .iter()
            .position(|p| matches!(p, Pattern::Timeout))
    }

    /// Test the textual patterns in order and return the first that matches.
    pub fn match_first(&self, text: &str) -> Option<(usize, Match)> {
        self.matchers
            .iter()
            .find_map(|(idx, matcher)| matcher.find(text).map(|m| (*idx, m)))
    }
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.patterns).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_order_wins() {
        let set = PatternSet::new([Pattern::exact("world"), Pattern::exact("hello")]).unwrap();

        // "hello" occurs first in the text, but "world" was declared first
        let (idx, m) = set.match_first("hello world").unwrap();
        assert_eq!(idx, 0);
        assert_eq!(m.start, 6);
    }

    #[test]
    fn test_same_text_both_match() {
        let set = PatternSet::new([
            Pattern::regex(r"Process \d+ exited").unwrap(),
            Pattern::exact("Process 2 exited"),
        ])
        .unwrap();

        let (idx, _) = set.match_first("Shell: Process 2 exited with code 0").unwrap();
        assert_eq!(idx, 0);
    }

    #[test]
    fn test_sentinels_are_not_tested_against_text() {
        let set = PatternSet::new([Pattern::Eof, Pattern::Timeout, Pattern::exact("Panic")]).unwrap();

        assert!(set.match_first("Eof Timeout").is_none());
        let (idx, _) = set.match_first("kernel Panic!").unwrap();
        assert_eq!(idx, 2);
    }

    #[test]
    fn test_sentinel_indices() {
        let set = PatternSet::new([
            Pattern::exact("ok"),
            Pattern::exact("Panic"),
            Pattern::Timeout,
            Pattern::Eof,
        ])
        .unwrap();

        assert_eq!(set.timeout_index(), Some(2));
        assert_eq!(set.eof_index(), Some(3));
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn test_no_sentinels() {
        let set = PatternSet::exact("ready> ").unwrap();
        assert_eq!(set.eof_index(), None);
        assert_eq!(set.timeout_index(), None);
    }

    #[test]
    fn test_empty_exact_rejected() {
        assert!(matches!(
            PatternSet::new([Pattern::exact("")]),
            Err(PatternError::EmptyPattern)
        ));
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(matches!(
            PatternSet::new(Vec::new()),
            Err(PatternError::NoPatterns)
        ));
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            Pattern::regex("(unclosed"),
            Err(PatternError::InvalidRegex(_))
        ));
    }

    #[test]
    fn test_pattern_from_str() {
        let pattern: Pattern = "$ ".into();
        assert!(matches!(pattern, Pattern::Exact(ref s) if s == "$ "));
        assert!(!pattern.is_sentinel());
        assert!(Pattern::Eof.is_sentinel());
    }
}
