//! Pattern matcher implementations

use crate::result::PatternError;
use memchr::memmem::Finder;
use regex::Regex;

/// Location of a pattern match within the scanned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Start offset of the match (bytes, relative to the scanned text)
    pub start: usize,
    /// End offset of the match (exclusive)
    pub end: usize,
    /// Captured groups (for regex); index 0 is the whole match
    pub captures: Vec<String>,
}

/// Trait for textual pattern matching
pub trait Matcher: Send + Sync {
    /// Find the first match in `text`
    fn find(&self, text: &str) -> Option<Match>;
}

/// Substring matcher backed by a precompiled `memmem` finder
pub struct ExactMatcher {
    finder: Finder<'static>,
}

impl ExactMatcher {
    /// Create a new exact matcher
    pub fn new(needle: &str) -> Result<Self, PatternError> {
        if needle.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        Ok(Self {
            finder: Finder::new(needle.as_bytes()).into_owned(),
        })
    }
}

impl Matcher for ExactMatcher {
    fn find(&self, text: &str) -> Option<Match> {
        // A valid UTF-8 needle found in valid UTF-8 text always lands on
        // character boundaries.
        self.finder.find(text.as_bytes()).map(|start| Match {
            start,
            end: start + self.finder.needle().len(),
            captures: vec![],
        })
    }
}

/// Regex matcher
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    /// Wrap an already compiled expression
    pub fn new(regex: Regex) -> Self {
        Self { regex }
    }
}

impl Matcher for RegexMatcher {
    fn find(&self, text: &str) -> Option<Match> {
        let captures = self.regex.captures(text)?;
        let full_match = captures.get(0)?;

        // Groups that did not participate become empty strings so indices stay stable
        let captures = captures
            .iter()
            .map(|group| group.map(|m| m.as_str().to_owned()).unwrap_or_default())
            .collect();

        Some(Match {
            start: full_match.start(),
            end: full_match.end(),
            captures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_matcher() {
        let matcher = ExactMatcher::new("hello").unwrap();
        let result = matcher.find("world hello there").unwrap();
        assert_eq!((result.start, result.end), (6, 11));
        assert!(result.captures.is_empty());
    }

    #[test]
    fn test_exact_matcher_first_occurrence() {
        let matcher = ExactMatcher::new("test").unwrap();
        let result = matcher.find("test and test again").unwrap();
        assert_eq!((result.start, result.end), (0, 4));
    }

    #[test]
    fn test_exact_matcher_not_found() {
        let matcher = ExactMatcher::new("missing").unwrap();
        assert!(matcher.find("this text does not contain it").is_none());
    }

    #[test]
    fn test_exact_matcher_empty_pattern() {
        assert!(matches!(
            ExactMatcher::new(""),
            Err(PatternError::EmptyPattern)
        ));
    }

    #[test]
    fn test_exact_matcher_crlf_prompt() {
        let matcher = ExactMatcher::new("Rust user shell\r\n>> ").unwrap();
        let text = "booting...\r\nRust user shell\r\n>> ";
        let result = matcher.find(text).unwrap();
        assert_eq!(&text[result.start..result.end], "Rust user shell\r\n>> ");
    }

    #[test]
    fn test_exact_matcher_utf8() {
        let matcher = ExactMatcher::new("世界").unwrap();
        let result = matcher.find("hello 世界!").unwrap();
        assert_eq!((result.start, result.end), (6, 12));
    }

    #[test]
    fn test_regex_matcher() {
        let matcher = RegexMatcher::new(Regex::new(r"\d+").unwrap());
        let result = matcher.find("test 123 end").unwrap();
        assert_eq!((result.start, result.end), (5, 8));
        assert_eq!(result.captures, vec!["123"]);
    }

    #[test]
    fn test_regex_matcher_with_captures() {
        let matcher = RegexMatcher::new(Regex::new(r"exited with code (\d+)").unwrap());
        let result = matcher
            .find("Shell: Process 2 exited with code 0\r\n")
            .unwrap();
        assert_eq!(result.captures[0], "exited with code 0");
        assert_eq!(result.captures[1], "0");
    }

    #[test]
    fn test_regex_matcher_optional_group_keeps_index() {
        let matcher = RegexMatcher::new(Regex::new(r"(warn)?(error)").unwrap());
        let result = matcher.find("fatal error").unwrap();
        assert_eq!(result.captures, vec!["error", "", "error"]);
    }

    #[test]
    fn test_regex_matcher_no_match() {
        let matcher = RegexMatcher::new(Regex::new(r"\d+").unwrap());
        assert!(matcher.find("no numbers here").is_none());
    }
}
