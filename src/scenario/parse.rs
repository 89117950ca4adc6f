//! Textual step syntax for scenarios built from the command line
//!
//! Each step is `key=value`:
//!
//! | key | step |
//! |-----|------|
//! | `expect` / `expect-re` | wait for text / a regex, then continue |
//! | `success` / `success-re` | pattern that ends the run as a success |
//! | `failure` / `failure-re` | pattern that ends the run as a failure |
//! | `eof` | wait for the child to close its output |
//! | `send` / `sendline` | write text (`sendline` appends a newline) |
//! | `timeout` | timeout for the next expect step, e.g. `300s` |
//! | `sleep` | pause, e.g. `500ms` |
//!
//! Consecutive `success`/`failure` entries form a single expect step, so
//! `success=ok failure=Panic` waits for whichever comes first. Values accept
//! the escapes `\r \n \t \e \\` and `\xHH`.

use super::{Expectation, Scenario, Verdict};
use crate::pattern::Pattern;
use crate::result::PatternError;
use std::time::Duration;
use thiserror::Error;

/// Errors from parsing step or duration syntax.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The entry has no `=`.
    #[error("Expected key=value, got: {0}")]
    MissingValue(String),

    /// The key is not a known step.
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// Malformed duration.
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Malformed escape sequence.
    #[error("Invalid escape sequence in: {0}")]
    InvalidEscape(String),

    /// A regex or exact pattern was rejected.
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Parse a duration such as `500ms`, `2s`, `1.5s` or `10m`.
pub fn parse_duration(s: &str) -> Result<Duration, ParseError> {
    let s = s.trim();
    let invalid = || ParseError::InvalidDuration(s.to_string());

    let (number, scale) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, 0.001)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, 1.0)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60.0)
    } else {
        return Err(invalid());
    };

    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    Duration::try_from_secs_f64(value * scale).map_err(|_| invalid())
}

/// Expand `\r \n \t \e \0 \\ \"` and `\xHH` escapes into text.
///
/// `\xHH` names a Unicode code point, so `\xff` becomes `ÿ`. Use
/// [`unescape_bytes`] for raw terminal input.
pub fn unescape(s: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(s.len());
    expand(s, |piece| match piece {
        Piece::Char(ch) => out.push(ch),
        Piece::Byte(byte) => out.push(char::from(byte)),
    })?;
    Ok(out)
}

/// Expand the same escapes as [`unescape`], but `\xHH` is a single raw byte.
///
/// `send=\xff` therefore writes the byte `0xff`, not its UTF-8 encoding.
pub fn unescape_bytes(s: &str) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::with_capacity(s.len());
    expand(s, |piece| match piece {
        Piece::Char(ch) => out.extend_from_slice(ch.encode_utf8(&mut [0u8; 4]).as_bytes()),
        Piece::Byte(byte) => out.push(byte),
    })?;
    Ok(out)
}

enum Piece {
    Char(char),
    Byte(u8),
}

fn expand(s: &str, mut emit: impl FnMut(Piece)) -> Result<(), ParseError> {
    let invalid = || ParseError::InvalidEscape(s.to_string());
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            emit(Piece::Char(ch));
            continue;
        }
        let piece = match chars.next().ok_or_else(invalid)? {
            'r' => Piece::Char('\r'),
            'n' => Piece::Char('\n'),
            't' => Piece::Char('\t'),
            'e' => Piece::Char('\x1b'),
            '0' => Piece::Char('\0'),
            '\\' => Piece::Char('\\'),
            '"' => Piece::Char('"'),
            'x' => {
                let hex: String = chars.by_ref().take(2).collect();
                if hex.len() != 2 {
                    return Err(invalid());
                }
                Piece::Byte(u8::from_str_radix(&hex, 16).map_err(|_| invalid())?)
            }
            _ => return Err(invalid()),
        };
        emit(piece);
    }

    Ok(())
}

/// Build a scenario from `key=value` step entries.
///
/// # Examples
///
/// ```
/// use ptyexpect::scenario::parse_steps;
///
/// let scenario = parse_steps([
///     r"expect=Rust user shell\r\n>> ",
///     "sendline=ch8b_usertest",
///     "timeout=300s",
///     "success=Shell: Process 2 exited with code 0",
///     "failure=Panic",
/// ])
/// .unwrap();
/// assert_eq!(scenario.steps().len(), 3);
/// ```
pub fn parse_steps<I, S>(entries: I) -> Result<Scenario, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut scenario = Scenario::new();
    let mut timeout: Option<Duration> = None;
    // Open success/failure group, flushed when any other step follows
    let mut group: Option<Expectation> = None;

    for entry in entries {
        let entry = entry.as_ref();
        let (key, value) = match entry.split_once('=') {
            Some((key, value)) => (key.trim(), Some(value)),
            None => (entry.trim(), None),
        };
        let raw = || value.ok_or_else(|| ParseError::MissingValue(entry.to_string()));

        let verdict = match key {
            "success" | "success-re" => Some(Verdict::Success),
            "failure" | "failure-re" => Some(Verdict::Failure),
            _ => None,
        };
        if let Some(verdict) = verdict {
            let pattern = pattern_for(key, raw()?)?;
            let current = group.take().unwrap_or_else(|| with_timeout(timeout.take()));
            group = Some(current.on(pattern, verdict));
            continue;
        }

        if let Some(pending) = group.take() {
            scenario = scenario.expect(pending);
        }

        scenario = match key {
            "expect" | "expect-re" => {
                let pattern = pattern_for(key, raw()?)?;
                scenario.expect(with_timeout(timeout.take()).pattern(pattern))
            }
            "eof" => scenario.expect(with_timeout(timeout.take()).pattern(Pattern::Eof)),
            "send" => scenario.send(unescape_bytes(raw()?)?),
            "sendline" => scenario.send_line(unescape(raw()?)?),
            "sleep" => scenario.sleep(parse_duration(raw()?)?),
            "timeout" => {
                timeout = Some(parse_duration(raw()?)?);
                scenario
            }
            _ => return Err(ParseError::UnknownStep(key.to_string())),
        };
    }

    if let Some(pending) = group {
        scenario = scenario.expect(pending);
    }
    Ok(scenario)
}

fn with_timeout(timeout: Option<Duration>) -> Expectation {
    match timeout {
        Some(timeout) => Expectation::new().timeout(timeout),
        None => Expectation::new(),
    }
}

fn pattern_for(key: &str, raw: &str) -> Result<Pattern, ParseError> {
    if key.ends_with("-re") {
        // Regex syntax has its own escapes; pass it through untouched
        Ok(Pattern::regex(raw)?)
    } else {
        let text = unescape(raw)?;
        if text.is_empty() {
            return Err(PatternError::EmptyPattern.into());
        }
        Ok(Pattern::exact(text))
    }
}
