//! Scenario runner: a scripted expect/send sequence mapped to a verdict
//!
//! A scenario is an ordered list of [`Step`]s run against one [`Session`].
//! Expect steps list patterns, each optionally tagged with a [`Verdict`];
//! matching a tagged pattern ends the run with that verdict, matching an
//! untagged one moves on to the next step. Running off the end of the list is
//! a success.

mod parse;

pub use parse::{parse_duration, parse_steps, unescape, unescape_bytes, ParseError};

use crate::pattern::{Pattern, PatternSet};
use crate::result::{ExpectError, Outcome};
use crate::session::Session;
use std::fmt;
use std::time::{Duration, Instant};

/// Final classification of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every step passed, or a success pattern matched.
    Success,
    /// A failure pattern matched.
    Failure,
    /// An expect step ran out of time.
    Timeout,
    /// The child closed its output (or exited) while input or output was still expected.
    UnexpectedExit,
    /// The harness itself failed: spawn error, PTY failure, bad pattern.
    Error(String),
}

impl Verdict {
    /// Short bracketed tag for reports
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Success => "[SUCCESS]",
            Verdict::Failure => "[FAILURE]",
            Verdict::Timeout => "[TIMEOUT]",
            Verdict::UnexpectedExit => "[EOF]",
            Verdict::Error(_) => "[ERROR]",
        }
    }

    /// Exit status for a process reporting this verdict
    pub fn exit_code(&self) -> i32 {
        match self {
            Verdict::Success => 0,
            Verdict::Failure => 1,
            Verdict::Timeout => 2,
            Verdict::UnexpectedExit => 3,
            Verdict::Error(_) => 4,
        }
    }

    /// Whether this verdict counts as a pass
    pub fn is_success(&self) -> bool {
        matches!(self, Verdict::Success)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Error(detail) => write!(f, "{} {}", self.label(), detail),
            _ => f.write_str(self.label()),
        }
    }
}

/// Patterns for one expect step, with the verdict each one implies.
#[derive(Debug, Clone, Default)]
pub struct Expectation {
    entries: Vec<(Pattern, Option<Verdict>)>,
    timeout: Option<Duration>,
}

impl Expectation {
    /// An expectation with no patterns yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for `pattern` and continue when it matches
    pub fn pattern(mut self, pattern: impl Into<Pattern>) -> Self {
        self.entries.push((pattern.into(), None));
        self
    }

    /// Finish the run with `verdict` when `pattern` matches
    pub fn on(mut self, pattern: impl Into<Pattern>, verdict: Verdict) -> Self {
        self.entries.push((pattern.into(), Some(verdict)));
        self
    }

    /// Wait at most `timeout` instead of the session default
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Number of patterns
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no pattern was added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn compile(&self) -> Result<PatternSet, ExpectError> {
        let patterns = self.entries.iter().map(|(pattern, _)| pattern.clone());
        Ok(PatternSet::new(patterns)?)
    }

    /// Map an outcome to `Some(verdict)` to stop, or `None` to continue.
    fn judge(&self, outcome: &Outcome) -> Option<Verdict> {
        match (outcome, outcome.pattern_index()) {
            (_, Some(idx)) => self.entries.get(idx).and_then(|(_, v)| v.clone()),
            (Outcome::TimedOut { .. }, None) => Some(Verdict::Timeout),
            (Outcome::EndOfStream { .. }, None) => Some(Verdict::UnexpectedExit),
            (Outcome::Matched(_), None) => None,
        }
    }
}

/// One step of a scenario.
#[derive(Debug, Clone)]
pub enum Step {
    /// Wait for output.
    Expect(Expectation),
    /// Write raw bytes.
    Send(Vec<u8>),
    /// Write a line (a newline is appended).
    SendLine(String),
    /// Pause without reading.
    Sleep(Duration),
}

/// Result of running a scenario.
#[derive(Debug, Clone)]
pub struct Report {
    /// The classification.
    pub verdict: Verdict,
    /// Index of the step that decided the verdict, `None` if all steps passed.
    pub step: Option<usize>,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

/// An ordered list of steps.
///
/// # Examples
///
/// ```no_run
/// use ptyexpect::scenario::{Expectation, Scenario, Verdict};
/// use ptyexpect::{Pattern, Session};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let scenario = Scenario::new()
///     .expect(Expectation::new().pattern("Rust user shell\r\n>> ").timeout(Duration::from_secs(120)))
///     .send_line("ch8b_usertest")
///     .expect(
///         Expectation::new()
///             .on("Shell: Process 2 exited with code 0", Verdict::Success)
///             .on("Panic", Verdict::Failure)
///             .timeout(Duration::from_secs(300)),
///     );
///
/// let report = scenario.run(Session::spawn("cargo run")?).await;
/// std::process::exit(report.verdict.exit_code());
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    steps: Vec<Step>,
}

impl Scenario {
    /// An empty scenario (which trivially succeeds)
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary step
    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Append an expect step
    pub fn expect(self, expectation: Expectation) -> Self {
        self.step(Step::Expect(expectation))
    }

    /// Append a raw send step
    pub fn send(self, data: impl Into<Vec<u8>>) -> Self {
        self.step(Step::Send(data.into()))
    }

    /// Append a send-line step
    pub fn send_line(self, line: impl Into<String>) -> Self {
        self.step(Step::SendLine(line.into()))
    }

    /// Append a pause
    pub fn sleep(self, duration: Duration) -> Self {
        self.step(Step::Sleep(duration))
    }

    /// The steps in order
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step against `session`, then terminate the child.
    pub async fn run(&self, mut session: Session) -> Report {
        let started = Instant::now();
        let (verdict, step) = match self.drive(&mut session).await {
            Some((idx, verdict)) => (verdict, Some(idx)),
            None => (Verdict::Success, None),
        };

        if let Err(e) = session.terminate().await {
            tracing::warn!(error = %e, "failed to terminate child after scenario");
        }

        let report = Report {
            verdict,
            step,
            elapsed: started.elapsed(),
        };
        tracing::info!(verdict = %report.verdict, step = ?report.step, elapsed = ?report.elapsed, "scenario finished");
        report
    }

    async fn drive(&self, session: &mut Session) -> Option<(usize, Verdict)> {
        for (idx, step) in self.steps.iter().enumerate() {
            tracing::debug!(step = idx, "running {:?}", step);
            let decided = match step {
                Step::Expect(expectation) => expect_step(session, expectation).await,
                Step::Send(data) => send_result(session.send(data).await),
                Step::SendLine(line) => send_result(session.send_line(line).await),
                Step::Sleep(duration) => {
                    tokio::time::sleep(*duration).await;
                    None
                }
            };
            if let Some(verdict) = decided {
                return Some((idx, verdict));
            }
        }
        None
    }
}

async fn expect_step(session: &mut Session, expectation: &Expectation) -> Option<Verdict> {
    let patterns = match expectation.compile() {
        Ok(patterns) => patterns,
        Err(e) => return Some(Verdict::Error(e.to_string())),
    };
    let timeout = expectation.timeout.unwrap_or(session.timeout());

    match session.expect(&patterns, timeout).await {
        Ok(outcome) => expectation.judge(&outcome),
        Err(e) => Some(Verdict::Error(e.to_string())),
    }
}

fn send_result(result: Result<(), ExpectError>) -> Option<Verdict> {
    match result {
        Ok(()) => None,
        Err(ExpectError::ClosedSession) => Some(Verdict::UnexpectedExit),
        Err(e) => Some(Verdict::Error(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::MatchResult;

    fn matched(idx: usize) -> Outcome {
        Outcome::Matched(MatchResult {
            pattern_index: idx,
            matched: String::new(),
            start: 0,
            end: 0,
            before: String::new(),
            captures: vec![],
        })
    }

    fn classify() -> Expectation {
        Expectation::new()
            .on("Shell: Process 2 exited with code 0", Verdict::Success)
            .on("Panic", Verdict::Failure)
    }

    #[test]
    fn test_tagged_match_decides() {
        assert_eq!(classify().judge(&matched(0)), Some(Verdict::Success));
        assert_eq!(classify().judge(&matched(1)), Some(Verdict::Failure));
    }

    #[test]
    fn test_untagged_match_continues() {
        let expectation = Expectation::new().pattern(">> ");
        assert_eq!(expectation.judge(&matched(0)), None);
    }

    #[test]
    fn test_undeclared_sentinels() {
        let timed_out = Outcome::TimedOut {
            pattern_index: None,
            before: String::new(),
        };
        let eof = Outcome::EndOfStream {
            pattern_index: None,
            before: String::new(),
        };
        assert_eq!(classify().judge(&timed_out), Some(Verdict::Timeout));
        assert_eq!(classify().judge(&eof), Some(Verdict::UnexpectedExit));
    }

    #[test]
    fn test_declared_sentinels() {
        let expectation = Expectation::new()
            .pattern("doomgeneric_tick")
            .pattern(Pattern::Eof)
            .on(Pattern::Timeout, Verdict::Failure);

        let eof = Outcome::EndOfStream {
            pattern_index: Some(1),
            before: String::new(),
        };
        let timed_out = Outcome::TimedOut {
            pattern_index: Some(2),
            before: String::new(),
        };
        assert_eq!(expectation.judge(&eof), None);
        assert_eq!(expectation.judge(&timed_out), Some(Verdict::Failure));
    }

    #[test]
    fn test_verdict_labels_and_codes() {
        assert_eq!(Verdict::Success.label(), "[SUCCESS]");
        assert_eq!(Verdict::UnexpectedExit.to_string(), "[EOF]");
        assert_eq!(Verdict::Error("spawn failed".into()).to_string(), "[ERROR] spawn failed");
        assert_eq!(Verdict::Success.exit_code(), 0);
        assert_eq!(Verdict::Timeout.exit_code(), 2);
        assert!(!Verdict::Failure.is_success());
    }

    #[test]
    fn test_send_result_mapping() {
        assert_eq!(send_result(Ok(())), None);
        assert_eq!(
            send_result(Err(ExpectError::ClosedSession)),
            Some(Verdict::UnexpectedExit)
        );
        assert!(matches!(
            send_result(Err(ExpectError::Process("EBADF".into()))),
            Some(Verdict::Error(_))
        ));
    }

    #[test]
    fn test_empty_expectation_is_error() {
        assert!(Expectation::new().compile().is_err());
    }
}
