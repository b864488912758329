use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named captures of a single matched line.
///
/// Groups that did not take part in the match are absent rather than empty.
pub type LineMatch = BTreeMap<String, String>;

/// Cumulative parsing memory carried from one line to the next.
///
/// Empty strings mean "not seen yet".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsingState {
    pub test: String,
    pub step: String,
    pub level: String,
    pub start_date: String,
    pub time: String,
    /// Reserved, never written by the parser.
    pub launch: String,
}

impl ParsingState {
    /// Copy every known field present in `captures` into the state.
    /// Fields the match does not carry keep their previous value.
    pub fn merge(mut self, captures: &LineMatch) -> Self {
        for (name, value) in captures {
            let slot = match name.as_str() {
                "test" => &mut self.test,
                "step" => &mut self.step,
                "level" => &mut self.level,
                "startDate" => &mut self.start_date,
                _ => continue,
            };
            slot.clone_from(value);
        }
        self
    }
}

/// Terminal result reported by an end line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestResult {
    Pass,
    Fail,
    Skip,
    Other(String),
}

impl TestResult {
    pub fn from_harness(result: &str) -> Self {
        match result {
            "PASS" => TestResult::Pass,
            "FAIL" => TestResult::Fail,
            "SKIP" => TestResult::Skip,
            other => TestResult::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TestResult::Pass => "PASS",
            TestResult::Fail => "FAIL",
            TestResult::Skip => "SKIP",
            TestResult::Other(raw) => raw,
        }
    }

    /// Item status understood by the report portal. Unknown results count as passed.
    pub fn status(&self) -> &'static str {
        match self {
            TestResult::Fail => "failed",
            TestResult::Skip => "skipped",
            TestResult::Pass | TestResult::Other(_) => "passed",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid line pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
    #[error("Invalid duration: {0:?}")]
    InvalidDuration(String),
    #[error("Unknown test: {0}")]
    UnknownTest(String),
    #[error("No active run")]
    NoActiveRun,
    #[error("JUnit error: {0}")]
    Junit(String),
    #[error("Report sink error: {0}")]
    Sink(String),
}

impl From<String> for ReportError {
    fn from(msg: String) -> Self {
        ReportError::Sink(msg)
    }
}

impl From<&str> for ReportError {
    fn from(msg: &str) -> Self {
        ReportError::Sink(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn captures(pairs: &[(&str, &str)]) -> LineMatch {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let state = ParsingState::default()
            .merge(&captures(&[("startDate", "2023-11-21")]))
            .merge(&captures(&[("test", "TestFoo"), ("step", "")]));

        assert_eq!(state.start_date, "2023-11-21");
        assert_eq!(state.test, "TestFoo");
        assert_eq!(state.step, "");
    }

    #[test]
    fn test_merge_ignores_unknown_captures() {
        let state = ParsingState::default().merge(&captures(&[("msg", "hello"), ("level", "info")]));

        assert_eq!(state.level, "info");
        assert_eq!(state, ParsingState { level: "info".into(), ..Default::default() });
    }

    #[test]
    fn test_result_status_mapping() {
        assert_eq!(TestResult::from_harness("FAIL").status(), "failed");
        assert_eq!(TestResult::from_harness("SKIP").status(), "skipped");
        assert_eq!(TestResult::from_harness("PASS").status(), "passed");
        assert_eq!(TestResult::from_harness("pass"), TestResult::Other("pass".into()));
        assert_eq!(TestResult::from_harness("pass").status(), "passed");
    }
}
