//! The catalogue of recognised line shapes.
//!
//! Shapes are tried in [`LineShape::ALL`] order and the first match wins, so
//! the catch-all must stay last.

use crate::{PatternMatcher, ReportError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Prefix kuttl puts in front of every test name.
pub const DEFAULT_HARNESS_PREFIX: &str = "kuttl/harness/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineShape {
    /// `startTime: "2023-11-21T00:17:10Z"`, seeds the date for later lines.
    Stamp,
    /// `=== CONT test/step`
    Continue,
    /// `=== PAUSE test/step`
    Pause,
    /// `=== RUN test/step`
    Run,
    /// Argo `time=... level=... msg=...` or kuttl `logger ... hh:mm:ss | test/step | msg`
    StructuredLog,
    /// `--- PASS: test (1.00s)`
    End,
    /// Anything else, captured whole as `line`.
    CatchAll,
}

impl LineShape {
    pub const ALL: [LineShape; 7] = [
        LineShape::Stamp,
        LineShape::Continue,
        LineShape::Pause,
        LineShape::Run,
        LineShape::StructuredLog,
        LineShape::End,
        LineShape::CatchAll,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LineShape::Stamp => "stamp",
            LineShape::Continue => "continue",
            LineShape::Pause => "pause",
            LineShape::Run => "run",
            LineShape::StructuredLog => "structured-log",
            LineShape::End => "end",
            LineShape::CatchAll => "catch-all",
        }
    }
}

/// Pattern text for every line shape.
///
/// Implementors only describe the patterns; compiling them is shared.
pub trait LineGrammar {
    fn stamp(&self) -> String;
    fn cont(&self) -> String;
    fn pause(&self) -> String;
    fn run(&self) -> String;
    /// Mutually exclusive alternatives; they may reuse capture names.
    fn structured_log(&self) -> Vec<String>;
    fn end(&self) -> String;

    fn catch_all(&self) -> String {
        r"(?P<line>^.*$)".to_string()
    }

    fn patterns(&self, shape: LineShape) -> Vec<String> {
        match shape {
            LineShape::Stamp => vec![self.stamp()],
            LineShape::Continue => vec![self.cont()],
            LineShape::Pause => vec![self.pause()],
            LineShape::Run => vec![self.run()],
            LineShape::StructuredLog => self.structured_log(),
            LineShape::End => vec![self.end()],
            LineShape::CatchAll => vec![self.catch_all()],
        }
    }

    fn matcher(&self, shape: LineShape) -> Result<PatternMatcher, ReportError> {
        let patterns = self.patterns(shape);
        debug!("Compiling {} pattern(s) for {} lines", patterns.len(), shape.name());
        PatternMatcher::any_of(&patterns)
    }
}

/// Go test runner, kuttl and Argo workflow output.
#[derive(Debug, Clone)]
pub struct DefaultGrammar {
    harness_prefix: String,
}

impl DefaultGrammar {
    pub fn new() -> Self {
        Self::with_harness_prefix(DEFAULT_HARNESS_PREFIX)
    }

    /// `prefix` is stripped from test names when present; empty disables stripping.
    pub fn with_harness_prefix(prefix: &str) -> Self {
        Self { harness_prefix: prefix.to_string() }
    }

    fn optional_prefix(&self) -> String {
        if self.harness_prefix.is_empty() {
            String::new()
        } else {
            format!("(?:{})?", regex::escape(&self.harness_prefix))
        }
    }

    fn announcement(&self, verb: &str) -> String {
        format!(
            r"^=== {verb}\W*{}(?P<test>[\w/\-]*)/?(?P<step>[\w\-]*)?.*$",
            self.optional_prefix()
        )
    }
}

impl Default for DefaultGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl LineGrammar for DefaultGrammar {
    fn stamp(&self) -> String {
        r#"^.*startTime.*"(?P<startDate>[0-9:\-]*)T.*""#.to_string()
    }

    fn cont(&self) -> String {
        self.announcement("CONT")
    }

    fn pause(&self) -> String {
        self.announcement("PAUSE")
    }

    fn run(&self) -> String {
        self.announcement("RUN")
    }

    fn structured_log(&self) -> Vec<String> {
        let argo = r#"^time="(?P<date>[0-9:\-]*)T(?P<timestamp>\d\d:\d\d:\d\d)Z".*level=(?P<level>\w+).*msg="(?P<msg>.*)".*$"#;
        let kuttl = r"^.*logger.*(?P<timestamp>\d\d:\d\d:\d\d) \| (?P<test>[\w\-]*)/?(?P<step>[\w\-]*)? \| ?(?P<msg>.*)$";
        vec![argo.to_string(), kuttl.to_string()]
    }

    fn end(&self) -> String {
        format!(
            r"^.*--- (?P<result>\w+): {}(?P<test>[\w/\-]+)\W*\((?P<duration>\w+\.?\w*)s.*$",
            self.optional_prefix()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn classify(grammar: &DefaultGrammar, line: &str) -> (LineShape, crate::LineMatch) {
        for shape in LineShape::ALL {
            if let Some(caps) = grammar.matcher(shape).unwrap().captures(line) {
                return (shape, caps);
            }
        }
        unreachable!("catch-all matches every line")
    }

    fn pairs(caps: &crate::LineMatch) -> Vec<(&str, &str)> {
        caps.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
    }

    #[test]
    fn test_end_line() {
        let grammar = DefaultGrammar::new();
        let (shape, caps) = classify(&grammar, "--- PASS: TestCreateAndUseAccount (5.56s)");

        assert_eq!(shape, LineShape::End);
        assert_eq!(
            pairs(&caps),
            vec![("duration", "5.56"), ("result", "PASS"), ("test", "TestCreateAndUseAccount")]
        );
    }

    #[test]
    fn test_end_line_strips_harness_prefix() {
        let grammar = DefaultGrammar::new();
        let (_, caps) = classify(&grammar, "    --- FAIL: kuttl/harness/1-001_validate (12.30s)");

        assert_eq!(caps["test"], "1-001_validate");
        assert_eq!(caps["result"], "FAIL");
    }

    #[test]
    fn test_stamp_line() {
        let grammar = DefaultGrammar::new();
        let (shape, caps) = classify(&grammar, r#"  startTime: "2023-11-21T00:17:10Z""#);

        assert_eq!(shape, LineShape::Stamp);
        assert_eq!(pairs(&caps), vec![("startDate", "2023-11-21")]);
    }

    #[test]
    fn test_run_pause_cont() {
        let grammar = DefaultGrammar::new();

        let (shape, caps) = classify(&grammar, "=== RUN   kuttl/harness/1-040_validate_quoted");
        assert_eq!(shape, LineShape::Run);
        assert_eq!(caps["test"], "1-040_validate_quoted");

        let (shape, caps) = classify(&grammar, "=== PAUSE kuttl/harness/1-040_validate_quoted");
        assert_eq!(shape, LineShape::Pause);
        assert_eq!(caps["test"], "1-040_validate_quoted");

        let (shape, caps) = classify(&grammar, "=== CONT  TestFoo/sub_test");
        assert_eq!(shape, LineShape::Continue);
        assert_eq!(caps["test"], "TestFoo/sub_test");
    }

    #[test]
    fn test_argo_log_line() {
        let grammar = DefaultGrammar::new();
        let (shape, caps) = classify(&grammar, r#"time="2023-11-21T00:17:11Z" level=info msg="hello""#);

        assert_eq!(shape, LineShape::StructuredLog);
        assert_eq!(
            pairs(&caps),
            vec![("date", "2023-11-21"), ("level", "info"), ("msg", "hello"), ("timestamp", "00:17:11")]
        );
    }

    #[test]
    fn test_kuttl_log_line() {
        let grammar = DefaultGrammar::new();
        let (shape, caps) = classify(&grammar, "    logger.go:42: 00:17:12 | TestBar/stepA | doing work");

        assert_eq!(shape, LineShape::StructuredLog);
        assert_eq!(
            pairs(&caps),
            vec![("msg", "doing work"), ("step", "stepA"), ("test", "TestBar"), ("timestamp", "00:17:12")]
        );
    }

    #[test]
    fn test_catch_all_is_total() {
        let grammar = DefaultGrammar::new();
        for line in ["", "panic: boom", "    at foo.go:12", "=== NAME TestFoo"] {
            let (shape, caps) = classify(&grammar, line);
            assert_eq!(shape, LineShape::CatchAll);
            assert_eq!(caps["line"], line);
        }
    }

    #[test]
    fn test_empty_prefix_keeps_full_name() {
        let grammar = DefaultGrammar::with_harness_prefix("");
        let (_, caps) = classify(&grammar, "=== RUN kuttl/harness/foo");
        assert_eq!(caps["test"], "kuttl/harness/foo");
    }
}
