use crate::handlers;
use crate::line_grammar::{LineGrammar, LineShape};
use crate::{LineMatch, ParsingState, PatternMatcher, ReportError, ReportSink};
use std::fmt;
use tracing::{debug, info, warn};

/// What handlers need besides the parsing state: the sink and the names to report under.
#[derive(Debug)]
pub struct ReportContext<S> {
    pub sink: S,
    pub launch_name: String,
    pub suite_name: String,
}

impl<S> ReportContext<S> {
    pub fn new(sink: S, launch_name: impl Into<String>, suite_name: impl Into<String>) -> Self {
        Self {
            sink,
            launch_name: launch_name.into(),
            suite_name: suite_name.into(),
        }
    }
}

pub type Handler<S> =
    fn(&mut ReportContext<S>, ParsingState, &LineMatch) -> Result<ParsingState, ReportError>;

/// What to do when a handler fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop processing and return the error.
    #[default]
    Abort,
    /// Log the error, keep the state from before the failing handler and go on.
    Tolerate,
}

struct Rule<S> {
    shape: LineShape,
    matcher: PatternMatcher,
    handlers: Vec<Handler<S>>,
}

/// Table-driven line classifier with cumulative memory.
///
/// Rules are tried in the order they were added; the first one whose pattern
/// matches runs all of its handlers and no other rule sees the line.
pub struct StateMachine<S> {
    state: ParsingState,
    rules: Vec<Rule<S>>,
    context: ReportContext<S>,
    policy: ErrorPolicy,
}

impl<S: ReportSink> StateMachine<S> {
    /// An empty machine; add rules with [`StateMachine::rule`].
    pub fn new(context: ReportContext<S>, policy: ErrorPolicy) -> Self {
        Self {
            state: ParsingState::default(),
            rules: Vec::new(),
            context,
            policy,
        }
    }

    /// The standard rule table: merge on every recognised shape, side effects
    /// on structured-log, end and catch-all lines.
    pub fn with_grammar(
        grammar: &impl LineGrammar,
        context: ReportContext<S>,
        policy: ErrorPolicy,
    ) -> Result<Self, ReportError> {
        let merge: Handler<S> = handlers::merge;
        let structured_log: Handler<S> = handlers::structured_log;
        let end: Handler<S> = handlers::end;
        let catch_all: Handler<S> = handlers::catch_all;

        let mut machine = Self::new(context, policy);
        for shape in LineShape::ALL {
            let handlers = match shape {
                LineShape::Stamp | LineShape::Continue | LineShape::Pause | LineShape::Run => {
                    vec![merge]
                }
                LineShape::StructuredLog => vec![merge, structured_log],
                LineShape::End => vec![merge, end],
                LineShape::CatchAll => vec![catch_all],
            };
            machine = machine.rule(shape, grammar.matcher(shape)?, handlers);
        }

        info!(
            "State machine ready with {} rules, sink '{}', policy {:?}",
            machine.rules.len(),
            machine.context.sink.name(),
            policy
        );
        Ok(machine)
    }

    pub fn rule(mut self, shape: LineShape, matcher: PatternMatcher, handlers: Vec<Handler<S>>) -> Self {
        self.rules.push(Rule { shape, matcher, handlers });
        self
    }

    /// Classify one line and run its handlers.
    ///
    /// Returns the shape that matched, or `None` if the table has no catch-all
    /// and nothing matched.
    pub fn feed(&mut self, line: &str) -> Result<Option<LineShape>, ReportError> {
        let Some((rule, captures)) = self
            .rules
            .iter()
            .find_map(|rule| rule.matcher.captures(line).map(|caps| (rule, caps)))
        else {
            return Ok(None);
        };

        debug!("Line classified as {}: {:?}", rule.shape.name(), line);

        for handler in &rule.handlers {
            match handler(&mut self.context, self.state.clone(), &captures) {
                Ok(next) => self.state = next,
                Err(e) => match self.policy {
                    ErrorPolicy::Abort => return Err(e),
                    ErrorPolicy::Tolerate => {
                        warn!("Ignoring failure on {} line {:?}: {}", rule.shape.name(), line, e);
                    }
                },
            }
        }

        Ok(Some(rule.shape))
    }

    pub fn state(&self) -> &ParsingState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.context.sink
    }

    pub fn into_sink(self) -> S {
        self.context.sink
    }
}

impl<S> fmt::Debug for StateMachine<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("state", &self.state)
            .field("rules", &self.rules.iter().map(|r| r.shape).collect::<Vec<_>>())
            .field("launch_name", &self.context.launch_name)
            .field("suite_name", &self.context.suite_name)
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::junit_sink::JunitSink;
    use crate::line_grammar::DefaultGrammar;
    use crate::recording_sink::{RecordingSink, SinkCall};
    use crate::TestResult;

    fn machine(policy: ErrorPolicy) -> StateMachine<RecordingSink> {
        let context = ReportContext::new(RecordingSink::new(), "launch", "suite");
        StateMachine::with_grammar(&DefaultGrammar::new(), context, policy).unwrap()
    }

    fn feed_all(machine: &mut StateMachine<RecordingSink>, lines: &[&str]) {
        for line in lines {
            machine.feed(line).unwrap();
        }
    }

    #[test]
    fn test_merge_preserves_start_date() {
        let mut m = machine(ErrorPolicy::Abort);
        feed_all(&mut m, &[r#"  startTime: "2023-11-21T00:17:10Z""#, "=== RUN TestFoo"]);

        assert_eq!(m.state().start_date, "2023-11-21");
        assert_eq!(m.state().test, "TestFoo");
        assert!(m.sink().calls().is_empty());
    }

    #[test]
    fn test_structured_log_wins_over_catch_all() {
        let mut m = machine(ErrorPolicy::Abort);
        m.feed("=== RUN TestFoo").unwrap();
        let shape = m.feed(r#"time="2023-11-21T00:17:11Z" level=info msg="hello""#).unwrap();

        assert_eq!(shape, Some(LineShape::StructuredLog));
        assert_eq!(m.sink().report().tests[0].logs[0].message, "hello");
        assert_eq!(m.sink().report().tests[0].logs.len(), 1);
    }

    #[test]
    fn test_orphan_log_line_is_dropped() {
        let mut m = machine(ErrorPolicy::Abort);
        feed_all(
            &mut m,
            &[
                r#"time="2023-11-21T00:17:11Z" level=info msg="too early""#,
                "some plain output",
            ],
        );

        assert!(m.sink().calls().is_empty());
        assert_eq!(m.state().level, "info");
        assert_eq!(m.state().time, "");
    }

    #[test]
    fn test_catch_all_attaches_to_active_test() {
        let mut m = machine(ErrorPolicy::Abort);
        feed_all(
            &mut m,
            &[
                "=== RUN TestFoo",
                r#"time="2023-11-21T00:17:11Z" level=error msg="failed""#,
                "goroutine 1 [running]:",
                "    main.go:12",
            ],
        );

        let logs = &m.sink().report().tests[0].logs;
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[1].message, "goroutine 1 [running]:");
        assert_eq!(logs[2].level, "error");
        assert_eq!(logs[2].time, "2023-11-21T00:17:11Z");
    }

    #[test]
    fn test_end_finishes_named_test_not_current_one() {
        let mut m = machine(ErrorPolicy::Abort);
        feed_all(
            &mut m,
            &[
                "=== RUN TestA",
                r#"time="2023-11-21T00:17:11Z" level=info msg="a""#,
                "=== RUN TestB",
                r#"time="2023-11-21T00:17:12Z" level=info msg="b""#,
                "--- FAIL: TestA (2.50s)",
            ],
        );

        let report = m.sink().report();
        let a = &report.tests[0];
        assert_eq!(a.name, "TestA");
        assert_eq!(a.outcome.as_ref().unwrap().result, TestResult::Fail);
        assert_eq!(a.outcome.as_ref().unwrap().start_time, "2023-11-21T00:17:12Z");
        assert!(report.tests[1].outcome.is_none());
        assert_eq!(m.state().test, "TestA");
    }

    #[test]
    fn test_end_creates_missing_test() {
        let mut m = machine(ErrorPolicy::Abort);
        feed_all(
            &mut m,
            &[
                "=== RUN TestA",
                r#"time="2023-11-21T00:17:11Z" level=info msg="a""#,
                "--- PASS: TestGhost (0.01s)",
            ],
        );

        assert!(matches!(
            m.sink().calls().last(),
            Some(SinkCall::FinishTest { test, .. }) if test == "TestGhost"
        ));
        assert_eq!(m.sink().lookup_test_index("TestGhost"), Some(1));
    }

    #[test]
    fn test_bad_duration_aborts_by_default() {
        let mut m = machine(ErrorPolicy::Abort);
        feed_all(&mut m, &["=== RUN TestFoo", r#"time="2023-11-21T00:17:11Z" level=info msg="x""#]);

        let err = m.feed("--- PASS: TestFoo (abcs)").unwrap_err();
        assert!(matches!(err, ReportError::InvalidDuration(d) if d == "abc"));
    }

    #[test]
    fn test_bad_duration_tolerated() {
        let mut m = machine(ErrorPolicy::Tolerate);
        feed_all(
            &mut m,
            &[
                "=== RUN TestFoo",
                r#"time="2023-11-21T00:17:11Z" level=info msg="x""#,
                "--- PASS: TestFoo (abcs)",
                "trailing output",
            ],
        );

        let test = &m.sink().report().tests[0];
        assert!(test.outcome.is_none());
        assert_eq!(test.logs.last().unwrap().message, "trailing output");
    }

    #[test]
    fn test_tolerated_failure_keeps_merge_but_not_handler_state() {
        let context = ReportContext::new(JunitSink::new(), "launch", "suite");
        let mut m = StateMachine::with_grammar(&DefaultGrammar::new(), context, ErrorPolicy::Tolerate).unwrap();

        m.feed("=== RUN TestOld").unwrap();
        m.feed(r#"time="2023-11-21T00:17:11Z" level=info msg="a""#).unwrap();
        // No startTime stamp, so neither line gets a usable date.
        m.feed("    logger.go:42: 00:17:12 | TestBar | b").unwrap();
        m.feed(r#"time="T00:17:13Z" level=warn msg="c""#).unwrap();

        assert_eq!(m.state().test, "TestBar");
        assert_eq!(m.state().level, "warn");
        assert_eq!(m.state().time, "2023-11-21T00:17:11Z");
        assert_eq!(m.sink().lookup_test_index("TestOld"), Some(0));
        assert_eq!(m.sink().lookup_test_index("TestBar"), None);
    }

    #[test]
    fn test_custom_rule_table_without_catch_all() {
        let context = ReportContext::new(RecordingSink::new(), "launch", "suite");
        let merge: Handler<RecordingSink> = handlers::merge;
        let mut m = StateMachine::new(context, ErrorPolicy::Abort).rule(
            LineShape::Run,
            DefaultGrammar::new().matcher(LineShape::Run).unwrap(),
            vec![merge],
        );

        assert_eq!(m.feed("=== RUN TestFoo").unwrap(), Some(LineShape::Run));
        assert_eq!(m.feed("hello").unwrap(), None);
        assert_eq!(m.state().test, "TestFoo");
    }
}
