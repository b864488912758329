use crate::{Elapsed, ReportError, TestResult};

/// Receiver of the structure discovered while parsing a log.
///
/// Calls arrive in the order lines are classified. All timestamps are RFC3339
/// text as synthesised by the state machine and may be malformed; converting
/// them is the sink's business.
pub trait ReportSink {
    /// Returns the name of this sink (e.g., "portal", "junit")
    fn name(&self) -> &'static str;

    /// Create the run and its suite unless they already exist.
    fn ensure_run(&mut self, name: &str, suite: &str, start_time: &str) -> Result<(), ReportError>;

    /// Create the test case unless one with exactly this name is already known.
    fn ensure_test(&mut self, name: &str, start_time: &str) -> Result<(), ReportError>;

    /// Attach a log line to a known test.
    fn append_log_line(
        &mut self,
        test: &str,
        time: &str,
        level: &str,
        message: &str,
    ) -> Result<(), ReportError>;

    fn finish_test(
        &mut self,
        test: &str,
        start_time: &str,
        result: &TestResult,
        elapsed: &Elapsed,
    ) -> Result<(), ReportError>;

    /// Close the run. `end_time` may be empty when no line carried a timestamp.
    fn finish_run(&mut self, end_time: &str) -> Result<(), ReportError>;

    fn lookup_test_index(&self, name: &str) -> Option<usize>;
}
