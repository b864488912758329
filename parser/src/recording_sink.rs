use crate::{Elapsed, ReportError, ReportSink, TestResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A log line attached to a recorded test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedLog {
    pub time: String,
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedOutcome {
    pub result: TestResult,
    pub start_time: String,
    pub duration: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedTest {
    pub name: String,
    pub start_time: String,
    #[serde(default)]
    pub logs: Vec<RecordedLog>,
    #[serde(default)]
    pub outcome: Option<RecordedOutcome>,
}

/// Everything a recording sink saw, in a shape that serialises to JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedReport {
    pub launch_name: String,
    pub suite_name: String,
    pub start_stamp: String,
    #[serde(default)]
    pub finish_stamp: Option<String>,
    #[serde(default)]
    pub tests: Vec<RecordedTest>,
}

/// Journal entry for every call that changed the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SinkCall {
    CreateRun { name: String, suite: String, start_time: String },
    CreateTest { name: String, start_time: String },
    AppendLog { test: String, time: String, level: String, message: String },
    FinishTest { test: String, result: TestResult, duration: String },
    FinishRun { end_time: String },
}

/// In-memory sink, used for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    report: RecordedReport,
    started: bool,
    index: HashMap<String, usize>,
    calls: Vec<SinkCall>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self) -> &RecordedReport {
        &self.report
    }

    pub fn calls(&self) -> &[SinkCall] {
        &self.calls
    }

    pub fn into_report(self) -> RecordedReport {
        self.report
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(&self.report)?)
    }

    fn test_mut(&mut self, name: &str) -> Result<&mut RecordedTest, ReportError> {
        let idx = self
            .lookup_test_index(name)
            .ok_or_else(|| ReportError::UnknownTest(name.to_string()))?;
        Ok(&mut self.report.tests[idx])
    }
}

impl ReportSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn ensure_run(&mut self, name: &str, suite: &str, start_time: &str) -> Result<(), ReportError> {
        if self.started {
            return Ok(());
        }
        debug!("Recording run '{}' / suite '{}' at {}", name, suite, start_time);
        self.started = true;
        self.report.launch_name = name.to_string();
        self.report.suite_name = suite.to_string();
        self.report.start_stamp = start_time.to_string();
        self.calls.push(SinkCall::CreateRun {
            name: name.to_string(),
            suite: suite.to_string(),
            start_time: start_time.to_string(),
        });
        Ok(())
    }

    fn ensure_test(&mut self, name: &str, start_time: &str) -> Result<(), ReportError> {
        if self.lookup_test_index(name).is_some() {
            return Ok(());
        }
        if !self.started {
            return Err(ReportError::NoActiveRun);
        }
        debug!("Recording test '{}' at {}", name, start_time);
        self.index.insert(name.to_string(), self.report.tests.len());
        self.report.tests.push(RecordedTest {
            name: name.to_string(),
            start_time: start_time.to_string(),
            logs: Vec::new(),
            outcome: None,
        });
        self.calls.push(SinkCall::CreateTest {
            name: name.to_string(),
            start_time: start_time.to_string(),
        });
        Ok(())
    }

    fn append_log_line(
        &mut self,
        test: &str,
        time: &str,
        level: &str,
        message: &str,
    ) -> Result<(), ReportError> {
        self.test_mut(test)?.logs.push(RecordedLog {
            time: time.to_string(),
            level: level.to_string(),
            message: message.to_string(),
        });
        self.calls.push(SinkCall::AppendLog {
            test: test.to_string(),
            time: time.to_string(),
            level: level.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }

    fn finish_test(
        &mut self,
        test: &str,
        start_time: &str,
        result: &TestResult,
        elapsed: &Elapsed,
    ) -> Result<(), ReportError> {
        self.test_mut(test)?.outcome = Some(RecordedOutcome {
            result: result.clone(),
            start_time: start_time.to_string(),
            duration: elapsed.as_str().to_string(),
        });
        self.calls.push(SinkCall::FinishTest {
            test: test.to_string(),
            result: result.clone(),
            duration: elapsed.as_str().to_string(),
        });
        Ok(())
    }

    fn finish_run(&mut self, end_time: &str) -> Result<(), ReportError> {
        self.report.finish_stamp = Some(end_time.to_string());
        self.calls.push(SinkCall::FinishRun { end_time: end_time.to_string() });
        Ok(())
    }

    fn lookup_test_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}
