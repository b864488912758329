use crate::timestamp::{parse_rfc3339, Elapsed};
use crate::{ReportError, ReportSink, TestResult};
use chrono::{DateTime, FixedOffset};
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug)]
struct JunitCase {
    name: String,
    start: DateTime<FixedOffset>,
    output: Vec<String>,
    outcome: Option<(TestResult, Elapsed)>,
}

/// Renders the run as a JUnit XML document instead of uploading it.
#[derive(Debug, Default)]
pub struct JunitSink {
    launch_name: String,
    suite_name: String,
    start: Option<DateTime<FixedOffset>>,
    end: Option<DateTime<FixedOffset>>,
    cases: Vec<JunitCase>,
    index: HashMap<String, usize>,
}

impl JunitSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn case_mut(&mut self, name: &str) -> Result<&mut JunitCase, ReportError> {
        let idx = self
            .lookup_test_index(name)
            .ok_or_else(|| ReportError::UnknownTest(name.to_string()))?;
        Ok(&mut self.cases[idx])
    }

    fn test_case(case: &JunitCase) -> TestCase {
        let status = match &case.outcome {
            Some((TestResult::Fail, _)) => TestCaseStatus::non_success(NonSuccessKind::Failure),
            Some((TestResult::Skip, _)) => TestCaseStatus::skipped(),
            Some(_) => TestCaseStatus::success(),
            None => {
                let mut status = TestCaseStatus::non_success(NonSuccessKind::Error);
                status.set_message("no result reported");
                status
            }
        };

        let mut test_case = TestCase::new(case.name.as_str(), status);
        test_case.set_timestamp(case.start);
        if let Some((_, elapsed)) = &case.outcome {
            test_case.set_time(elapsed.as_duration());
        }
        if !case.output.is_empty() {
            test_case.set_system_out(case.output.join("\n"));
        }
        test_case
    }

    /// The XML document for everything reported so far.
    pub fn to_xml(&self) -> Result<String, ReportError> {
        let mut suite = TestSuite::new(self.suite_name.as_str());
        if let Some(start) = self.start {
            suite.set_timestamp(start);
            if let Some(end) = self.end {
                suite.set_time((end - start).to_std().unwrap_or(Duration::ZERO));
            }
        }
        for case in &self.cases {
            suite.add_test_case(Self::test_case(case));
        }

        let mut report = Report::new(self.launch_name.as_str());
        report.add_test_suite(suite);

        info!("Rendering JUnit report with {} test cases", self.cases.len());
        report.to_string().map_err(|e| ReportError::Junit(e.to_string()))
    }
}

impl ReportSink for JunitSink {
    fn name(&self) -> &'static str {
        "junit"
    }

    fn ensure_run(&mut self, name: &str, suite: &str, start_time: &str) -> Result<(), ReportError> {
        if self.start.is_some() {
            return Ok(());
        }
        self.start = Some(parse_rfc3339(start_time)?);
        self.launch_name = name.to_string();
        self.suite_name = suite.to_string();
        Ok(())
    }

    fn ensure_test(&mut self, name: &str, start_time: &str) -> Result<(), ReportError> {
        if self.lookup_test_index(name).is_some() {
            return Ok(());
        }
        if self.start.is_none() {
            return Err(ReportError::NoActiveRun);
        }
        let start = parse_rfc3339(start_time)?;
        debug!("Adding JUnit test case '{}'", name);
        self.index.insert(name.to_string(), self.cases.len());
        self.cases.push(JunitCase {
            name: name.to_string(),
            start,
            output: Vec::new(),
            outcome: None,
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
        self.case_mut(test)?.output.push(format!("{time} [{level}] {message}"));
        Ok(())
    }

    fn finish_test(
        &mut self,
        test: &str,
        _start_time: &str,
        result: &TestResult,
        elapsed: &Elapsed,
    ) -> Result<(), ReportError> {
        self.case_mut(test)?.outcome = Some((result.clone(), elapsed.clone()));
        Ok(())
    }

    fn finish_run(&mut self, end_time: &str) -> Result<(), ReportError> {
        if !end_time.is_empty() {
            self.end = Some(parse_rfc3339(end_time)?);
        }
        Ok(())
    }

    fn lookup_test_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}
