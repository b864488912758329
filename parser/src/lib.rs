// Parser crate for test harness logs
// Classifies log lines and reports the discovered launch/suite/test structure to a sink

pub mod types;
pub mod timestamp;
pub mod pattern_matcher;
pub mod line_grammar;
pub mod report_sink;
pub mod handlers;
pub mod state_machine;
pub mod driver;

// Sink implementations
pub mod recording_sink;
pub mod junit_sink;

// Re-export main types
pub use types::*;
pub use timestamp::Elapsed;
pub use pattern_matcher::PatternMatcher;
pub use line_grammar::{DefaultGrammar, LineGrammar, LineShape};
pub use report_sink::ReportSink;
pub use state_machine::{ErrorPolicy, Handler, ReportContext, StateMachine};
pub use driver::{process, process_linear, RunOptions};

// Re-export sinks
pub use recording_sink::{RecordedReport, RecordingSink, SinkCall};
pub use junit_sink::JunitSink;
