use crate::line_grammar::{DefaultGrammar, LineShape, DEFAULT_HARNESS_PREFIX};
use crate::state_machine::{ErrorPolicy, ReportContext, StateMachine};
use crate::{ReportError, ReportSink};
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use tracing::info;

/// Names and policies for one pass over a log.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub launch_name: String,
    pub suite_name: String,
    pub policy: ErrorPolicy,
    pub harness_prefix: String,
}

impl RunOptions {
    pub fn new(launch_name: impl Into<String>, suite_name: impl Into<String>) -> Self {
        Self {
            launch_name: launch_name.into(),
            suite_name: suite_name.into(),
            policy: ErrorPolicy::default(),
            harness_prefix: DEFAULT_HARNESS_PREFIX.to_string(),
        }
    }

    pub fn policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn harness_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.harness_prefix = prefix.into();
        self
    }
}

/// Parse `reader` with the default grammar and report into `sink`.
pub fn process<S, R>(
    sink: S,
    options: &RunOptions,
    reader: R,
    echo: Option<&mut dyn Write>,
) -> Result<S, ReportError>
where
    S: ReportSink,
    R: BufRead,
{
    let grammar = DefaultGrammar::with_harness_prefix(&options.harness_prefix);
    let context = ReportContext::new(sink, &options.launch_name, &options.suite_name);
    let machine = StateMachine::with_grammar(&grammar, context, options.policy)?;
    process_linear(machine, reader, echo)
}

/// Feed every line of `reader` to `machine`, then close the run with the last
/// known timestamp.
///
/// Lines are forwarded to `echo` unchanged once processed. Invalid UTF-8 is
/// replaced rather than rejected.
pub fn process_linear<S, R>(
    mut machine: StateMachine<S>,
    mut reader: R,
    mut echo: Option<&mut dyn Write>,
) -> Result<S, ReportError>
where
    S: ReportSink,
    R: BufRead,
{
    info!("Starting log processing");

    let mut buffer = Vec::new();
    let mut line_count = 0usize;
    let mut shapes: BTreeMap<&'static str, usize> = BTreeMap::new();

    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            break;
        }
        let raw = String::from_utf8_lossy(&buffer);
        let line = raw.trim_end_matches('\n').trim_end_matches('\r');

        line_count += 1;
        let shape = machine.feed(line)?;
        *shapes.entry(shape.map_or("unmatched", |s: LineShape| s.name())).or_default() += 1;

        if let Some(out) = echo.as_mut() {
            writeln!(out, "{line}")?;
        }
    }

    info!("Processed {} lines: {:?}", line_count, shapes);

    let end_time = machine.state().time.clone();
    let mut sink = machine.into_sink();
    info!("Finishing run on sink '{}' at {:?}", sink.name(), end_time);
    sink.finish_run(&end_time)?;
    Ok(sink)
}
