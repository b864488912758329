//! Handlers attached to line shapes.
//!
//! Every handler takes the parsing state by value and hands back the state the
//! next handler (and the next line) should see. A handler that fails leaves the
//! state it was given untouched.

use crate::state_machine::ReportContext;
use crate::timestamp::{self, Elapsed};
use crate::{LineMatch, ParsingState, ReportError, ReportSink, TestResult};
use tracing::trace;

fn capture<'m>(captures: &'m LineMatch, name: &str) -> &'m str {
    captures.get(name).map(String::as_str).unwrap_or_default()
}

/// Copy the captured fields into the state.
pub fn merge<S: ReportSink>(
    _ctx: &mut ReportContext<S>,
    state: ParsingState,
    captures: &LineMatch,
) -> Result<ParsingState, ReportError> {
    Ok(state.merge(captures))
}

/// Timestamp the line, make sure the run and test exist, then log the message.
pub fn structured_log<S: ReportSink>(
    ctx: &mut ReportContext<S>,
    mut state: ParsingState,
    captures: &LineMatch,
) -> Result<ParsingState, ReportError> {
    if state.test.is_empty() {
        trace!("Dropping log line before any test: {:?}", capture(captures, "msg"));
        return Ok(state);
    }

    // Argo lines carry their own date; kuttl lines rely on the stamp.
    let date = captures
        .get("date")
        .filter(|d| !d.is_empty())
        .unwrap_or(&state.start_date);
    state.time = timestamp::synthesize(date, capture(captures, "timestamp"));

    ctx.sink.ensure_run(&ctx.launch_name, &ctx.suite_name, &state.time)?;
    ctx.sink.ensure_test(&state.test, &state.time)?;
    ctx.sink
        .append_log_line(&state.test, &state.time, &state.level, capture(captures, "msg"))?;
    Ok(state)
}

/// Finish the test named by the end line, anchored at the last known time.
pub fn end<S: ReportSink>(
    ctx: &mut ReportContext<S>,
    state: ParsingState,
    captures: &LineMatch,
) -> Result<ParsingState, ReportError> {
    if state.test.is_empty() {
        return Ok(state);
    }

    let elapsed = Elapsed::parse(capture(captures, "duration"))?;
    let result = TestResult::from_harness(capture(captures, "result"));

    ctx.sink.ensure_test(&state.test, &state.time)?;
    ctx.sink.finish_test(&state.test, &state.time, &result, &elapsed)?;
    Ok(state)
}

/// Attach an unrecognised line to the active test, if there is one.
pub fn catch_all<S: ReportSink>(
    ctx: &mut ReportContext<S>,
    state: ParsingState,
    captures: &LineMatch,
) -> Result<ParsingState, ReportError> {
    if state.test.is_empty() || state.time.is_empty() {
        return Ok(state);
    }

    ctx.sink.ensure_test(&state.test, &state.time)?;
    ctx.sink
        .append_log_line(&state.test, &state.time, &state.level, capture(captures, "line"))?;
    Ok(state)
}
