//! Structured lifecycle events for suite runs.
//!
//! Events are emitted at `info!` (sink failures at `warn!`) with an `event`
//! field so they can be filtered from JSON logs.

use tracing::info;

use crate::outcome::CaseOutcome;

/// Span that tags everything logged during a run with its run id.
///
/// Attach it to the run future with `tracing::Instrument`.
pub fn suite_span(run_id: &str) -> tracing::Span {
    tracing::info_span!("parity.suite", run_id = %run_id)
}

pub fn emit_suite_started(run_id: &str, suite_digest: &str, total_cases: usize) {
    info!(
        event = "suite.started",
        run_id = %run_id,
        suite_digest = %suite_digest,
        total_cases = total_cases,
    );
}

pub fn emit_case_finished(outcome: &CaseOutcome) {
    info!(
        event = "case.finished",
        case = %outcome.name,
        index = outcome.index,
        verdict = outcome.verdict.label(),
        duration_ms = outcome.duration_ms,
    );
}

pub fn emit_suite_finished(
    run_id: &str,
    duration_ms: u64,
    passed: usize,
    failed: usize,
    cancelled: usize,
    success: bool,
) {
    info!(
        event = "suite.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        passed = passed,
        failed = failed,
        cancelled = cancelled,
        success = success,
    );
}

pub fn emit_sink_failed(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "sink.failed", run_id = %run_id, error = %error);
}
