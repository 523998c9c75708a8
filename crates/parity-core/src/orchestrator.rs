//! Suite orchestration: run every artifact natively and through the engine,
//! compare, aggregate and report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::case::TestCase;
use crate::compare::{compare, ComparisonPolicy};
use crate::config::HarnessConfig;
use crate::error::{CaseFailure, ExecSide, HarnessError, HarnessResult};
use crate::obs;
use crate::outcome::{CaseOutcome, RunHeader, TestRun, Verdict};
use crate::report::ReportSink;
use crate::runner::ExecRunner;
use crate::spec::SuiteSpec;

/// Drives a suite run.
pub struct Orchestrator {
    config: HarnessConfig,
    cancel: CancelSignal,
}

impl Orchestrator {
    /// Create an orchestrator. Fails fast on an invalid configuration.
    pub fn new(config: HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelSignal::new(),
        })
    }

    /// Use an externally owned cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle that cancels runs driven by this orchestrator.
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run `artifacts` natively and through `engine`, then hand the run to
    /// `sink`.
    ///
    /// Per-artifact problems become outcomes; only a sink failure is returned
    /// as an error.
    pub async fn run_suite(
        &self,
        artifacts: &[PathBuf],
        engine: &Path,
        sink: &mut dyn ReportSink,
    ) -> HarnessResult<TestRun> {
        let suite = SuiteSpec::new(artifacts, engine, &self.config.companion_name);
        let run = self.execute(&suite).await;

        if let Err(e) = deliver(&run, sink) {
            obs::emit_sink_failed(&run.run_id, &e);
            return Err(HarnessError::SinkFailure(e));
        }
        Ok(run)
    }

    /// Execute every case of `suite` and aggregate the outcomes in input
    /// order. Does not report.
    pub async fn execute(&self, suite: &SuiteSpec) -> TestRun {
        let header = RunHeader {
            run_id: Uuid::new_v4().to_string(),
            suite_digest: suite.suite_digest.clone(),
            engine: suite.engine.clone(),
            total_cases: suite.len(),
            started_at: Utc::now(),
        };
        let span = obs::suite_span(&header.run_id);

        async move {
            let start = Instant::now();
            obs::emit_suite_started(&header.run_id, &header.suite_digest, header.total_cases);

            let outcomes = self.execute_cases(suite.cases()).await;

            let duration_ms = start.elapsed().as_millis() as u64;
            let run = TestRun::new(header, Utc::now(), duration_ms, outcomes);

            obs::emit_suite_finished(
                &run.run_id,
                run.duration_ms,
                run.passed_count(),
                run.failed_count(),
                run.cancelled_count(),
                run.success,
            );
            run
        }
        .instrument(span)
        .await
    }

    /// Run every case on its own task. Dropping the returned future aborts
    /// the workers, and with them any running children.
    async fn execute_cases(&self, cases: &[TestCase]) -> Vec<CaseOutcome> {
        let sem = Arc::new(Semaphore::new(self.config.concurrency));
        let timeout = self.config.timeout();
        let policy = self.config.policy;

        let mut join_set = JoinSet::new();
        for case in cases.iter().cloned() {
            let sem = Arc::clone(&sem);
            let cancel = self.cancel.clone();

            join_set.spawn(
                async move {
                    let _permit = sem.acquire_owned().await.ok();
                    let outcome = run_case(&case, timeout, policy, &cancel).await;
                    obs::emit_case_finished(&outcome);
                    outcome
                }
                .in_current_span(),
            );
        }

        let mut slots: Vec<Option<CaseOutcome>> = vec![None; cases.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcome) => {
                    let index = outcome.index;
                    slots[index] = Some(outcome);
                }
                Err(e) if e.is_cancelled() => warn!(error = %e, "worker task was aborted"),
                Err(e) => std::panic::resume_unwind(e.into_panic()),
            }
        }

        // Slots left empty belong to aborted workers.
        cases
            .iter()
            .zip(slots)
            .map(|(case, slot)| slot.unwrap_or_else(|| aborted_outcome(case)))
            .collect()
    }
}

fn aborted_outcome(case: &TestCase) -> CaseOutcome {
    CaseOutcome {
        index: case.index,
        name: case.name.clone(),
        artifact: case.artifact.clone(),
        duration_ms: 0,
        verdict: Verdict::Cancelled,
    }
}

/// Hand a finished run to a sink: header, every outcome in order, then the
/// run itself.
pub fn deliver(run: &TestRun, sink: &mut dyn ReportSink) -> Result<(), crate::error::SinkError> {
    let header = RunHeader {
        run_id: run.run_id.clone(),
        suite_digest: run.suite_digest.clone(),
        engine: run.engine.clone(),
        total_cases: run.outcomes.len(),
        started_at: run.started_at,
    };
    sink.begin(&header)?;
    for outcome in &run.outcomes {
        sink.submit(outcome)?;
    }
    sink.finish(run)
}

/// Run one case unless the suite is cancelled; abandon it if cancellation
/// arrives mid-flight.
async fn run_case(
    case: &TestCase,
    timeout: Duration,
    policy: ComparisonPolicy,
    cancel: &CancelSignal,
) -> CaseOutcome {
    let start = Instant::now();

    let verdict = if cancel.is_cancelled() {
        debug!(case = %case.name, "skipping case, suite cancelled");
        Verdict::Cancelled
    } else {
        // Losing the race drops judge_case, and with it any running child.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Verdict::Cancelled,
            verdict = judge_case(case, timeout, policy) => verdict,
        }
    };

    CaseOutcome {
        index: case.index,
        name: case.name.clone(),
        artifact: case.artifact.clone(),
        duration_ms: start.elapsed().as_millis() as u64,
        verdict,
    }
}

async fn judge_case(case: &TestCase, timeout: Duration, policy: ComparisonPolicy) -> Verdict {
    info!(case = %case.name, "Executing case");

    let companion_present = tokio::fs::metadata(&case.companion)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !companion_present {
        warn!(case = %case.name, companion = %case.companion.display(), "companion file missing");
        return Verdict::Failed {
            failure: CaseFailure::MissingCompanionFile {
                path: case.companion.clone(),
            },
        };
    }

    let (native, alternate) = tokio::join!(
        ExecRunner::run(&case.native, timeout),
        ExecRunner::run(&case.alternate, timeout),
    );

    let native = match native {
        Ok(result) => result,
        Err(e) => {
            warn!(case = %case.name, error = %e, "native run failed");
            return Verdict::Failed {
                failure: CaseFailure::from_exec(ExecSide::Native, e),
            };
        }
    };
    let alternate = match alternate {
        Ok(result) => result,
        Err(e) => {
            warn!(case = %case.name, error = %e, "alternate run failed");
            return Verdict::Failed {
                failure: CaseFailure::from_exec(ExecSide::Alternate, e),
            };
        }
    };

    let finding = compare(&case.name, native, alternate, policy);
    if finding.is_failure() {
        info!(case = %case.name, mismatches = %finding.mismatch_summary(), "mismatch found");
        Verdict::Failed {
            failure: CaseFailure::ComparisonMismatch { finding },
        }
    } else {
        if !finding.is_exact_match() {
            debug!(
                case = %case.name,
                mismatches = %finding.mismatch_summary(),
                "non-fatal mismatch"
            );
        }
        Verdict::Passed { finding }
    }
}
