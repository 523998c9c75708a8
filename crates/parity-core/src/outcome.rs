//! Per-case outcomes and the aggregated test run.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::compare::ComparisonFinding;
use crate::error::CaseFailure;

/// Result of one test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Native and alternate runs were equivalent. The finding may still
    /// record a non-fatal exit-code difference.
    Passed { finding: ComparisonFinding },

    /// The case failed.
    Failed { failure: CaseFailure },

    /// The suite was cancelled before or while this case ran.
    Cancelled,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Passed { .. } => "passed",
            Verdict::Failed { .. } => "failed",
            Verdict::Cancelled => "cancelled",
        }
    }
}

/// Outcome of one artifact within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
    /// Position in the input artifact list.
    pub index: usize,

    /// Test name.
    pub name: String,

    /// Artifact path.
    pub artifact: PathBuf,

    /// Wall-clock duration of the whole case in milliseconds.
    pub duration_ms: u64,

    pub verdict: Verdict,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Passed { .. })
    }

    pub fn failed(&self) -> bool {
        matches!(self.verdict, Verdict::Failed { .. })
    }

    pub fn cancelled(&self) -> bool {
        matches!(self.verdict, Verdict::Cancelled)
    }

    /// The comparison finding, when both runs completed.
    pub fn finding(&self) -> Option<&ComparisonFinding> {
        match &self.verdict {
            Verdict::Passed { finding } => Some(finding),
            Verdict::Failed {
                failure: CaseFailure::ComparisonMismatch { finding },
            } => Some(finding),
            _ => None,
        }
    }

    /// The failure, when the case failed.
    pub fn failure(&self) -> Option<&CaseFailure> {
        match &self.verdict {
            Verdict::Failed { failure } => Some(failure),
            _ => None,
        }
    }
}

/// Identification handed to a sink before any outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHeader {
    pub run_id: String,
    pub suite_digest: String,
    pub engine: PathBuf,
    pub total_cases: usize,
    pub started_at: DateTime<Utc>,
}

/// Aggregated result of one suite run.
#[derive(Debug, Clone)]
pub struct TestRun {
    /// Unique run id (UUID v4).
    pub run_id: String,

    /// Digest of the suite specification.
    pub suite_digest: String,

    /// Alternate engine used for the run.
    pub engine: PathBuf,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,

    /// One outcome per artifact, in input order.
    pub outcomes: Vec<CaseOutcome>,

    /// True iff every outcome passed.
    pub success: bool,
}

impl TestRun {
    /// Assemble a finished run. `success` is derived from the outcomes.
    pub fn new(
        header: RunHeader,
        finished_at: DateTime<Utc>,
        duration_ms: u64,
        outcomes: Vec<CaseOutcome>,
    ) -> Self {
        let success = outcomes.iter().all(CaseOutcome::passed);
        Self {
            run_id: header.run_id,
            suite_digest: header.suite_digest,
            engine: header.engine,
            started_at: header.started_at,
            finished_at,
            duration_ms,
            outcomes,
            success,
        }
    }

    /// Number of cases that passed.
    pub fn passed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed()).count()
    }

    /// Number of cases that failed.
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.failed()).count()
    }

    /// Number of cases skipped or abandoned by cancellation.
    pub fn cancelled_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.cancelled()).count()
    }
}
