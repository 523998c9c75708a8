//! Structured JSON report written to a file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::compare::Channel;
use crate::error::SinkError;
use crate::outcome::{CaseOutcome, RunHeader, TestRun};
use crate::runner::ExecutionResult;
use crate::spec::bytes_digest;

use super::ReportSink;

/// Version of the document layout below.
pub const REPORT_SCHEMA_VERSION: &str = "1.0";

/// One side of a completed comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SideReport {
    pub exit_code: i32,
    pub duration_ms: u64,
    pub stdout_len: usize,
    pub stdout_sha256: String,
    /// Lossy UTF-8 rendering of stdout.
    pub stdout: String,
    pub stderr_len: usize,
    pub stderr_sha256: String,
    /// Lossy UTF-8 rendering of stderr.
    pub stderr: String,
}

impl From<&ExecutionResult> for SideReport {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            exit_code: result.exit_code,
            duration_ms: result.duration_ms,
            stdout_len: result.stdout.len(),
            stdout_sha256: bytes_digest(&result.stdout),
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
            stderr_len: result.stderr.len(),
            stderr_sha256: bytes_digest(&result.stderr),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        }
    }
}

/// One test case in the document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseReport {
    pub name: String,
    pub artifact: String,
    /// `passed`, `failed` or `cancelled`.
    pub status: String,
    pub duration_ms: u64,
    pub failure_kind: Option<String>,
    pub message: Option<String>,
    pub mismatches: Vec<Channel>,
    pub native: Option<SideReport>,
    pub alternate: Option<SideReport>,
}

impl From<&CaseOutcome> for CaseReport {
    fn from(outcome: &CaseOutcome) -> Self {
        let finding = outcome.finding();
        let failure = outcome.failure();
        Self {
            name: outcome.name.clone(),
            artifact: outcome.artifact.display().to_string(),
            status: outcome.verdict.label().to_string(),
            duration_ms: outcome.duration_ms,
            failure_kind: failure.map(|f| f.kind().to_string()),
            message: failure.map(|f| f.to_string()),
            mismatches: finding
                .map(|f| f.mismatches().iter().copied().collect())
                .unwrap_or_default(),
            native: finding.map(|f| SideReport::from(&f.native)),
            alternate: finding.map(|f| SideReport::from(&f.alternate)),
        }
    }
}

/// Aggregate counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub success: bool,
}

/// The whole document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub schema_version: String,
    pub run_id: String,
    pub suite_digest: String,
    pub engine: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub summary: SummaryReport,
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    /// Build the document from a finished run and the submitted cases.
    pub fn new(run: &TestRun, cases: Vec<CaseReport>) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION.to_string(),
            run_id: run.run_id.clone(),
            suite_digest: run.suite_digest.clone(),
            engine: run.engine.display().to_string(),
            started_at: run.started_at,
            finished_at: run.finished_at,
            duration_ms: run.duration_ms,
            summary: SummaryReport {
                total: run.outcomes.len(),
                passed: run.passed_count(),
                failed: run.failed_count(),
                cancelled: run.cancelled_count(),
                success: run.success,
            },
            cases,
        }
    }
}

/// Collects cases and writes a pretty JSON document on `finish`.
pub struct JsonSink {
    path: PathBuf,
    cases: Vec<CaseReport>,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cases: Vec::new(),
        }
    }
}

impl ReportSink for JsonSink {
    fn begin(&mut self, header: &RunHeader) -> Result<(), SinkError> {
        self.cases = Vec::with_capacity(header.total_cases);
        Ok(())
    }

    fn submit(&mut self, outcome: &CaseOutcome) -> Result<(), SinkError> {
        self.cases.push(CaseReport::from(outcome));
        Ok(())
    }

    fn finish(&mut self, run: &TestRun) -> Result<(), SinkError> {
        let report = RunReport::new(run, std::mem::take(&mut self.cases));
        let content = serde_json::to_string_pretty(&report)?;
        std::fs::write(&self.path, content).map_err(|source| SinkError::Persist {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}
