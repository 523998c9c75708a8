//! Error types for the harness.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::compare::ComparisonFinding;

/// Which execution path an error or result belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExecSide {
    /// The artifact run directly.
    Native,
    /// The artifact run through the alternate engine.
    Alternate,
}

impl std::fmt::Display for ExecSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecSide::Native => write!(f, "native"),
            ExecSide::Alternate => write!(f, "alternate"),
        }
    }
}

/// Errors produced by the execution adapter.
///
/// A non-zero exit code is not an error; it is reported in the
/// [`ExecutionResult`](crate::runner::ExecutionResult).
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to launch {program}: {source}")]
    LaunchFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {limit_ms}ms")]
    ProcessTimeout { program: String, limit_ms: u64 },
}

/// Why a single test case failed.
///
/// These never abort the suite; each is recorded as the outcome of the
/// artifact it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaseFailure {
    #[error("{side} run could not be launched ({program}): {reason}")]
    LaunchFailure {
        side: ExecSide,
        program: String,
        reason: String,
    },

    #[error("{side} run of {program} exceeded {limit_ms}ms and was killed")]
    ProcessTimeout {
        side: ExecSide,
        program: String,
        limit_ms: u64,
    },

    #[error("companion file {} is missing", path.display())]
    MissingCompanionFile { path: PathBuf },

    #[error("output mismatch on {}", finding.mismatch_summary())]
    ComparisonMismatch { finding: ComparisonFinding },
}

impl CaseFailure {
    /// Build a case failure from an adapter error on the given side.
    pub fn from_exec(side: ExecSide, err: ExecError) -> Self {
        match err {
            ExecError::LaunchFailure { program, source } => CaseFailure::LaunchFailure {
                side,
                program,
                reason: source.to_string(),
            },
            ExecError::ProcessTimeout { program, limit_ms } => CaseFailure::ProcessTimeout {
                side,
                program,
                limit_ms,
            },
        }
    }

    /// Stable machine-readable kind, used by structured reports.
    pub fn kind(&self) -> &'static str {
        match self {
            CaseFailure::LaunchFailure { .. } => "launch_failure",
            CaseFailure::ProcessTimeout { .. } => "process_timeout",
            CaseFailure::MissingCompanionFile { .. } => "missing_companion_file",
            CaseFailure::ComparisonMismatch { .. } => "comparison_mismatch",
        }
    }
}

/// Errors that are fatal to a whole run and surface to the caller.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid harness configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown report sink kind: {0} (expected `text` or `json`)")]
    UnknownSinkKind(String),

    #[error("report sink failed: {0}")]
    SinkFailure(#[from] SinkError),
}

/// Errors raised while a report sink emits or persists results.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("write {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for harness-level operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;
