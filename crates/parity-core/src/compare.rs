//! Differential comparison of a native run against an alternate-engine run.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::runner::ExecutionResult;

/// An observable channel of a process run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    ExitCode,
    Stdout,
    Stderr,
}

impl Channel {
    pub fn name(&self) -> &'static str {
        match self {
            Channel::ExitCode => "exit_code",
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
        }
    }
}

/// Which mismatches count as failures.
///
/// stdout and stderr mismatches are always fatal. Exit codes are recorded
/// but only fatal when `exit_code_fatal` is set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComparisonPolicy {
    pub exit_code_fatal: bool,
}

impl ComparisonPolicy {
    /// Whether a mismatch on `channel` fails the case.
    pub fn is_fatal(&self, channel: Channel) -> bool {
        match channel {
            Channel::Stdout | Channel::Stderr => true,
            Channel::ExitCode => self.exit_code_fatal,
        }
    }
}

/// Verdict for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonFinding {
    pub artifact_id: String,
    pub native: ExecutionResult,
    pub alternate: ExecutionResult,
    mismatches: BTreeSet<Channel>,
    is_failure: bool,
}

impl ComparisonFinding {
    /// Channels whose values differ between the two runs.
    pub fn mismatches(&self) -> &BTreeSet<Channel> {
        &self.mismatches
    }

    pub fn is_failure(&self) -> bool {
        self.is_failure
    }

    /// True when every channel matched.
    pub fn is_exact_match(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Comma-separated mismatched channel names, or `none`.
    pub fn mismatch_summary(&self) -> String {
        if self.mismatches.is_empty() {
            return "none".to_string();
        }
        self.mismatches
            .iter()
            .map(Channel::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Diagnostic block with both results, for reports.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for channel in &self.mismatches {
            let _ = writeln!(out, "Found {} mismatch", channel.name());
        }
        out.push_str("\nNative:\n");
        out.push_str(&"-".repeat(10));
        out.push('\n');
        out.push_str(&render_result(&self.native));
        out.push_str("\nAlternate:\n");
        out.push_str(&"-".repeat(10));
        out.push('\n');
        out.push_str(&render_result(&self.alternate));
        out
    }
}

fn render_result(result: &ExecutionResult) -> String {
    format!(
        "retcode: {}\nstdout({}):\n{}\nstderr({}):\n{}\n",
        result.exit_code,
        result.stdout.len(),
        String::from_utf8_lossy(&result.stdout),
        result.stderr.len(),
        String::from_utf8_lossy(&result.stderr),
    )
}

/// Compare two executions of the same artifact.
///
/// Pure function of its inputs: stdout and stderr are compared byte-for-byte,
/// exit codes are compared and recorded, and the failure flag is derived from
/// the mismatch set and `policy`.
pub fn compare(
    artifact_id: &str,
    native: ExecutionResult,
    alternate: ExecutionResult,
    policy: ComparisonPolicy,
) -> ComparisonFinding {
    let mut mismatches = BTreeSet::new();

    if native.exit_code != alternate.exit_code {
        mismatches.insert(Channel::ExitCode);
    }
    if native.stdout != alternate.stdout {
        mismatches.insert(Channel::Stdout);
    }
    if native.stderr != alternate.stderr {
        mismatches.insert(Channel::Stderr);
    }

    let is_failure = mismatches.iter().any(|c| policy.is_fatal(*c));

    ComparisonFinding {
        artifact_id: artifact_id.to_string(),
        native,
        alternate,
        mismatches,
        is_failure,
    }
}
