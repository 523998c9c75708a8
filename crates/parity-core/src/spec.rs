//! Suite identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::case::{build_cases, TestCase};

/// What a suite run executes: the alternate engine, the companion file name
/// and the ordered case table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteSpec {
    /// Alternate engine executable.
    pub engine: PathBuf,

    /// Companion file name expected next to each artifact.
    pub companion_name: String,

    /// SHA-256 over engine, companion name and ordered artifact paths.
    pub suite_digest: String,

    #[serde(skip)]
    cases: Vec<TestCase>,
}

impl SuiteSpec {
    /// Build the suite from an ordered artifact list.
    pub fn new(artifacts: &[PathBuf], engine: &Path, companion_name: &str) -> Self {
        let cases = build_cases(artifacts, engine, companion_name);
        let suite_digest = compute_suite_digest(engine, companion_name, &cases);

        Self {
            engine: engine.to_path_buf(),
            companion_name: companion_name.to_string(),
            suite_digest,
            cases,
        }
    }

    pub fn cases(&self) -> &[TestCase] {
        &self.cases
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

}

/// Deterministic digest of the suite's identity. Order sensitive.
fn compute_suite_digest(engine: &Path, companion_name: &str, cases: &[TestCase]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(engine.to_string_lossy().as_bytes());
    hasher.update(b"\0");
    hasher.update(companion_name.as_bytes());
    hasher.update(b"\0");
    for case in cases {
        hasher.update(case.artifact.to_string_lossy().as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

/// Hex SHA-256 of a captured byte stream, used by structured reports.
pub fn bytes_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
