//! Test case table built once from the artifact list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::runner::Invocation;

/// One artifact under test, with both of its invocations resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Position in the caller-supplied artifact list.
    pub index: usize,

    /// Stable, unique test name derived from the artifact file name.
    pub name: String,

    /// Artifact path as supplied by the caller.
    pub artifact: PathBuf,

    /// Companion support file expected next to the artifact.
    pub companion: PathBuf,

    /// The artifact run directly.
    pub native: Invocation,

    /// `<engine> <companion> <artifact>`.
    pub alternate: Invocation,
}

impl TestCase {
    /// Create a case for `artifact` run through `engine`.
    pub fn new(
        index: usize,
        name: String,
        artifact: &Path,
        engine: &Path,
        companion_name: &str,
    ) -> Self {
        let companion = companion_path(artifact, companion_name);
        let native = Invocation::new(artifact);
        let alternate = Invocation::new(engine)
            .arg(companion.as_os_str())
            .arg(artifact.as_os_str());

        Self {
            index,
            name,
            artifact: artifact.to_path_buf(),
            companion,
            native,
            alternate,
        }
    }
}

/// `<artifact-dir>/<companion_name>`.
pub fn companion_path(artifact: &Path, companion_name: &str) -> PathBuf {
    match artifact.parent() {
        Some(dir) => dir.join(companion_name),
        None => PathBuf::from(companion_name),
    }
}

/// Test name for an artifact: its file name with every character other than
/// ASCII alphanumerics and `_` replaced by `_`.
pub fn test_name_for(artifact: &Path) -> String {
    let base = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| artifact.to_string_lossy().into_owned());

    let name: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() {
        "artifact".to_string()
    } else {
        name
    }
}

/// Build the ordered case table. Names that collide with an earlier case get
/// a `_2`, `_3`, ... suffix.
pub fn build_cases(artifacts: &[PathBuf], engine: &Path, companion_name: &str) -> Vec<TestCase> {
    let mut used: HashSet<String> = HashSet::new();
    let mut cases = Vec::with_capacity(artifacts.len());

    for (index, artifact) in artifacts.iter().enumerate() {
        let base = test_name_for(artifact);
        let mut name = base.clone();
        let mut n = 2;
        while used.contains(&name) {
            name = format!("{}_{}", base, n);
            n += 1;
        }
        used.insert(name.clone());

        cases.push(TestCase::new(index, name, artifact, engine, companion_name));
    }

    cases
}
