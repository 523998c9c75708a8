//! Harness configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::compare::ComparisonPolicy;
use crate::error::{HarnessError, HarnessResult};

/// Companion file the alternate engine loads next to each artifact.
pub const DEFAULT_COMPANION_NAME: &str = "clrcore.dll";

/// Per-process timeout when none is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Configuration for a suite run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Maximum wall-clock time for a single process (milliseconds).
    pub timeout_ms: u64,

    /// Maximum number of artifacts processed at once.
    pub concurrency: usize,

    /// File name of the companion support file.
    pub companion_name: String,

    /// Which mismatches fail a case.
    pub policy: ComparisonPolicy,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            concurrency: default_concurrency(),
            companion_name: DEFAULT_COMPANION_NAME.to_string(),
            policy: ComparisonPolicy::default(),
        }
    }
}

impl HarnessConfig {
    /// Reject settings the orchestrator cannot run with.
    pub fn validate(&self) -> HarnessResult<()> {
        if self.timeout_ms == 0 {
            return Err(HarnessError::InvalidConfig(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(HarnessError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        let name = self.companion_name.trim();
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            return Err(HarnessError::InvalidConfig(format!(
                "companion_name must be a bare file name, got {:?}",
                self.companion_name
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
