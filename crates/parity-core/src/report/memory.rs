//! In-memory sink.

use std::sync::{Arc, Mutex};

use crate::error::SinkError;
use crate::outcome::{CaseOutcome, RunHeader, TestRun};

use super::ReportSink;

/// Everything a [`MemorySink`] has received.
#[derive(Debug, Default, Clone)]
pub struct Recorded {
    pub header: Option<RunHeader>,
    pub outcomes: Vec<CaseOutcome>,
    pub finished: Option<TestRun>,
}

/// Records sink calls in memory. Clones share the same storage, so a test can
/// keep one handle while the orchestrator owns the other.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    inner: Arc<Mutex<Recorded>>,
    fail_on_finish: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose `finish` always fails, for exercising sink-failure paths.
    pub fn failing() -> Self {
        Self {
            fail_on_finish: true,
            ..Self::default()
        }
    }

    /// Snapshot of what has been recorded so far.
    pub fn recorded(&self) -> Recorded {
        self.inner.lock().expect("memory sink poisoned").clone()
    }
}

impl ReportSink for MemorySink {
    fn begin(&mut self, header: &RunHeader) -> Result<(), SinkError> {
        self.inner.lock().expect("memory sink poisoned").header = Some(header.clone());
        Ok(())
    }

    fn submit(&mut self, outcome: &CaseOutcome) -> Result<(), SinkError> {
        self.inner
            .lock()
            .expect("memory sink poisoned")
            .outcomes
            .push(outcome.clone());
        Ok(())
    }

    fn finish(&mut self, run: &TestRun) -> Result<(), SinkError> {
        if self.fail_on_finish {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory sink configured to fail",
            )));
        }
        self.inner.lock().expect("memory sink poisoned").finished = Some(run.clone());
        Ok(())
    }
}
