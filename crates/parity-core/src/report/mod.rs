//! Report sinks: consumers of a finished test run.
//!
//! The orchestrator drives every sink the same way: [`ReportSink::begin`]
//! once, [`ReportSink::submit`] per outcome in input order, then
//! [`ReportSink::finish`] with the whole run.
//!
//! - [`text`]: human-readable console rendering
//! - [`json`]: structured JSON document written to a file
//! - [`memory`]: in-memory recorder for tests and embedding

pub mod json;
pub mod memory;
pub mod text;

use std::path::PathBuf;

use crate::error::{HarnessError, HarnessResult, SinkError};
use crate::outcome::{CaseOutcome, RunHeader, TestRun};

pub use json::{CaseReport, JsonSink, RunReport, SideReport, SummaryReport};
pub use memory::MemorySink;
pub use text::TextSink;

/// A consumer of test outcomes.
pub trait ReportSink: Send {
    /// Called once before any outcome.
    fn begin(&mut self, header: &RunHeader) -> Result<(), SinkError>;

    /// Called once per case, in input order.
    fn submit(&mut self, outcome: &CaseOutcome) -> Result<(), SinkError>;

    /// Called once with the finished run.
    fn finish(&mut self, run: &TestRun) -> Result<(), SinkError>;
}

/// The closed set of built-in sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkKind {
    /// Human-readable text on stdout.
    Text,

    /// JSON document written to `path`.
    Json { path: PathBuf },
}

impl SinkKind {
    /// Resolve a sink kind from its name. `json` requires an output path.
    pub fn parse(kind: &str, path: Option<PathBuf>) -> HarnessResult<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(SinkKind::Text),
            "json" => match path {
                Some(path) => Ok(SinkKind::Json { path }),
                None => Err(HarnessError::InvalidConfig(
                    "json report sink requires an output path".into(),
                )),
            },
            other => Err(HarnessError::UnknownSinkKind(other.to_string())),
        }
    }

    /// Instantiate the sink.
    pub fn into_sink(self) -> Box<dyn ReportSink> {
        match self {
            SinkKind::Text => Box::new(TextSink::new(std::io::stdout())),
            SinkKind::Json { path } => Box::new(JsonSink::new(path)),
        }
    }
}
