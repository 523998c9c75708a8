//! parity core - differential execution harness
//!
//! Runs each artifact twice, natively and through an alternate engine, and
//! checks that both runs are observably equivalent:
//! - [`runner`] spawns one process and captures exit code, stdout, stderr
//! - [`compare`] judges a native/alternate pair under a [`ComparisonPolicy`]
//! - [`orchestrator`] runs a whole suite and hands the result to a
//!   [`ReportSink`]

pub mod cancel;
pub mod case;
pub mod compare;
pub mod config;
pub mod error;
pub mod obs;
pub mod orchestrator;
pub mod outcome;
pub mod report;
pub mod runner;
pub mod spec;
pub mod telemetry;

// Re-export key types
pub use cancel::CancelSignal;
pub use case::{build_cases, test_name_for, TestCase};
pub use compare::{compare, Channel, ComparisonFinding, ComparisonPolicy};
pub use config::{HarnessConfig, DEFAULT_COMPANION_NAME, DEFAULT_TIMEOUT_MS};
pub use error::{CaseFailure, ExecError, ExecSide, HarnessError, HarnessResult, SinkError};
pub use orchestrator::{deliver, Orchestrator};
pub use outcome::{CaseOutcome, RunHeader, TestRun, Verdict};
pub use report::{JsonSink, MemorySink, ReportSink, SinkKind, TextSink};
pub use runner::{ExecRunner, ExecutionResult, Invocation};
pub use spec::SuiteSpec;
pub use telemetry::init_tracing;
