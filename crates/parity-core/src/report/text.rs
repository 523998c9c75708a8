//! Human-readable console report.

use std::io::Write;

use crate::compare::Channel;
use crate::error::SinkError;
use crate::outcome::{CaseOutcome, RunHeader, TestRun, Verdict};

use super::ReportSink;

const HEAVY_RULE: &str =
    "======================================================================";
const LIGHT_RULE: &str =
    "----------------------------------------------------------------------";

/// Renders outcomes as text to any writer (stdout in the CLI).
pub struct TextSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the sink and return the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> ReportSink for TextSink<W> {
    fn begin(&mut self, header: &RunHeader) -> Result<(), SinkError> {
        let suite = header.suite_digest.get(..12).unwrap_or(&header.suite_digest);
        writeln!(
            self.out,
            "Running {} test(s) against {} (run {}, suite {})",
            header.total_cases,
            header.engine.display(),
            header.run_id,
            suite
        )?;
        Ok(())
    }

    fn submit(&mut self, outcome: &CaseOutcome) -> Result<(), SinkError> {
        let status = match &outcome.verdict {
            Verdict::Passed { finding } if finding.mismatches().contains(&Channel::ExitCode) => {
                format!(
                    "ok (exit code differs: native {} vs alternate {})",
                    finding.native.exit_code, finding.alternate.exit_code
                )
            }
            Verdict::Passed { .. } => "ok".to_string(),
            Verdict::Failed { .. } => "FAIL".to_string(),
            Verdict::Cancelled => "cancelled".to_string(),
        };
        writeln!(
            self.out,
            "{} ({}) ... {}",
            outcome.name,
            outcome.artifact.display(),
            status
        )?;
        Ok(())
    }

    fn finish(&mut self, run: &TestRun) -> Result<(), SinkError> {
        for outcome in run.outcomes.iter().filter(|o| o.failed()) {
            writeln!(self.out)?;
            writeln!(self.out, "{}", HEAVY_RULE)?;
            writeln!(self.out, "FAIL: {} ({})", outcome.name, outcome.artifact.display())?;
            writeln!(self.out, "{}", LIGHT_RULE)?;
            if let Some(failure) = outcome.failure() {
                writeln!(self.out, "{}", failure)?;
            }
            if let Some(finding) = outcome.finding() {
                writeln!(self.out)?;
                write!(self.out, "{}", finding.describe())?;
            }
        }

        writeln!(self.out, "{}", LIGHT_RULE)?;
        writeln!(
            self.out,
            "Ran {} test(s) in {:.3}s",
            run.outcomes.len(),
            run.duration_ms as f64 / 1000.0
        )?;
        writeln!(self.out)?;
        if run.success {
            writeln!(self.out, "OK")?;
        } else {
            writeln!(
                self.out,
                "FAILED (failures={}, cancelled={})",
                run.failed_count(),
                run.cancelled_count()
            )?;
        }
        self.out.flush()?;
        Ok(())
    }
}
