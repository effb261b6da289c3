use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::trial::TrialReport;

const RULE: &str = "==================================================================";

pub struct AuditLog<W: Write> {
    out: W,
}

impl AuditLog<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> AuditLog<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn record(&mut self, report: &TrialReport) -> Result<()> {
        let row = &report.result;
        writeln!(
            self.out,
            "==== RUN #{} (CHUNK #{}) - BATCH: {}*{} ====",
            row.iteration + 1,
            row.chunk + 1,
            row.batch_size,
            row.n_policy_types
        )?;
        writeln!(
            self.out,
            "Expected Result: {}",
            serde_json::to_string_pretty(&report.expected)?
        )?;
        writeln!(self.out, "Human Translation: {}", report.human_language.join(" "))?;
        writeln!(self.out, "Output: {}", report.raw_output)?;
        if !row.model_error.is_empty() {
            writeln!(self.out, "Model Error: {}", row.model_error)?;
        }
        if !row.format_error.is_empty() {
            writeln!(self.out, "Format Error: {}", row.format_error)?;
        }
        writeln!(self.out, "Diff: {}", row.diff)?;
        writeln!(self.out, "{}", RULE)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
