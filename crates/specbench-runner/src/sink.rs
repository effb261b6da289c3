use serde::{Serialize, Serializer};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::backend::Usage;
use crate::compare::Comparison;
use crate::error::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialIds {
    pub iteration: usize,
    pub batch_size: usize,
    pub n_policy_types: usize,
    pub max_n_requirements: usize,
    pub chunk: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialResult {
    pub model_error: String,
    pub format_error: String,
    pub batch_size: usize,
    pub n_policy_types: usize,
    pub max_n_requirements: usize,
    pub iteration: usize,
    pub chunk: usize,
    pub time: f64,
    pub total: usize,
    pub success: usize,
    pub fail: usize,
    pub wrong: usize,
    pub accuracy: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_cost: f64,
    pub diff: String,
    #[serde(serialize_with = "title_case_bool")]
    pub conflict_exist: bool,
    #[serde(serialize_with = "title_case_bool")]
    pub conflict_detect: bool,
}

pub const RESULT_COLUMNS: [&str; 19] = [
    "model_error",
    "format_error",
    "batch_size",
    "n_policy_types",
    "max_n_requirements",
    "iteration",
    "chunk",
    "time",
    "total",
    "success",
    "fail",
    "wrong",
    "accuracy",
    "prompt_tokens",
    "completion_tokens",
    "total_cost",
    "diff",
    "conflict_exist",
    "conflict_detect",
];

impl TrialResult {
    pub fn new(ids: TrialIds, conflict_exist: bool) -> Self {
        Self {
            model_error: String::new(),
            format_error: String::new(),
            batch_size: ids.batch_size,
            n_policy_types: ids.n_policy_types,
            max_n_requirements: ids.max_n_requirements,
            iteration: ids.iteration,
            chunk: ids.chunk,
            time: 0.0,
            total: 0,
            success: 0,
            fail: 0,
            wrong: 0,
            accuracy: 0.0,
            prompt_tokens: 0,
            completion_tokens: 0,
            total_cost: 0.0,
            diff: String::new(),
            conflict_exist,
            conflict_detect: false,
        }
    }

    pub fn record_usage(&mut self, usage: Usage) {
        self.prompt_tokens = usage.prompt_tokens;
        self.completion_tokens = usage.completion_tokens;
        self.total_cost = usage.total_cost;
    }

    pub fn record_comparison(&mut self, comparison: &Comparison) {
        self.total = comparison.total;
        self.success = comparison.success;
        self.fail = comparison.fail;
        self.wrong = comparison.wrong;
        self.accuracy = comparison.accuracy;
        self.diff = comparison.diff.to_string();
    }
}

fn title_case_bool<S: Serializer>(
    value: &bool,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "True" } else { "False" })
}

pub struct ResultSink<W: Write> {
    writer: csv::Writer<W>,
    rows: usize,
}

impl ResultSink<File> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(file))
    }
}

impl<W: Write> ResultSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
            rows: 0,
        }
    }

    pub fn write(&mut self, row: &TrialResult) -> Result<()> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| HarnessError::Io(e.into_error()))
    }
}
