use chrono::Local;
use std::fs::File;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::backend::ModelBackend;
use crate::chunker::chunk;
use crate::conflict::{inject, ConflictSchedule};
use crate::error::{HarnessError, Result};
use crate::policy::{Dataset, PolicySelection};
use crate::sampler::{ensure_sufficient, sample};
use crate::sink::{ResultSink, TrialIds};
use crate::trial::{run_trial, TrialOutcome, TrialReport};

pub const DEFAULT_BATCH_SIZES: [usize; 8] = [1, 2, 5, 10, 20, 25, 50, 100];

#[derive(Debug, Clone)]
pub struct SweepConfig {
    n_runs: usize,
    batch_sizes: Vec<NonZeroUsize>,
    selection: PolicySelection,
    n_policy_types: NonZeroUsize,
}

impl SweepConfig {
    pub fn new(n_runs: usize, batch_sizes: &[usize], selection: PolicySelection) -> Result<Self> {
        if batch_sizes.is_empty() {
            return Err(HarnessError::Configuration(
                "at least one batch size is required".to_string(),
            ));
        }
        let batch_sizes = batch_sizes
            .iter()
            .map(|&b| {
                NonZeroUsize::new(b).ok_or_else(|| {
                    HarnessError::Configuration("batch sizes must be positive".to_string())
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let n_policy_types = NonZeroUsize::new(selection.len()).ok_or_else(|| {
            HarnessError::Configuration("no policy types selected".to_string())
        })?;
        Ok(Self {
            n_runs,
            batch_sizes,
            selection,
            n_policy_types,
        })
    }

    pub fn selection(&self) -> &PolicySelection {
        &self.selection
    }

    pub fn n_runs(&self) -> usize {
        self.n_runs
    }

    pub fn max_n_requirements(&self) -> usize {
        self.batch_sizes
            .iter()
            .map(|b| b.get())
            .max()
            .unwrap_or(0)
            * self.n_policy_types.get()
    }
}

pub struct HarnessContext<R: Write, L: Write> {
    pub results: ResultSink<R>,
    pub audit: AuditLog<L>,
}

impl HarnessContext<File, File> {
    pub fn create(paths: &OutputPaths) -> Result<Self> {
        Ok(Self {
            results: ResultSink::create(&paths.results)?,
            audit: AuditLog::create(&paths.log)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub results: PathBuf,
    pub log: PathBuf,
}

impl OutputPaths {
    pub fn new(
        dir: &Path,
        model: &str,
        combined: bool,
        selection: &PolicySelection,
        timestamp: &str,
    ) -> Self {
        let stem = format!(
            "{}{}-{}-conflict-{}",
            model,
            if combined { "-combined" } else { "" },
            selection.label(),
            timestamp
        );
        Self {
            results: dir.join(format!("result-{}.csv", stem)),
            log: dir.join(format!("log-{}.log", stem)),
        }
    }

    pub fn timestamped(
        dir: &Path,
        model: &str,
        combined: bool,
        selection: &PolicySelection,
    ) -> Self {
        let stamp = Local::now().format("%Y%m%d-%H%M%S").to_string();
        Self::new(dir, model, combined, selection, &stamp)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepSummary {
    pub trials: usize,
    pub compared: usize,
    pub model_errors: usize,
    pub format_errors: usize,
    pub conflicts_injected: usize,
    pub conflicts_detected: usize,
    pub mean_accuracy: f64,
}

impl SweepSummary {
    fn observe(&mut self, report: &TrialReport) {
        self.trials += 1;
        if report.result.conflict_exist {
            self.conflicts_injected += 1;
        }
        match report.outcome {
            TrialOutcome::Compared => {
                self.compared += 1;
                let n = self.compared as f64;
                self.mean_accuracy += (report.result.accuracy - self.mean_accuracy) / n;
            }
            TrialOutcome::ConflictDetected => self.conflicts_detected += 1,
            TrialOutcome::FormatError => self.format_errors += 1,
            TrialOutcome::ModelError => self.model_errors += 1,
        }
    }
}

pub fn run_sweep<B, R, L>(
    ctx: &mut HarnessContext<R, L>,
    backend: &mut B,
    dataset: &Dataset,
    config: &SweepConfig,
) -> Result<SweepSummary>
where
    B: ModelBackend + ?Sized,
    R: Write,
    L: Write,
{
    let max_n_requirements = config.max_n_requirements();
    let n_policy_types = config.n_policy_types;
    ensure_sufficient(dataset, max_n_requirements, &config.selection)?;

    let mut summary = SweepSummary::default();
    for it in 0..config.n_runs {
        info!("Performing iteration n. {}...", it + 1);
        let drawn = sample(dataset, max_n_requirements, it as u64, &config.selection)?;

        for &batch_size in &config.batch_sizes {
            let chunk_size = batch_size.saturating_mul(n_policy_types);
            info!(
                "Performing experiment with {} batch size (iteration n. {})...",
                chunk_size,
                it + 1
            );
            let chunks = chunk(&drawn, chunk_size);
            let schedule = chunks.into_iter().zip(ConflictSchedule::new());
            for (i, (mut current, flag)) in schedule.enumerate() {
                info!(
                    "Performing experiment with {} batch size on chunk {} (iteration n. {})...",
                    chunk_size,
                    i,
                    it + 1
                );
                let conflict_exist = flag && inject(&mut current);
                if flag && !conflict_exist {
                    warn!("chunk {} has no reachability requirement to contradict", i);
                }
                let ids = TrialIds {
                    iteration: it,
                    batch_size: batch_size.get(),
                    n_policy_types: n_policy_types.get(),
                    max_n_requirements,
                    chunk: i,
                };
                let report = run_trial(&mut *backend, &current, ids, conflict_exist);
                ctx.audit.record(&report)?;
                ctx.results.write(&report.result)?;
                summary.observe(&report);
            }
        }
    }
    Ok(summary)
}
