//! Experiment harness for benchmarking natural-language to formal network
//! specification translation and conflict detection.
//!
//! A sweep draws a deterministic sample of policy records per iteration,
//! cuts it into chunks per batch size, injects a contradiction into every
//! other chunk and asks a [`ModelBackend`] to translate each chunk. Results
//! are scored against the chunk's [`ExpectedSpec`] and written one CSV row
//! per trial.

pub mod audit;
pub mod backend;
pub mod chunker;
pub mod compare;
pub mod conflict;
pub mod error;
pub mod policy;
pub mod sampler;
pub mod sink;
pub mod sweep;
pub mod transform;
pub mod trial;

pub use audit::AuditLog;
pub use backend::{
    CommandBackend, Invocation, ModelBackend, ModelCatalog, ModelConfig, PromptSet, Usage,
};
pub use chunker::{chunk, Chunk};
pub use compare::{compare, ActualSpec, Comparison, StructuralDiff};
pub use conflict::{inject, ConflictSchedule};
pub use error::{HarnessError, InvocationError, Result};
pub use policy::{load_dataset, Dataset, Intent, PolicyKind, PolicyRecord, PolicySelection};
pub use sampler::{ensure_sufficient, sample, Sample};
pub use sink::{ResultSink, TrialIds, TrialResult, RESULT_COLUMNS};
pub use sweep::{
    run_sweep, HarnessContext, OutputPaths, SweepConfig, SweepSummary, DEFAULT_BATCH_SIZES,
};
pub use transform::{to_expected_spec, to_human_language, ExpectedSpec, SpecValue};
pub use trial::{run_trial, TrialOutcome, TrialReport};
