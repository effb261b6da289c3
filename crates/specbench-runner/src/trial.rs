use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

use crate::backend::ModelBackend;
use crate::chunker::Chunk;
use crate::compare::{compare, ActualSpec};
use crate::error::InvocationError;
use crate::sink::{TrialIds, TrialResult};
use crate::transform::{to_expected_spec, to_human_language, ExpectedSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialOutcome {
    Compared,
    ConflictDetected,
    FormatError,
    ModelError,
}

#[derive(Debug, Clone)]
pub struct TrialReport {
    pub result: TrialResult,
    pub outcome: TrialOutcome,
    pub expected: ExpectedSpec,
    pub human_language: Vec<String>,
    pub raw_output: String,
}

pub fn run_trial<B: ModelBackend + ?Sized>(
    backend: &mut B,
    chunk: &Chunk,
    ids: TrialIds,
    conflict_exist: bool,
) -> TrialReport {
    let expected = to_expected_spec(chunk);
    let human_language = to_human_language(chunk);
    let mut result = TrialResult::new(ids, conflict_exist);

    let start = Instant::now();
    let invoked = backend.process(&human_language.join(" "));
    result.time = start.elapsed().as_secs_f64();

    let (outcome, raw_output) = match invoked {
        Err(InvocationError::Model(message)) => {
            warn!(iteration = ids.iteration, chunk = ids.chunk, "model error: {}", message);
            result.model_error = message;
            (TrialOutcome::ModelError, String::new())
        }
        Err(InvocationError::Format { message, raw }) => {
            result.format_error = if raw.is_empty() {
                message
            } else {
                format!("{} (output: {})", message, raw)
            };
            (TrialOutcome::FormatError, raw)
        }
        Ok(invocation) => {
            if let Some(usage) = invocation.usage {
                result.record_usage(usage);
            }
            let raw = invocation.output.to_string();
            if !invocation.status {
                result.conflict_detect = true;
                result.diff = match &invocation.output {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (TrialOutcome::ConflictDetected, raw)
            } else if let Some(spec) = extract_spec(&invocation.output) {
                let comparison = compare(&expected, &ActualSpec::from_json(spec));
                result.record_comparison(&comparison);
                (TrialOutcome::Compared, raw)
            } else {
                result.format_error = raw.clone();
                (TrialOutcome::FormatError, raw)
            }
        }
    };
    debug!(
        iteration = ids.iteration,
        batch_size = ids.batch_size,
        chunk = ids.chunk,
        ?outcome,
        "trial finished"
    );

    TrialReport {
        result,
        outcome,
        expected,
        human_language,
        raw_output,
    }
}

/// The formal spec is the first positional argument of the model's
/// function call: `{"args": [<spec>]}`.
fn extract_spec(output: &Value) -> Option<&Value> {
    output
        .get("args")
        .and_then(|args| args.get(0))
        .filter(|spec| spec.is_object())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::{Invocation, Usage};
    use crate::policy::{Intent, PolicyRecord};
    use serde_json::json;
    use std::collections::VecDeque;

    pub(crate) struct ScriptedBackend {
        pub(crate) responses: VecDeque<Result<Invocation, InvocationError>>,
        pub(crate) inputs: Vec<String>,
    }

    impl ScriptedBackend {
        pub(crate) fn new<I>(responses: I) -> Self
        where
            I: IntoIterator<Item = Result<Invocation, InvocationError>>,
        {
            Self {
                responses: responses.into_iter().collect(),
                inputs: Vec::new(),
            }
        }

        pub(crate) fn exhausted() -> Self {
            Self {
                responses: VecDeque::new(),
                inputs: Vec::new(),
            }
        }
    }

    impl ModelBackend for ScriptedBackend {
        fn process(&mut self, input: &str) -> Result<Invocation, InvocationError> {
            self.inputs.push(input.to_string());
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(InvocationError::Model("no scripted response".to_string())))
        }
    }

    fn ids() -> TrialIds {
        TrialIds {
            iteration: 1,
            batch_size: 2,
            n_policy_types: 1,
            max_n_requirements: 2,
            chunk: 0,
        }
    }

    fn chunk() -> Chunk {
        Chunk::new(vec![
            PolicyRecord::Reachability {
                source: "h1".to_string(),
                destination: "h2".to_string(),
                intent: Intent::Reach,
            },
            PolicyRecord::Reachability {
                source: "h3".to_string(),
                destination: "h4".to_string(),
                intent: Intent::Reach,
            },
        ])
    }

    fn ok(status: bool, output: Value) -> Result<Invocation, InvocationError> {
        Ok(Invocation {
            status,
            output,
            usage: None,
        })
    }

    #[test]
    fn matching_output_is_compared() {
        let mut backend = ScriptedBackend::new([Ok(Invocation {
            status: true,
            output: json!({"args": [{"reachability": {"h1": ["h2"], "h3": ["h4"]}}]}),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 4,
                total_cost: 0.02,
            }),
        })]);
        let report = run_trial(&mut backend, &chunk(), ids(), false);
        assert_eq!(report.outcome, TrialOutcome::Compared);
        assert_eq!(backend.inputs, vec!["h1 can reach h2. h3 can reach h4."]);
        let r = &report.result;
        assert_eq!((r.total, r.success, r.fail, r.wrong), (2, 2, 0, 0));
        assert_eq!(r.accuracy, 1.0);
        assert_eq!(r.diff, "{}");
        assert_eq!(r.prompt_tokens, 10);
        assert_eq!(r.completion_tokens, 4);
        assert_eq!(r.total_cost, 0.02);
        assert!(!r.conflict_detect);
    }

    #[test]
    fn reported_conflict_skips_comparison() {
        let mut backend = ScriptedBackend::new([ok(false, json!("h1 both reaches and cannot reach h2"))]);
        let report = run_trial(&mut backend, &chunk(), ids(), true);
        assert_eq!(report.outcome, TrialOutcome::ConflictDetected);
        let r = &report.result;
        assert!(r.conflict_detect);
        assert!(r.conflict_exist);
        assert_eq!(r.total, 0);
        assert_eq!(r.diff, "h1 both reaches and cannot reach h2");
    }

    #[test]
    fn output_without_args_is_a_format_error() {
        let mut backend = ScriptedBackend::new([
            ok(true, json!({"reachability": {}})),
            ok(true, json!({"args": ["not a spec"]})),
        ]);
        for _ in 0..2 {
            let report = run_trial(&mut backend, &chunk(), ids(), false);
            assert_eq!(report.outcome, TrialOutcome::FormatError);
            assert!(!report.result.format_error.is_empty());
            assert_eq!(report.result.total, 0);
        }
    }

    #[test]
    fn decode_failure_is_a_format_error() {
        let mut backend = ScriptedBackend::new([Err(InvocationError::Format {
            message: "expected value at line 1 column 1".to_string(),
            raw: String::new(),
        })]);
        let report = run_trial(&mut backend, &chunk(), ids(), false);
        assert_eq!(report.outcome, TrialOutcome::FormatError);
        assert_eq!(report.result.format_error, "expected value at line 1 column 1");
        assert!(report.result.model_error.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn undecodable_model_text_reaches_row_and_audit_log() {
        use crate::audit::AuditLog;
        use crate::backend::{CommandBackend, ModelConfig, PromptSet};
        use std::collections::BTreeMap;

        let config = ModelConfig {
            backend_type: "test".to_string(),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "cat >/dev/null; echo 'Sure! here is the spec: {reachability: h1}'".to_string(),
            ],
            env: BTreeMap::new(),
        };
        let mut backend = CommandBackend::new(&config, PromptSet::ConflictDetection);
        let report = run_trial(&mut backend, &chunk(), ids(), false);
        assert_eq!(report.outcome, TrialOutcome::FormatError);
        assert_eq!(report.raw_output, "Sure! here is the spec: {reachability: h1}");
        assert!(
            report.result.format_error.contains("Sure! here is the spec"),
            "{}",
            report.result.format_error
        );

        let mut audit = AuditLog::new(Vec::new());
        audit.record(&report).expect("audit");
        let log = String::from_utf8(audit.into_inner()).expect("utf8");
        assert!(log.contains("Output: Sure! here is the spec: {reachability: h1}"), "{}", log);
    }

    #[test]
    fn model_error_leaves_counters_at_zero() {
        let mut backend =
            ScriptedBackend::new([Err(InvocationError::Model("rate limited".to_string()))]);
        let report = run_trial(&mut backend, &chunk(), ids(), true);
        assert_eq!(report.outcome, TrialOutcome::ModelError);
        let r = &report.result;
        assert_eq!(r.model_error, "rate limited");
        assert!(!r.conflict_detect);
        assert_eq!((r.total, r.success, r.fail, r.wrong), (0, 0, 0, 0));
        assert_eq!(r.accuracy, 0.0);
        assert!(report.raw_output.is_empty());
    }
}
