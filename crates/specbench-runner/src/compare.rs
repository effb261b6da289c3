use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::policy::PolicyKind;
use crate::transform::{normalize_key, ExpectedSpec, SpecValue};

#[derive(Debug, Clone, PartialEq)]
pub enum ActualEntry {
    Parsed(SpecValue),
    Malformed(Value),
}

impl ActualEntry {
    fn to_json(&self) -> Value {
        match self {
            ActualEntry::Parsed(v) => v.to_json(),
            ActualEntry::Malformed(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActualSpec {
    sections: BTreeMap<PolicyKind, BTreeMap<String, ActualEntry>>,
    unknown: BTreeMap<String, Value>,
}

impl ActualSpec {
    pub fn from_json(value: &Value) -> Self {
        let mut spec = ActualSpec::default();
        let Some(root) = value.as_object() else {
            return spec;
        };
        for (name, section) in root {
            let (Ok(kind), Some(entries)) = (PolicyKind::from_str(name), section.as_object())
            else {
                spec.unknown.insert(name.clone(), section.clone());
                continue;
            };
            let typed = spec.sections.entry(kind).or_default();
            for (key, raw) in entries {
                let entry = match SpecValue::from_json(raw) {
                    Some(v) => ActualEntry::Parsed(v),
                    None => ActualEntry::Malformed(raw.clone()),
                };
                typed.insert(normalize_key(key), entry);
            }
        }
        spec
    }

    pub fn get(&self, kind: PolicyKind, key: &str) -> Option<&ActualEntry> {
        self.sections.get(&kind).and_then(|s| s.get(key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedValue {
    pub path: String,
    pub expected: Value,
    pub actual: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuralDiff {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unexpected: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changed: Vec<ChangedValue>,
}

impl StructuralDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.changed.is_empty()
    }
}

impl fmt::Display for StructuralDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    pub total: usize,
    pub success: usize,
    pub fail: usize,
    pub wrong: usize,
    pub accuracy: f64,
    pub diff: StructuralDiff,
}

/// Scores `actual` against `expected`. Each expected `(type, key)` entry is
/// one unit: missing from actual is a `fail`, present with a different value
/// (or a value of the wrong shape) is `wrong`, otherwise `success`. Keys
/// only present in actual leave the counters alone and show up in the diff.
pub fn compare(expected: &ExpectedSpec, actual: &ActualSpec) -> Comparison {
    let mut out = Comparison::default();
    for (kind, entries) in expected.sections() {
        for (key, want) in entries {
            out.total += 1;
            let path = entry_path(*kind, key);
            match actual.get(*kind, key) {
                None => {
                    out.fail += 1;
                    out.diff.missing.push(path);
                }
                Some(ActualEntry::Parsed(got)) if want.matches(got) => out.success += 1,
                Some(got) => {
                    out.wrong += 1;
                    out.diff.changed.push(ChangedValue {
                        path,
                        expected: want.to_json(),
                        actual: got.to_json(),
                    });
                }
            }
        }
    }

    for (kind, entries) in &actual.sections {
        let known = expected.sections().get(kind);
        for key in entries.keys() {
            if known.map_or(true, |k| !k.contains_key(key)) {
                out.diff.unexpected.push(entry_path(*kind, key));
            }
        }
    }
    for name in actual.unknown.keys() {
        out.diff.unexpected.push(format!("root['{}']", name));
    }

    out.accuracy = if out.total == 0 {
        0.0
    } else {
        out.success as f64 / out.total as f64
    };
    out
}

fn entry_path(kind: PolicyKind, key: &str) -> String {
    format!("root['{}']['{}']", kind, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::Chunk;
    use crate::policy::{Intent, PolicyRecord};
    use crate::transform::to_expected_spec;
    use serde_json::json;

    fn expected() -> ExpectedSpec {
        to_expected_spec(&Chunk::new(vec![
            PolicyRecord::Reachability {
                source: "h1".to_string(),
                destination: "h2".to_string(),
                intent: Intent::Reach,
            },
            PolicyRecord::Reachability {
                source: "h1".to_string(),
                destination: "h3".to_string(),
                intent: Intent::Reach,
            },
            PolicyRecord::Reachability {
                source: "h4".to_string(),
                destination: "h5".to_string(),
                intent: Intent::Reach,
            },
            PolicyRecord::Waypoint {
                source: "Node A".to_string(),
                destination: "h2".to_string(),
                waypoints: vec!["s1".to_string()],
            },
            PolicyRecord::LoadBalancing {
                source: "Node A".to_string(),
                destination: "h2".to_string(),
                paths: 2,
            },
        ]))
    }

    #[test]
    fn exact_match_scores_full_accuracy() {
        let spec = expected();
        let actual = ActualSpec::from_json(&spec.to_json());
        let c = compare(&spec, &actual);
        assert_eq!(c.total, 4);
        assert_eq!(c.success, 4);
        assert_eq!(c.fail, 0);
        assert_eq!(c.wrong, 0);
        assert_eq!(c.accuracy, 1.0);
        assert!(c.diff.is_empty());
        assert_eq!(c.diff.to_string(), "{}");
    }

    #[test]
    fn list_order_and_key_spacing_do_not_matter() {
        let spec = expected();
        let actual = ActualSpec::from_json(&json!({
            "reachability": {"h4": ["h5"], "h1": ["h3", "h2"]},
            "waypoint": {"(Node A, h2)": ["s1"]},
            "loadbalancing": {" ( Node A , h2 ) ": 2}
        }));
        let c = compare(&spec, &actual);
        assert_eq!(c.success, 4, "diff: {}", c.diff);
    }

    #[test]
    fn empty_actual_fails_every_entry() {
        let spec = expected();
        let c = compare(&spec, &ActualSpec::from_json(&json!({})));
        assert_eq!(c.fail, c.total);
        assert_eq!(c.success, 0);
        assert_eq!(c.wrong, 0);
        assert_eq!(c.accuracy, 0.0);
        assert_eq!(c.diff.missing.len(), 4);
    }

    #[test]
    fn empty_expected_has_zero_accuracy() {
        let c = compare(
            &ExpectedSpec::default(),
            &ActualSpec::from_json(&json!({"reachability": {"h1": ["h2"]}})),
        );
        assert_eq!(c.total, 0);
        assert_eq!(c.accuracy, 0.0);
        assert_eq!(c.diff.unexpected, vec!["root['reachability']['h1']"]);
    }

    #[test]
    fn mismatched_values_are_wrong_not_failed() {
        let spec = expected();
        let actual = ActualSpec::from_json(&json!({
            "reachability": {"h1": ["h2"], "h4": "h5"},
            "waypoint": {"(NodeA,h2)": ["s1"]},
            "loadbalancing": {"(NodeA,h2)": 3},
            "notes": "extra"
        }));
        let c = compare(&spec, &actual);
        assert_eq!(c.total, 4);
        assert_eq!(c.success, 1);
        assert_eq!(c.wrong, 3);
        assert_eq!(c.fail, 0);
        assert_eq!(c.accuracy, 0.25);
        assert_eq!(c.diff.changed.len(), 3);
        assert_eq!(c.diff.unexpected, vec!["root['notes']"]);
        assert!(c.diff.to_string().contains("root['loadbalancing']['(NodeA,h2)']"));
    }

    #[test]
    fn missing_section_counts_as_failures() {
        let spec = expected();
        let actual = ActualSpec::from_json(&json!({
            "reachability": {"h1": ["h2", "h3"], "h4": ["h5"]}
        }));
        let c = compare(&spec, &actual);
        assert_eq!(c.success, 2);
        assert_eq!(c.fail, 2);
        assert_eq!(c.accuracy, 0.5);
    }
}
