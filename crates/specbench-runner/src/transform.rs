use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::chunker::Chunk;
use crate::policy::{Intent, PolicyKind, PolicyRecord};

pub const ISOLATE_PREFIX: char = '!';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SpecValue {
    Nodes(Vec<String>),
    Count(u64),
}

impl SpecValue {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .map(SpecValue::Nodes),
            Value::Number(n) => n
                .as_u64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                        .map(|f| f as u64)
                })
                .map(SpecValue::Count),
            _ => None,
        }
    }

    pub fn matches(&self, other: &SpecValue) -> bool {
        match (self, other) {
            (SpecValue::Nodes(a), SpecValue::Nodes(b)) => {
                let mut a = a.clone();
                let mut b = b.clone();
                a.sort();
                b.sort();
                a == b
            }
            (SpecValue::Count(a), SpecValue::Count(b)) => a == b,
            _ => false,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SpecValue::Nodes(nodes) => Value::from(nodes.clone()),
            SpecValue::Count(n) => Value::from(*n),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExpectedSpec {
    sections: BTreeMap<PolicyKind, BTreeMap<String, SpecValue>>,
}

impl ExpectedSpec {
    pub fn sections(&self) -> &BTreeMap<PolicyKind, BTreeMap<String, SpecValue>> {
        &self.sections
    }

    pub fn total_entries(&self) -> usize {
        self.sections.values().map(BTreeMap::len).sum()
    }

    pub fn to_json(&self) -> Value {
        let mut root = serde_json::Map::new();
        for (kind, entries) in &self.sections {
            let section = entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect::<serde_json::Map<_, _>>();
            root.insert(kind.as_str().to_string(), Value::Object(section));
        }
        Value::Object(root)
    }
}

pub fn normalize_key(key: &str) -> String {
    key.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn pair_key(source: &str, destination: &str) -> String {
    normalize_key(&format!("({},{})", source, destination))
}

pub fn to_expected_spec(chunk: &Chunk) -> ExpectedSpec {
    let mut sections: BTreeMap<PolicyKind, BTreeMap<String, SpecValue>> = BTreeMap::new();
    for record in chunk.records() {
        let section = sections.entry(record.kind()).or_default();
        match record {
            PolicyRecord::Reachability {
                source,
                destination,
                intent,
            } => {
                let target = match intent {
                    Intent::Reach => destination.clone(),
                    Intent::Isolate => format!("{}{}", ISOLATE_PREFIX, destination),
                };
                push_nodes(section, normalize_key(source), std::iter::once(target));
            }
            PolicyRecord::Waypoint {
                source,
                destination,
                waypoints,
            } => {
                push_nodes(
                    section,
                    pair_key(source, destination),
                    waypoints.iter().cloned(),
                );
            }
            PolicyRecord::LoadBalancing {
                source,
                destination,
                paths,
            } => {
                section.insert(
                    pair_key(source, destination),
                    SpecValue::Count(u64::from(*paths)),
                );
            }
        }
    }
    ExpectedSpec { sections }
}

fn push_nodes<I: Iterator<Item = String>>(
    section: &mut BTreeMap<String, SpecValue>,
    key: String,
    nodes: I,
) {
    match section
        .entry(key)
        .or_insert_with(|| SpecValue::Nodes(Vec::new()))
    {
        SpecValue::Nodes(existing) => existing.extend(nodes),
        SpecValue::Count(_) => {}
    }
}

pub fn to_human_language(chunk: &Chunk) -> Vec<String> {
    chunk.records().iter().map(describe).collect()
}

fn describe(record: &PolicyRecord) -> String {
    match record {
        PolicyRecord::Reachability {
            source,
            destination,
            intent: Intent::Reach,
        } => format!("{} can reach {}.", source, destination),
        PolicyRecord::Reachability {
            source,
            destination,
            intent: Intent::Isolate,
        } => format!("{} cannot reach {}.", source, destination),
        PolicyRecord::Waypoint {
            source,
            destination,
            waypoints,
        } => format!(
            "Traffic from {} to {} must pass through {}.",
            source,
            destination,
            waypoints.join(", then ")
        ),
        PolicyRecord::LoadBalancing {
            source,
            destination,
            paths,
        } => format!(
            "Traffic from {} to {} must be load-balanced across {} paths.",
            source, destination, paths
        ),
    }
}
