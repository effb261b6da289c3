use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::{HarnessError, Result};

/// Policy families the benchmark knows about. Declaration order is the
/// canonical order used for sampling, chunk layout and file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    LoadBalancing,
    Reachability,
    Waypoint,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::LoadBalancing => "loadbalancing",
            PolicyKind::Reachability => "reachability",
            PolicyKind::Waypoint => "waypoint",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PolicyKind {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "loadbalancing" => Ok(PolicyKind::LoadBalancing),
            "reachability" => Ok(PolicyKind::Reachability),
            "waypoint" => Ok(PolicyKind::Waypoint),
            other => Err(HarnessError::Configuration(format!(
                "unknown policy type: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    #[default]
    Reach,
    Isolate,
}

impl Intent {
    pub fn opposite(self) -> Self {
        match self {
            Intent::Reach => Intent::Isolate,
            Intent::Isolate => Intent::Reach,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PolicyRecord {
    Reachability {
        source: String,
        destination: String,
        #[serde(default)]
        intent: Intent,
    },
    Waypoint {
        source: String,
        destination: String,
        waypoints: Vec<String>,
    },
    LoadBalancing {
        source: String,
        destination: String,
        paths: u32,
    },
}

impl PolicyRecord {
    pub fn kind(&self) -> PolicyKind {
        match self {
            PolicyRecord::Reachability { .. } => PolicyKind::Reachability,
            PolicyRecord::Waypoint { .. } => PolicyKind::Waypoint,
            PolicyRecord::LoadBalancing { .. } => PolicyKind::LoadBalancing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySelection {
    kinds: BTreeSet<PolicyKind>,
}

impl PolicySelection {
    pub fn new<I: IntoIterator<Item = PolicyKind>>(kinds: I) -> Result<Self> {
        let kinds: BTreeSet<PolicyKind> = kinds.into_iter().collect();
        if !kinds.contains(&PolicyKind::Reachability) {
            return Err(HarnessError::Configuration(
                "`reachability` is not in policy_types".to_string(),
            ));
        }
        if kinds.contains(&PolicyKind::LoadBalancing) && !kinds.contains(&PolicyKind::Waypoint) {
            return Err(HarnessError::Configuration(
                "`loadbalancing` requires `waypoint` in policy_types".to_string(),
            ));
        }
        Ok(Self { kinds })
    }

    pub fn kinds(&self) -> impl Iterator<Item = PolicyKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn contains(&self, kind: PolicyKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn label(&self) -> String {
        self.kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    by_kind: BTreeMap<PolicyKind, Vec<PolicyRecord>>,
}

impl Dataset {
    pub fn from_records<I: IntoIterator<Item = PolicyRecord>>(records: I) -> Self {
        let mut by_kind: BTreeMap<PolicyKind, Vec<PolicyRecord>> = BTreeMap::new();
        for record in records {
            by_kind.entry(record.kind()).or_default().push(record);
        }
        Self { by_kind }
    }

    pub fn records(&self, kind: PolicyKind) -> &[PolicyRecord] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn load_dataset(path: &Path, selection: &PolicySelection) -> Result<Dataset> {
    let data = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for (idx, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: PolicyRecord =
            serde_json::from_str(line).map_err(|e| HarnessError::Dataset {
                path: path.to_path_buf(),
                line: idx + 1,
                message: e.to_string(),
            })?;
        if selection.contains(record.kind()) {
            records.push(record);
        }
    }
    Ok(Dataset::from_records(records))
}
