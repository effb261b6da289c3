use crate::chunker::Chunk;
use crate::policy::{Intent, PolicyRecord};

/// Adds a requirement that contradicts the first reachability requirement of
/// the chunk: same source and destination, opposite intent.
///
/// Returns `false` and leaves the chunk untouched when it holds no
/// reachability requirement to contradict.
pub fn inject(chunk: &mut Chunk) -> bool {
    let contradiction = chunk.records().iter().find_map(|record| match record {
        PolicyRecord::Reachability {
            source,
            destination,
            intent,
        } => Some(PolicyRecord::Reachability {
            source: source.clone(),
            destination: destination.clone(),
            intent: intent.opposite(),
        }),
        _ => None,
    });
    match contradiction {
        Some(record) => {
            chunk.push(record);
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone)]
pub struct ConflictSchedule {
    next: bool,
}

impl ConflictSchedule {
    pub fn new() -> Self {
        Self { next: true }
    }
}

impl Default for ConflictSchedule {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for ConflictSchedule {
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        let flag = self.next;
        self.next = !flag;
        Some(flag)
    }
}

pub fn has_conflict(chunk: &Chunk) -> bool {
    let reach: Vec<(&str, &str, Intent)> = chunk
        .records()
        .iter()
        .filter_map(|record| match record {
            PolicyRecord::Reachability {
                source,
                destination,
                intent,
            } => Some((source.as_str(), destination.as_str(), *intent)),
            _ => None,
        })
        .collect();
    reach.iter().enumerate().any(|(i, (s, d, intent))| {
        reach[i + 1..]
            .iter()
            .any(|(s2, d2, intent2)| s == s2 && d == d2 && intent != intent2)
    })
}
