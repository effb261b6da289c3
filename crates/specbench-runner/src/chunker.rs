use std::num::NonZeroUsize;

use crate::policy::PolicyRecord;
use crate::sampler::Sample;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    records: Vec<PolicyRecord>,
}

impl Chunk {
    pub fn new(records: Vec<PolicyRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[PolicyRecord] {
        &self.records
    }

    pub(crate) fn push(&mut self, record: PolicyRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Splits `sample` in order into chunks of `chunk_size`; the last one may be
/// shorter. A single natural chunk is duplicated so that each batch size
/// runs at least one trial with and one without an injected conflict.
pub fn chunk(sample: &Sample, chunk_size: NonZeroUsize) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = sample
        .records()
        .chunks(chunk_size.get())
        .map(|part| Chunk::new(part.to_vec()))
        .collect();
    if chunks.len() == 1 {
        let copy = chunks[0].clone();
        chunks.push(copy);
    }
    chunks
}
