use rand::RngCore;

use crate::error::{HarnessError, Result};
use crate::policy::{Dataset, PolicyRecord, PolicySelection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    records: Vec<PolicyRecord>,
}

impl Sample {
    pub fn records(&self) -> &[PolicyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn ensure_sufficient(
    dataset: &Dataset,
    size: usize,
    selection: &PolicySelection,
) -> Result<()> {
    let per_kind = per_kind_quota(size, selection);
    for kind in selection.kinds() {
        let available = dataset.records(kind).len();
        if available < per_kind {
            return Err(HarnessError::InsufficientData {
                kind,
                needed: per_kind,
                available,
            });
        }
    }
    Ok(())
}

// SplitMix64. Owned here so draws stay fixed across `rand` releases.
#[derive(Debug, Clone)]
struct SampleRng {
    state: u64,
}

impl SampleRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next_u64() % bound as u64) as usize
    }
}

impl RngCore for SampleRng {
    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

/// Draws a sample of `size` records. The iteration index seeds the draw, so
/// the same `(dataset, size, iteration, selection)` always yields the same
/// sample, on every build. Per-type subsets are drawn without replacement.
pub fn sample(
    dataset: &Dataset,
    size: usize,
    iteration: u64,
    selection: &PolicySelection,
) -> Result<Sample> {
    ensure_sufficient(dataset, size, selection)?;
    let per_kind = per_kind_quota(size, selection);

    let mut rng = SampleRng::new(iteration);
    let mut drawn: Vec<Vec<&PolicyRecord>> = Vec::with_capacity(selection.len());
    for kind in selection.kinds() {
        let pool = dataset.records(kind);
        // partial Fisher-Yates over pool indices
        let mut order: Vec<usize> = (0..pool.len()).collect();
        for i in 0..per_kind {
            let j = i + rng.below(pool.len() - i);
            order.swap(i, j);
        }
        drawn.push(order[..per_kind].iter().map(|&i| &pool[i]).collect());
    }

    let mut records = Vec::with_capacity(per_kind * drawn.len());
    for i in 0..per_kind {
        for picks in &drawn {
            records.push(picks[i].clone());
        }
    }
    records.truncate(size);
    Ok(Sample { records })
}

fn per_kind_quota(size: usize, selection: &PolicySelection) -> usize {
    size.div_ceil(selection.len().max(1))
}
