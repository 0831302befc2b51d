use crate::SeqsumError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// k-mer frequency table. A `BTreeMap` keeps the serialized form
/// deterministic, so re-publishing a final summary over the same partials is
/// byte-identical.
pub type KmerCounts = BTreeMap<String, u64>;

/// Statistics computed from one unit of the batch. Written once by its
/// worker, read-only afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialSummary {
    pub unit_index: usize,
    pub kmer_size: usize,
    pub total_bases: u64,
    pub gc_count: u64,
    pub kmer_counts: KmerCounts,
}

impl PartialSummary {
    pub fn to_json(&self) -> Result<Vec<u8>, SeqsumError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, SeqsumError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The running value of the merge fold: elementwise sums over partials.
///
/// `combine` is associative and commutative and `identity` is its neutral
/// element, so the coordinator may fold the partials in any order or
/// grouping and always land on the same totals. The derived `gc_percent` is
/// deliberately not part of this accumulator; it is computed once from the
/// final totals to avoid compounding rounding error across merges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedTotals {
    pub total_bases: u64,
    pub gc_count: u64,
    pub kmer_counts: KmerCounts,
}

impl MergedTotals {
    pub fn identity() -> Self {
        Self::default()
    }

    /// Fold one partial into the accumulator.
    pub fn absorb(&mut self, part: &PartialSummary) {
        self.total_bases += part.total_bases;
        self.gc_count += part.gc_count;
        for (kmer, count) in &part.kmer_counts {
            *self.kmer_counts.entry(kmer.clone()).or_insert(0) += count;
        }
    }

    /// Merge two accumulators, e.g. partial folds produced independently.
    pub fn combine(mut self, other: MergedTotals) -> MergedTotals {
        self.total_bases += other.total_bases;
        self.gc_count += other.gc_count;
        for (kmer, count) in other.kmer_counts {
            *self.kmer_counts.entry(kmer).or_insert(0) += count;
        }
        self
    }

    pub fn into_final(self) -> FinalSummary {
        let gc_percent = gc_percent(self.gc_count, self.total_bases);
        FinalSummary {
            total_bases: self.total_bases,
            total_gc: self.gc_count,
            gc_percent,
            kmer_counts: self.kmer_counts,
        }
    }
}

/// The batch-level reduction; the terminal artifact for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub total_bases: u64,
    pub total_gc: u64,
    pub gc_percent: f64,
    pub kmer_counts: KmerCounts,
}

impl FinalSummary {
    pub fn to_json(&self) -> Result<Vec<u8>, SeqsumError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, SeqsumError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// GC percentage rounded to 3 decimal places; 0 when no bases were counted.
pub fn gc_percent(gc: u64, bases: u64) -> f64 {
    if bases == 0 {
        return 0.0;
    }
    let raw = gc as f64 / bases as f64 * 100.0;
    (raw * 1000.0).round() / 1000.0
}
