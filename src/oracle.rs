use crate::store::{parse_partial_index, partial_prefix, ObjectStore};
use crate::SeqsumError;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Waiting,
}

/// READY iff the number of distinct unit indices with a durable partial
/// reaches the expected count. Pure and safe to call redundantly; readiness
/// is monotonic under supersets of `present`.
pub fn evaluate(expected_count: usize, present: &BTreeSet<usize>) -> Readiness {
    if present.len() >= expected_count {
        Readiness::Ready
    } else {
        Readiness::Waiting
    }
}

/// Derive the set of present unit indices from the store listing. This is
/// the only evidence the coordinator trusts: triggers can be stale,
/// duplicated, or reordered, so their own claims are never consulted.
pub fn observed_indices(
    store: &dyn ObjectStore,
    batch: &str,
) -> Result<BTreeSet<usize>, SeqsumError> {
    let keys = store.list(&partial_prefix(batch))?;
    Ok(keys
        .iter()
        .filter_map(|key| parse_partial_index(key))
        .collect())
}
