use crate::oracle::{self, Readiness};
use crate::splitter::BatchDescriptor;
use crate::store::{final_key, partial_key, ObjectStore};
use crate::summary::{FinalSummary, MergedTotals, PartialSummary};
use crate::SeqsumError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// A completion notification. Delivery is at-least-once and unordered;
/// duplicates are expected. Neither shape's counts are trusted: the
/// coordinator re-derives readiness from the store on every trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// One unit reported success.
    UnitCompleted { batch: String, unit_index: usize },
    /// The batch as a whole reported a terminal status with some claimed
    /// success count.
    BatchStatus { batch: String, succeeded: usize },
}

impl Trigger {
    pub fn batch(&self) -> &str {
        match self {
            Trigger::UnitCompleted { batch, .. } => batch,
            Trigger::BatchStatus { batch, .. } => batch,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    /// Fewer than the expected number of partials are durably present.
    Waiting { present: usize, expected: usize },
    /// The final summary was computed and published by this invocation.
    Finalized(FinalSummary),
    /// The trigger references a batch with no registered descriptor;
    /// readiness cannot be determined. Logged and ignored.
    NotAnAggregationEvent,
}

/// Trigger-driven fan-in state machine. Two observable states per batch:
/// WAITING until all partials are present, FINALIZED once the final summary
/// is published.
///
/// Finalization is a pure function of the stable partial set, and the final
/// slot is overwritten whole-value, so concurrent or repeated triggers may
/// race to finalize without locks: every execution writes the same bytes.
pub struct Coordinator {
    store: Arc<dyn ObjectStore>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn handle_trigger(&self, trigger: &Trigger) -> Result<TriggerOutcome, SeqsumError> {
        let batch = trigger.batch();

        let Some(descriptor) = BatchDescriptor::load(&*self.store, batch)? else {
            tracing::warn!(batch, "trigger for unregistered batch; ignoring");
            return Ok(TriggerOutcome::NotAnAggregationEvent);
        };

        let present = oracle::observed_indices(&*self.store, batch)?;
        if oracle::evaluate(descriptor.expected_count, &present) == Readiness::Waiting {
            tracing::debug!(
                batch,
                present = present.len(),
                expected = descriptor.expected_count,
                "waiting for more partial summaries"
            );
            return Ok(TriggerOutcome::Waiting {
                present: present.len(),
                expected: descriptor.expected_count,
            });
        }

        let final_summary = self.finalize(batch, &present)?;
        Ok(TriggerOutcome::Finalized(final_summary))
    }

    /// Read every present partial, fold, and overwrite the final slot.
    ///
    /// A partial that was listed but cannot be read contradicts monotonic
    /// visibility, so it is treated as a transient store fault: the attempt
    /// aborts and the next trigger retries.
    fn finalize(
        &self,
        batch: &str,
        present: &BTreeSet<usize>,
    ) -> Result<FinalSummary, SeqsumError> {
        let mut totals = MergedTotals::identity();
        for &index in present {
            let key = partial_key(batch, index);
            let bytes = self.store.get(&key)?.ok_or_else(|| {
                SeqsumError::Store(format!("partial summary {} vanished during finalization", key))
            })?;
            let part = PartialSummary::from_json(&bytes)?;
            totals.absorb(&part);
        }

        let final_summary = totals.into_final();
        self.store
            .put(&final_key(batch), final_summary.to_json()?)?;
        tracing::info!(
            batch,
            total_bases = final_summary.total_bases,
            total_gc = final_summary.total_gc,
            gc_percent = final_summary.gc_percent,
            unique_kmers = final_summary.kmer_counts.len(),
            "published final summary"
        );
        Ok(final_summary)
    }

    /// The published final summary, if the batch has finalized.
    pub fn final_summary(&self, batch: &str) -> Result<Option<FinalSummary>, SeqsumError> {
        match self.store.get(&final_key(batch))? {
            Some(bytes) => Ok(Some(FinalSummary::from_json(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::summary::KmerCounts;

    fn partial(index: usize, bases: u64, gc: u64, kmers: &[(&str, u64)]) -> PartialSummary {
        PartialSummary {
            unit_index: index,
            kmer_size: 3,
            total_bases: bases,
            gc_count: gc,
            kmer_counts: kmers.iter().map(|(k, c)| (k.to_string(), *c)).collect::<KmerCounts>(),
        }
    }

    fn setup(expected_count: usize) -> (Arc<MemoryStore>, Coordinator) {
        let store = Arc::new(MemoryStore::new());
        BatchDescriptor {
            batch: "b1".to_string(),
            expected_count,
            kmer_size: 3,
        }
        .register(&*store)
        .unwrap();
        let coordinator = Coordinator::new(store.clone());
        (store, coordinator)
    }

    fn write_partial(store: &MemoryStore, part: &PartialSummary) {
        store
            .put(&partial_key("b1", part.unit_index), part.to_json().unwrap())
            .unwrap();
    }

    fn unit_trigger(index: usize) -> Trigger {
        Trigger::UnitCompleted {
            batch: "b1".to_string(),
            unit_index: index,
        }
    }

    #[test]
    fn test_waiting_until_all_partials_present() {
        let (store, coordinator) = setup(3);
        write_partial(&store, &partial(0, 8, 4, &[("ACG", 2)]));
        write_partial(&store, &partial(2, 4, 1, &[("CGT", 1)]));

        let outcome = coordinator.handle_trigger(&unit_trigger(0)).unwrap();
        assert_eq!(
            outcome,
            TriggerOutcome::Waiting {
                present: 2,
                expected: 3
            }
        );
        assert_eq!(coordinator.final_summary("b1").unwrap(), None);
    }

    #[test]
    fn test_finalizes_when_last_partial_arrives() {
        let (store, coordinator) = setup(2);
        write_partial(&store, &partial(0, 8, 4, &[("ACG", 2)]));
        write_partial(&store, &partial(1, 4, 1, &[("ACG", 1), ("CGT", 1)]));

        let outcome = coordinator.handle_trigger(&unit_trigger(1)).unwrap();
        let TriggerOutcome::Finalized(final_summary) = outcome else {
            panic!("expected finalization");
        };
        assert_eq!(final_summary.total_bases, 12);
        assert_eq!(final_summary.total_gc, 5);
        assert_eq!(final_summary.gc_percent, 41.667);
        assert_eq!(final_summary.kmer_counts["ACG"], 3);
        assert_eq!(final_summary.kmer_counts["CGT"], 1);

        assert_eq!(
            coordinator.final_summary("b1").unwrap(),
            Some(final_summary)
        );
    }

    #[test]
    fn test_repeated_triggers_are_idempotent() {
        let (store, coordinator) = setup(2);
        write_partial(&store, &partial(0, 8, 4, &[("ACG", 2)]));
        write_partial(&store, &partial(1, 4, 1, &[("CGT", 1)]));

        let first = coordinator.handle_trigger(&unit_trigger(0)).unwrap();
        let published_once = store.get(&final_key("b1")).unwrap().unwrap();

        // Duplicate and out-of-order redeliveries, including a stale batch
        // status, all recompute the identical value.
        for trigger in [
            unit_trigger(1),
            unit_trigger(0),
            Trigger::BatchStatus {
                batch: "b1".to_string(),
                succeeded: 99,
            },
        ] {
            let again = coordinator.handle_trigger(&trigger).unwrap();
            assert_eq!(first, again);
        }
        let published_after = store.get(&final_key("b1")).unwrap().unwrap();
        assert_eq!(published_once, published_after);
    }

    #[test]
    fn test_batch_status_count_is_not_trusted() {
        let (store, coordinator) = setup(3);
        write_partial(&store, &partial(0, 8, 4, &[("ACG", 2)]));

        // The trigger claims every unit succeeded; only the store decides.
        let outcome = coordinator
            .handle_trigger(&Trigger::BatchStatus {
                batch: "b1".to_string(),
                succeeded: 3,
            })
            .unwrap();
        assert_eq!(
            outcome,
            TriggerOutcome::Waiting {
                present: 1,
                expected: 3
            }
        );
    }

    #[test]
    fn test_unregistered_batch_is_not_an_aggregation_event() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = Coordinator::new(store);
        let outcome = coordinator
            .handle_trigger(&Trigger::UnitCompleted {
                batch: "nowhere".to_string(),
                unit_index: 0,
            })
            .unwrap();
        assert_eq!(outcome, TriggerOutcome::NotAnAggregationEvent);
    }

    #[test]
    fn test_malformed_descriptor_is_surfaced() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(
                &crate::store::descriptor_key("b1"),
                br#"{"batch":"b1","expected_count":0,"kmer_size":3}"#.to_vec(),
            )
            .unwrap();
        let coordinator = Coordinator::new(store);
        let err = coordinator.handle_trigger(&unit_trigger(0)).unwrap_err();
        assert!(matches!(err, SeqsumError::MalformedBatch(_)));
    }

    #[test]
    fn test_trigger_json_shapes() {
        let unit: Trigger =
            serde_json::from_str(r#"{"kind":"unit_completed","batch":"b1","unit_index":4}"#)
                .unwrap();
        assert_eq!(
            unit,
            Trigger::UnitCompleted {
                batch: "b1".to_string(),
                unit_index: 4
            }
        );

        let status: Trigger =
            serde_json::from_str(r#"{"kind":"batch_status","batch":"b1","succeeded":12}"#).unwrap();
        assert_eq!(status.batch(), "b1");
    }
}
