use dotenv::dotenv;
use seqsum::coordinator::{Coordinator, Trigger, TriggerOutcome};
use seqsum::s3_store::S3Store;
use std::sync::Arc;

/// Handle one delivered completion notification. Redeliveries and duplicate
/// invocations are expected; every call re-derives readiness from the store.
fn main() {
    dotenv().ok();
    seqsum::init_tracing("seqsum-aggregator");

    let raw = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("SEQSUM_TRIGGER").ok())
        .expect("Pass the trigger JSON as the first argument or in SEQSUM_TRIGGER");
    let trigger: Trigger = serde_json::from_str(&raw).expect("Invalid trigger JSON");

    let store = S3Store::try_from_env()
        .expect("Failed to build S3 store")
        .expect("SEQSUM_S3_BUCKET must be set");
    let coordinator = Coordinator::new(Arc::new(store));

    match coordinator
        .handle_trigger(&trigger)
        .expect("Trigger handling failed")
    {
        TriggerOutcome::Waiting { present, expected } => {
            println!(
                "[aggregator] Waiting: {}/{} partial summaries present",
                present, expected
            );
        }
        TriggerOutcome::Finalized(summary) => {
            println!(
                "[aggregator] Finalized: {} bases, GC {:.3}%, {} unique k-mers",
                summary.total_bases,
                summary.gc_percent,
                summary.kmer_counts.len()
            );
        }
        TriggerOutcome::NotAnAggregationEvent => {
            println!("[aggregator] Not an aggregation event; ignored");
        }
    }
}
