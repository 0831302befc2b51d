use dotenv::dotenv;
use seqsum::s3_store::S3Store;
use seqsum::splitter::BatchDescriptor;
use seqsum::store::{chunk_key, partial_key, ObjectStore};
use seqsum::worker::UnitProcessor;
use std::env;

/// One array-job worker: fetch this index's chunk, summarize it, publish the
/// partial summary. The scheduler injects AWS_BATCH_JOB_ARRAY_INDEX.
fn main() {
    dotenv().ok();
    seqsum::init_tracing("seqsum-worker");

    let store = S3Store::try_from_env()
        .expect("Failed to build S3 store")
        .expect("SEQSUM_S3_BUCKET must be set");
    let batch = env::var("SEQSUM_BATCH").expect("SEQSUM_BATCH must be set");
    let index: usize = env::var("AWS_BATCH_JOB_ARRAY_INDEX")
        .expect("AWS_BATCH_JOB_ARRAY_INDEX must be set")
        .parse()
        .expect("AWS_BATCH_JOB_ARRAY_INDEX must be an integer");

    let descriptor = BatchDescriptor::load(&store, &batch)
        .expect("Failed to load batch descriptor")
        .expect("Batch descriptor not registered");

    let chunk = store
        .get(&chunk_key(&batch, index))
        .expect("Failed to fetch chunk object")
        .expect("Chunk object missing");

    let summary = UnitProcessor::new(descriptor.kmer_size)
        .process(index, &chunk[..])
        .expect("Failed to summarize chunk");

    store
        .put(
            &partial_key(&batch, index),
            summary.to_json().expect("Failed to encode partial summary"),
        )
        .expect("Failed to upload partial summary");

    tracing::info!(
        %batch,
        unit = index,
        total_bases = summary.total_bases,
        gc_count = summary.gc_count,
        "partial summary uploaded"
    );
}
