use clap::Parser;
use itertools::Itertools;
use seqsum::coordinator::{Coordinator, Trigger, TriggerOutcome};
use seqsum::splitter::{Splitter, DEFAULT_CHUNK_BYTES};
use seqsum::store::{chunk_key, partial_key, DirStore, ObjectStore};
use seqsum::summary::FinalSummary;
use seqsum::worker::UnitProcessor;
use seqsum::SeqsumError;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

/// Split a sequence file into units, summarize every unit in parallel, and
/// aggregate the partial summaries into one final report.
#[derive(Parser)]
#[command(name = "seqsum")]
struct Args {
    /// Sequence file to process (FASTA or raw bases)
    input: PathBuf,

    /// k-mer window width
    #[arg(long, default_value_t = 5)]
    kmer_size: usize,

    /// Bytes per unit
    #[arg(long, default_value_t = DEFAULT_CHUNK_BYTES)]
    chunk_bytes: usize,

    /// Parallel worker threads
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// State directory backing the object store
    #[arg(long, default_value = "./seqsum_state")]
    state_dir: PathBuf,

    /// Batch name; derived from the input file name when omitted
    #[arg(long)]
    batch: Option<String>,

    /// How many of the most frequent k-mers to print
    #[arg(long, default_value_t = 10)]
    top: usize,
}

/// Batch names mirror the scheduler's job-name rules: alphanumeric start,
/// only [A-Za-z0-9_-] afterward.
fn sanitize_batch_name(name: &str) -> String {
    let no_ext = name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(name);
    let cleaned: String = no_ext
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.chars().next().is_some_and(|c| c.is_ascii_alphanumeric()) {
        cleaned
    } else {
        format!("batch-{}", cleaned)
    }
}

fn main() -> Result<(), SeqsumError> {
    seqsum::init_tracing("seqsum");
    let args = Args::parse();

    let batch = args.batch.clone().unwrap_or_else(|| {
        let name = args
            .input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "batch".to_string());
        sanitize_batch_name(&name)
    });

    println!("[seqsum] Input: {}", args.input.display());
    println!("[seqsum] Batch: {}", batch);
    println!("[seqsum] k-mer size: {}", args.kmer_size);

    let store: Arc<dyn ObjectStore> = Arc::new(DirStore::new(&args.state_dir)?);
    let input = File::open(&args.input)?;
    let descriptor = Splitter::new(args.chunk_bytes).split(&batch, args.kmer_size, input, &*store)?;
    println!("[seqsum] Split into {} units", descriptor.expected_count);

    let coordinator = Coordinator::new(store.clone());
    let processor = UnitProcessor::new(descriptor.kmer_size);

    let (unit_tx, unit_rx) = crossbeam_channel::unbounded::<usize>();
    for index in 0..descriptor.expected_count {
        let _ = unit_tx.send(index);
    }
    drop(unit_tx);

    let (done_tx, done_rx) = crossbeam_channel::unbounded::<(usize, Result<(), SeqsumError>)>();

    let mut failures: Vec<(usize, SeqsumError)> = Vec::new();
    let mut final_summary: Option<FinalSummary> = None;

    std::thread::scope(|scope| {
        for _ in 0..args.workers.max(1) {
            let unit_rx = unit_rx.clone();
            let done_tx = done_tx.clone();
            let store = store.clone();
            let processor = &processor;
            let batch = batch.as_str();
            scope.spawn(move || {
                while let Ok(index) = unit_rx.recv() {
                    let outcome = run_unit(&*store, batch, index, processor);
                    let _ = done_tx.send((index, outcome));
                }
            });
        }
        drop(done_tx);

        // Triggers arrive as units finish: out of order relative to unit
        // indices, exactly like redelivered scheduler notifications.
        while let Ok((index, outcome)) = done_rx.recv() {
            match outcome {
                Ok(()) => {
                    let trigger = Trigger::UnitCompleted {
                        batch: batch.clone(),
                        unit_index: index,
                    };
                    match coordinator.handle_trigger(&trigger) {
                        Ok(TriggerOutcome::Finalized(summary)) => final_summary = Some(summary),
                        Ok(TriggerOutcome::Waiting { present, expected }) => {
                            println!("[seqsum] Unit {} done ({}/{} present)", index, present, expected);
                        }
                        Ok(TriggerOutcome::NotAnAggregationEvent) => {}
                        Err(e) => failures.push((index, e)),
                    }
                }
                Err(e) => {
                    println!("[seqsum] Unit {} failed: {}", index, e);
                    failures.push((index, e));
                }
            }
        }
    });

    if !failures.is_empty() {
        println!(
            "[seqsum] {} unit(s) failed; batch stays incomplete until they are resubmitted",
            failures.len()
        );
        return Err(SeqsumError::Other(format!(
            "{} of {} units failed",
            failures.len(),
            descriptor.expected_count
        )));
    }

    let summary = match final_summary {
        Some(summary) => summary,
        // The final slot is authoritative even if this process missed the
        // finalizing trigger outcome.
        None => coordinator
            .final_summary(&batch)?
            .ok_or_else(|| SeqsumError::Other("batch never finalized".to_string()))?,
    };

    println!("[seqsum] Total bases: {}", summary.total_bases);
    println!("[seqsum] GC count: {}", summary.total_gc);
    println!("[seqsum] GC percent: {:.3}", summary.gc_percent);
    println!("[seqsum] Unique k-mers: {}", summary.kmer_counts.len());
    println!("[seqsum] Top {} k-mers:", args.top);
    for (kmer, count) in summary
        .kmer_counts
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        .take(args.top)
    {
        println!("[seqsum]   {} {}", kmer, count);
    }

    Ok(())
}

/// Process one unit: read its chunk, summarize, publish the partial.
fn run_unit(
    store: &dyn ObjectStore,
    batch: &str,
    index: usize,
    processor: &UnitProcessor,
) -> Result<(), SeqsumError> {
    let chunk = store
        .get(&chunk_key(batch, index))?
        .ok_or_else(|| SeqsumError::Store(format!("chunk {} missing for batch {}", index, batch)))?;
    let summary = processor.process(index, &chunk[..])?;
    store.put(&partial_key(batch, index), summary.to_json()?)
}
