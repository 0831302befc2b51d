use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use seqsum::summary::MergedTotals;
use seqsum::worker::UnitProcessor;

/// Deterministic pseudo-random base sequence with FASTA-style line breaks.
fn synthetic_sequence(bases: usize) -> Vec<u8> {
    let alphabet = [b'A', b'C', b'G', b'T'];
    let mut state: u64 = 0x9E3779B97F4A7C15;
    let mut out = Vec::with_capacity(bases + bases / 60 + 16);
    out.extend_from_slice(b">synthetic\n");
    for i in 0..bases {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        out.push(alphabet[(state >> 33) as usize % 4]);
        if i % 60 == 59 {
            out.push(b'\n');
        }
    }
    out
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("unit_process");
    for k in [3usize, 5, 9] {
        let input = synthetic_sequence(200_000);
        group.bench_with_input(BenchmarkId::new("k", k), &input, |b, input| {
            let processor = UnitProcessor::new(k);
            b.iter(|| processor.process(0, black_box(&input[..])).unwrap());
        });
    }
    group.finish();
}

fn bench_process_small_blocks(c: &mut Criterion) {
    let input = synthetic_sequence(200_000);
    c.bench_function("unit_process_4k_blocks", |b| {
        let processor = UnitProcessor::with_block_bytes(5, 4096);
        b.iter(|| processor.process(0, black_box(&input[..])).unwrap());
    });
}

fn bench_merge_fold(c: &mut Criterion) {
    let partials: Vec<_> = (0..16)
        .map(|i| {
            let input = synthetic_sequence(50_000);
            UnitProcessor::new(5).process(i, &input[..]).unwrap()
        })
        .collect();

    c.bench_function("merge_fold_16_partials", |b| {
        b.iter(|| {
            let mut totals = MergedTotals::identity();
            for p in black_box(&partials) {
                totals.absorb(p);
            }
            totals.into_final()
        });
    });
}

criterion_group!(benches, bench_process, bench_process_small_blocks, bench_merge_fold);
criterion_main!(benches);
