use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use slogrun_core::{ClassifierConfig, MemorySink, RunTracker};
use slogrun_synth::generator::generate_slog;

fn bench_track(c: &mut Criterion) {
    let mut group = c.benchmark_group("track");
    for &blocks in &[100u32, 1_000] {
        let slog = generate_slog(blocks, 42);
        let bytes: usize = slog.lines.iter().map(|l| l.len() + 1).sum();
        group.throughput(Throughput::Bytes(bytes as u64));
        group.bench_with_input(BenchmarkId::from_parameter(blocks), &slog.lines, |b, lines| {
            b.iter(|| {
                let mut t = RunTracker::new(ClassifierConfig::default(), Vec::<String>::new(), MemorySink::default());
                let mut n = 0usize;
                for line in lines {
                    if t.ingest(black_box(line)).ok().flatten().is_some() {
                        n += 1;
                    }
                }
                black_box(n)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_track);
criterion_main!(benches);
