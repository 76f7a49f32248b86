use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use ncnet_core::{
    FeedConfig, FeedTargetConfig, GridSize, NetworkAssembler, NetworkConfig, SingleProcess,
};

fn bench_config(side: u32) -> NetworkConfig {
    let target = FeedTargetConfig {
        ampa: 0.01,
        sigma: 2.0,
        ..Default::default()
    };
    NetworkConfig {
        tstop: 170.0,
        grid: GridSize { x: side, y: side },
        feeds: vec![FeedConfig {
            name: "evprox1".into(),
            kind: "evoked".into(),
            mean: 26.0,
            numspikes: 2,
            lamtha: 3.0,
            targets: ncnet_core::CellType::ALL
                .iter()
                .map(|&t| (t, target.clone()))
                .collect(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn bench_assemble(c: &mut Criterion) {
    let mut group = c.benchmark_group("ncnet_assemble");

    // Keep grids small so benches stay fast in CI
    for &side in &[4u32, 8u32, 10u32] {
        let config = bench_config(side);
        group.throughput(Throughput::Elements(u64::from(side * side)));
        group.bench_with_input(BenchmarkId::new("full", side), &side, |b, _| {
            b.iter_batched(
                || NetworkAssembler::new(config.clone(), SingleProcess).unwrap(),
                |mut assembler| {
                    assembler.assemble().unwrap();
                    assembler
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_reseed(c: &mut Criterion) {
    let mut group = c.benchmark_group("ncnet_reseed");
    let mut assembler = NetworkAssembler::new(bench_config(10), SingleProcess).unwrap();
    assembler.assemble().unwrap();

    let mut trial = 0u32;
    group.bench_function("evoked_10x10", |b| {
        b.iter(|| {
            trial += 1;
            assembler.reseed_for_trial(trial).unwrap();
            assembler.finalize().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_assemble, bench_reseed);
criterion_main!(benches);
