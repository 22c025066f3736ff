//! Benchmarks for the per-iteration hot paths
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use labsweep::backend::{Attribute, AttributeRegistry, IoCoordinator, IoMode, SimulatedAttribute};
use labsweep::scripting::ScriptedInstrument;
use labsweep::session::{format_row, render_data_file, DataHeader};
use labsweep::stream::line_segments;
use labsweep::sweep::{GridEnumerator, SweepSpec};

fn linspace(n: usize) -> Vec<f64> {
    (0..n).map(|i| i as f64 / n as f64).collect()
}

fn bench_grid_enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_enumeration");

    for batch in [1, 100, 1000].iter() {
        group.throughput(Throughput::Elements(9000));
        group.bench_with_input(BenchmarkId::new("next_batch", batch), batch, |b, &batch| {
            b.iter(|| {
                let mut grid =
                    GridEnumerator::new(vec![linspace(3), linspace(3), linspace(1000)]);
                let mut rows = 0;
                while let Some(points) = grid.next_batch(batch) {
                    rows += points.len();
                }
                black_box(rows)
            });
        });
    }

    group.finish();
}

fn bench_line_segments(c: &mut Criterion) {
    c.bench_function("line_segments_1000_over_7", |b| {
        let mut streamed = 0usize;
        b.iter(|| {
            let segments = line_segments(black_box(streamed), 1000, 7);
            streamed = streamed.wrapping_add(1000);
            black_box(segments)
        });
    });
}

fn bench_data_file_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("data_file_render");

    for size in [1000, 10_000].iter() {
        let rows: Vec<Vec<f64>> = (0..*size)
            .map(|i| vec![i as f64, (i as f64).sin(), 1.0 / (i as f64 + 1.0), 2.71828])
            .collect();
        let header = DataHeader::new(
            vec![("p1".into(), "1".into()), ("completed".into(), "True".into())],
            vec!["x0".into(), "x1".into(), "y1".into(), "y2".into()],
        );

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("render", size), &rows, |b, rows| {
            b.iter(|| black_box(render_data_file(&header, Some(rows))));
        });
        group.bench_with_input(BenchmarkId::new("format_row", size), &rows, |b, rows| {
            b.iter(|| {
                for row in rows {
                    black_box(format_row(row));
                }
            });
        });
    }

    group.finish();
}

fn bench_coordinator_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("coordinator_round_trip");
    let batch: Vec<Vec<f64>> = (0..1000).map(|i| vec![1.0, i as f64]).collect();
    let spec = SweepSpec::new(
        vec!["x0".into(), "x1".into()],
        vec![vec![1.0], linspace(1000)],
        vec![true, false],
        1000,
    )
    .unwrap();
    let responses = vec!["x0_read".to_string(), "x1_read".to_string()];

    for mode in [IoMode::Inline, IoMode::Threaded] {
        let x0 = std::sync::Arc::new(SimulatedAttribute::recorder());
        let x1 = std::sync::Arc::new(SimulatedAttribute::recorder());
        let mut registry = AttributeRegistry::new();
        registry.register_shared("x0", x0.clone());
        registry.register_shared("x1", x1.clone());
        registry.register_shared("x0_read", x0);
        registry.register_shared("x1_read", x1);

        let mut io = IoCoordinator::new(mode, &spec, &responses, &registry, None).unwrap();
        group.bench_function(format!("{:?}", mode), |b| {
            b.iter(|| {
                io.set_variables(&batch).unwrap();
                black_box(io.get_responses(batch.len()).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_scripted_response(c: &mut Criterion) {
    let instrument = ScriptedInstrument::new();
    let mut registry = AttributeRegistry::new();
    instrument.register_variable(&mut registry, "x");
    instrument
        .register_response(&mut registry, "y", "x * 2.0 + noise(1.0)")
        .unwrap();
    let x = registry.get("x").unwrap();
    let y = registry.get("y").unwrap();
    x.set(&linspace(1000).into()).unwrap();

    c.bench_function("scripted_response_1000_rows", |b| {
        b.iter(|| black_box(y.get().unwrap()));
    });
}

criterion_group!(
    benches,
    bench_grid_enumeration,
    bench_line_segments,
    bench_data_file_render,
    bench_coordinator_round_trip,
    bench_scripted_response,
);

criterion_main!(benches);
