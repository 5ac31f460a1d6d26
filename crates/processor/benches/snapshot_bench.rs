//! Throughput benchmarks for snapshot aggregation, lifetime alteration and
//! signal windows

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use temporal_processor::aggregation::{CountAggregate, SumAggregate};
use temporal_processor::config::{PipeConfig, SignalWindowConfig};
use temporal_processor::lifetime::{AlterLifetimePipe, DurationSelector};
use temporal_processor::pipeline::{EventCollector, StreamObserver};
use temporal_processor::snapshot::{PartitionedSnapshotWindowPipe, SnapshotWindowPipe};
use temporal_processor::window::{SignalWindowOperator, WindowRecorder};
use temporal_types::{CompoundGroupKey, StreamEvent, StreamMessage};

const EVENTS: usize = 100_000;

/// Overlapping intervals over `keys` keys, one event per tick
fn interval_stream(keys: u32) -> Vec<StreamEvent<u32, i64>> {
    (0..EVENTS as i64)
        .map(|t| StreamEvent::interval(t, t + 50, (t as u32) % keys, t))
        .collect()
}

fn batches<K: std::hash::Hash + Clone, P: Clone>(
    events: &[StreamEvent<K, P>],
    batch_size: usize,
) -> Vec<StreamMessage<K, P>> {
    events
        .chunks(batch_size)
        .map(|chunk| StreamMessage::from_events(chunk).unwrap())
        .collect()
}

fn bench_snapshot_pipe(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_pipe");
    group.throughput(Throughput::Elements(EVENTS as u64));
    group.sample_size(20);

    for keys in [1u32, 100, 10_000] {
        let input = batches(&interval_stream(keys), 4096);
        group.bench_with_input(BenchmarkId::new("count", keys), &input, |b, input| {
            b.iter(|| {
                let mut pipe = SnapshotWindowPipe::new(
                    CountAggregate::<i64>::new(),
                    EventCollector::<u32, u64>::new().data_only(),
                    &PipeConfig::with_batch_size(4096),
                );
                for batch in input {
                    pipe.on_next(batch.clone()).unwrap();
                }
                pipe.on_completed().unwrap();
                black_box(pipe.stats().rows_out());
            });
        });
        group.bench_with_input(BenchmarkId::new("sum", keys), &input, |b, input| {
            b.iter(|| {
                let mut pipe = SnapshotWindowPipe::with_defaults(
                    SumAggregate::<i64>::new(),
                    EventCollector::<u32, f64>::new().data_only(),
                );
                for batch in input {
                    pipe.on_next(batch.clone()).unwrap();
                }
                pipe.on_completed().unwrap();
                black_box(pipe.stats().rows_out());
            });
        });
    }

    group.finish();
}

fn bench_partitioned_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("partitioned_snapshot");
    group.throughput(Throughput::Elements(EVENTS as u64));
    group.sample_size(20);

    type Key = CompoundGroupKey<u32, u32>;
    for partitions in [4u32, 64] {
        let mut events: Vec<StreamEvent<Key, i64>> = Vec::with_capacity(EVENTS + EVENTS / 1000);
        for t in 0..EVENTS as i64 {
            let partition = (t as u32) % partitions;
            // Each partition sees its own time, skewed behind the others
            let start = t - partition as i64 * 10;
            events.push(StreamEvent::interval(
                start,
                start + 20,
                CompoundGroupKey::new(partition, (t as u32) % 16),
                t,
            ));
            if t % 1000 == 999 {
                events.push(StreamEvent::low_watermark(t - partitions as i64 * 10));
            }
        }
        let input = batches(&events, 4096);

        group.bench_with_input(
            BenchmarkId::new("count", partitions),
            &input,
            |b, input| {
                b.iter(|| {
                    let mut pipe = PartitionedSnapshotWindowPipe::with_defaults(
                        CountAggregate::<i64>::new(),
                        EventCollector::<Key, u64>::new().data_only(),
                    );
                    for batch in input {
                        pipe.on_next(batch.clone()).unwrap();
                    }
                    pipe.on_completed().unwrap();
                    black_box(pipe.stats().partitions_collected);
                });
            },
        );
    }

    group.finish();
}

fn bench_tumbling_via_alter_lifetime(c: &mut Criterion) {
    let mut group = c.benchmark_group("alter_lifetime");
    group.throughput(Throughput::Elements(EVENTS as u64));
    group.sample_size(20);

    let events: Vec<StreamEvent<u32, i64>> = (0..EVENTS as i64)
        .map(|t| StreamEvent::start_edge(t, (t as u32) % 64, t))
        .collect();
    let input = batches(&events, 4096);

    group.bench_function("tumbling_count_1000", |b| {
        b.iter(|| {
            let snapshot = SnapshotWindowPipe::with_defaults(
                CountAggregate::<i64>::new(),
                EventCollector::<u32, u64>::new().data_only(),
            );
            let mut pipe = AlterLifetimePipe::new(
                Some(Arc::new(|t: i64| t - t.rem_euclid(1000))),
                DurationSelector::constant(1000),
                snapshot,
            );
            for batch in &input {
                pipe.on_next(batch.clone()).unwrap();
            }
            pipe.on_completed().unwrap();
            black_box(pipe.observer().stats().rows_out());
        });
    });

    group.finish();
}

fn bench_signal_windows(c: &mut Criterion) {
    let mut group = c.benchmark_group("signal_window");
    group.throughput(Throughput::Elements(EVENTS as u64));

    let configs = [
        ("tumbling", SignalWindowConfig::tumbling(1, 64)),
        ("hopping", SignalWindowConfig::hopping(1, 64, 8)),
        ("padded_hopping", SignalWindowConfig::hopping(1, 64, 8).with_padding(true)),
    ];
    for (name, config) in configs {
        group.bench_with_input(BenchmarkId::new("operator", name), &config, |b, config| {
            b.iter(|| {
                let recorder = WindowRecorder::<f64>::new();
                let mut op =
                    SignalWindowOperator::new(config.clone(), Box::new(recorder.clone())).unwrap();
                for t in 0..EVENTS as i64 {
                    // Drop every hundredth sample to exercise gap handling
                    if t % 100 != 99 {
                        op.on_sample(t, t as f64).unwrap();
                    }
                }
                black_box(recorder.take().len());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_snapshot_pipe,
    bench_partitioned_snapshot,
    bench_tumbling_via_alter_lifetime,
    bench_signal_windows
);
criterion_main!(benches);
