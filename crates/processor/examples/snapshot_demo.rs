//! Tumbling and snapshot counts over a small click stream
//!
//! This example demonstrates:
//! - Loading pipe settings from JSON
//! - Generating low watermarks from out-of-order partition input
//! - Turning a snapshot count into a tumbling window count with AlterLifetime
//! - Driving the pipes from the async batch executor
//!
//! Run with: cargo run --package temporal-processor --example snapshot_demo

use anyhow::Result;
use std::sync::Arc;
use temporal_processor::aggregation::CountAggregate;
use temporal_processor::config::ProcessorConfig;
use temporal_processor::lifetime::{DurationSelector, PartitionedAlterLifetimePipe};
use temporal_processor::pipeline::{BatchExecutor, EventCollector};
use temporal_processor::snapshot::PartitionedSnapshotWindowPipe;
use temporal_processor::watermark::{BoundedOutOfOrdernessWatermark, WatermarkGenerator};
use temporal_types::{CompoundGroupKey, EventKind, StreamEvent};
use tracing::{info, Level};

type Key = CompoundGroupKey<u32, &'static str>;

const WINDOW: i64 = 1_000;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = ProcessorConfig::from_json_str(r#"{ "pipe": { "batch_size": 8 } }"#)?;
    info!(batch_size = config.pipe.batch_size, "Loaded configuration");

    // (region, page, click time in ms)
    let clicks: [(u32, &'static str, i64); 10] = [
        (0, "home", 120),
        (1, "home", 300),
        (0, "cart", 450),
        (0, "home", 980),
        (1, "cart", 1_250),
        (0, "home", 1_400),
        (1, "home", 1_990),
        (0, "cart", 2_100),
        (1, "home", 2_400),
        (0, "home", 3_050),
    ];

    // One watermark generator for all regions; it only advances once every
    // region has moved past a point
    let mut watermarks = BoundedOutOfOrdernessWatermark::new(200);
    let mut events: Vec<StreamEvent<Key, ()>> = Vec::new();
    for (region, page, time) in clicks {
        events.push(StreamEvent::start_edge(time, CompoundGroupKey::new(region, page), ()));
        if let Some(watermark) = watermarks.on_event(time, region) {
            info!(%watermark, "Watermark advanced");
            events.push(watermark.to_low_watermark());
        }
    }
    events.push(StreamEvent::low_watermark(10 * WINDOW));

    let snapshot = PartitionedSnapshotWindowPipe::new(
        CountAggregate::<()>::new(),
        EventCollector::<Key, u64>::new().data_only(),
        &config.pipe,
    );
    let tumbling = PartitionedAlterLifetimePipe::new(
        Some(Arc::new(|t: i64| t - t.rem_euclid(WINDOW))),
        DurationSelector::constant(WINDOW),
        snapshot,
    );

    let (ingress, executor) = BatchExecutor::channel(tumbling, 4, config.pipe.batch_size);
    let handle = tokio::spawn(executor.run());
    ingress.ingest_events(&events).await?;
    drop(ingress);

    let (tumbling, stats) = handle.await??;
    info!(
        batches = stats.batches_processed,
        rows = stats.rows_processed,
        "Executor finished"
    );

    println!("=== Clicks per region and page, {} ms windows ===", WINDOW);
    for event in tumbling.observer().observer().events() {
        // Each end edge closes one window's count
        if event.kind() == EventKind::EndEdge {
            println!(
                "  region {} {:<5} [{:>5}, {:>5})  {} clicks",
                event.key.partition,
                event.key.group,
                event.other_time,
                event.sync_time,
                event.payload
            );
        }
    }

    let snapshot = tumbling.observer();
    info!(
        partitions = snapshot.partition_count(),
        collected = snapshot.stats().partitions_collected,
        held_keys = snapshot.held_keys(),
        "Snapshot pipe state"
    );
    Ok(())
}
