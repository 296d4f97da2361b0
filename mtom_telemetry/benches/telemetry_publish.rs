//! Telemetry cell publish/snapshot performance benchmarks

use criterion::{Criterion, criterion_group, criterion_main};
use mtom_common::ProcessStatus;
use mtom_telemetry::TelemetrySegment;
use std::hint::black_box;

fn bench_publish_step(c: &mut Criterion) {
    let segment = TelemetrySegment::create("bench_publish", 8).unwrap();
    let cell = segment.cell(0);

    c.bench_function("publish_step", |b| {
        b.iter(|| {
            black_box(cell.publish_step(1.0, 2.0, 3.0, 4.0, 5.0, 6.0));
        });
    });

    std::fs::remove_file(segment.path()).ok();
}

fn bench_snapshot(c: &mut Criterion) {
    let segment = TelemetrySegment::create("bench_snapshot", 8).unwrap();
    let cell = segment.cell(0);
    cell.publish_status(ProcessStatus::ExecutingQprop);
    cell.publish_step(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);

    c.bench_function("snapshot", |b| {
        b.iter(|| {
            black_box(cell.snapshot());
        });
    });

    std::fs::remove_file(segment.path()).ok();
}

fn bench_snapshot_all(c: &mut Criterion) {
    let segment = TelemetrySegment::create("bench_snapshot_all", 16).unwrap();
    for i in 0..16 {
        segment.cell(i).publish_step(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
    }
    let reader = mtom_telemetry::WtcReader::new(segment);

    c.bench_function("snapshot_all_16_cells", |b| {
        b.iter(|| {
            black_box(reader.snapshot_all());
        });
    });

    std::fs::remove_file(reader.path()).ok();
}

criterion_group!(benches, bench_publish_step, bench_snapshot, bench_snapshot_all);
criterion_main!(benches);
