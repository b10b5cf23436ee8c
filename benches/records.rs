//! Row and stream benchmarks for sqlsnap
//!
//! Measures whole-snapshot serialization, cursor reads with and without
//! native materialization, and the cost of skipping unread rows when
//! advancing to the next result set.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::io::Cursor;

use sqlsnap::{MemorySource, ResultSetBuilder, Serializer, SnapshotReader, SqlValue, ValueKind};

fn orders(rows: usize) -> MemorySource {
    let mut builder = ResultSetBuilder::new()
        .column("OrderId", ValueKind::BigInt, false)
        .column("Customer", ValueKind::NVarChar, true)
        .column("Quantity", ValueKind::Int, false)
        .column("Total", ValueKind::Float, true)
        .column("Shipped", ValueKind::Bit, true);
    for i in 0..rows {
        let customer = if i % 10 == 0 {
            SqlValue::String(None)
        } else {
            SqlValue::from(format!("customer-{}", i % 97))
        };
        builder = builder.row(vec![
            SqlValue::from(i as i64),
            customer,
            SqlValue::from((i % 13) as i32),
            SqlValue::from(i as f64 * 0.25),
            SqlValue::from(i % 2 == 0),
        ]);
    }
    builder
        .result_set()
        .column("Count", ValueKind::Int, false)
        .row(vec![SqlValue::from(rows as i32)])
        .build()
        .unwrap()
}

fn snapshot(rows: usize) -> Vec<u8> {
    let mut out = Vec::new();
    Serializer::new().serialize(&mut orders(rows), &mut out).unwrap();
    out
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    for rows in [100usize, 10_000] {
        let source = orders(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("orders", rows), &source, |b, source| {
            let mut out = Vec::with_capacity(rows * 64);
            b.iter(|| {
                out.clear();
                let mut source = source.clone();
                let stats = Serializer::new().serialize(&mut source, &mut out).unwrap();
                black_box(stats)
            });
        });
    }

    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    for rows in [100usize, 10_000] {
        let bytes = snapshot(rows);
        group.throughput(Throughput::Elements(rows as u64));

        group.bench_with_input(BenchmarkId::new("provider", rows), &bytes, |b, bytes| {
            b.iter(|| {
                let mut reader = SnapshotReader::new(Cursor::new(black_box(bytes))).unwrap();
                let mut sum = 0i64;
                while reader.read().unwrap() {
                    sum += reader.get_int64(0).unwrap();
                }
                black_box(sum)
            });
        });

        group.bench_with_input(BenchmarkId::new("native", rows), &bytes, |b, bytes| {
            b.iter(|| {
                let mut reader = SnapshotReader::new(Cursor::new(black_box(bytes))).unwrap();
                let mut nulls = 0usize;
                while reader.read().unwrap() {
                    nulls += reader.values().unwrap().iter().filter(|v| v.is_null()).count();
                }
                black_box(nulls)
            });
        });

        group.bench_with_input(BenchmarkId::new("skip", rows), &bytes, |b, bytes| {
            b.iter(|| {
                let mut reader = SnapshotReader::new(Cursor::new(black_box(bytes))).unwrap();
                reader.next_result().unwrap();
                reader.read().unwrap();
                black_box(reader.get_int32(0).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_serialize, bench_read);
criterion_main!(benches);
