//! Wire encoding benchmarks for sqlsnap
//!
//! These benchmarks measure the varint codec, which carries every length,
//! count and integer column, and the per-kind value codecs that dominate row
//! encoding cost.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use chrono::NaiveDate;
use sqlsnap::encoding::varint::{decode_varint, encode_varint};
use sqlsnap::{SqlString, SqlValue, TypeDescriptor, ValueKind};

fn bench_varint_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint_encode");

    let test_values: Vec<(u64, &str)> = vec![
        (0, "zero"),
        (127, "1_byte_max"),
        (16383, "2_byte_max"),
        (2097151, "3_byte_max"),
        (268435455, "4_byte_max"),
        (u64::MAX, "max_u64"),
    ];

    for (value, name) in test_values {
        group.bench_with_input(BenchmarkId::new("encode", name), &value, |b, &value| {
            let mut buf = [0u8; 10];
            b.iter(|| {
                let len = encode_varint(black_box(value), &mut buf);
                black_box(len)
            });
        });
    }

    group.finish();
}

fn bench_varint_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint_decode");

    let test_values: Vec<(u64, &str)> = vec![
        (0, "zero"),
        (127, "1_byte_max"),
        (16383, "2_byte_max"),
        (268435455, "4_byte_max"),
        (u64::MAX, "max_u64"),
    ];

    for (value, name) in test_values {
        let mut buf = [0u8; 10];
        let len = encode_varint(value, &mut buf);

        group.bench_with_input(BenchmarkId::new("decode", name), &buf[..len], |b, data| {
            b.iter(|| {
                let result = decode_varint(black_box(data));
                black_box(result)
            });
        });
    }

    group.finish();
}

fn sample_values() -> Vec<(ValueKind, SqlValue, &'static str)> {
    let moment = NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(12, 30, 0))
        .unwrap();
    vec![
        (ValueKind::Int, SqlValue::from(12345678), "int"),
        (ValueKind::BigInt, SqlValue::from(-9_876_543_210i64), "bigint"),
        (ValueKind::Float, SqlValue::from(std::f64::consts::PI), "float"),
        (ValueKind::DateTime2, SqlValue::from(moment), "datetime2"),
        (
            ValueKind::NVarChar,
            SqlValue::from("The quick brown fox jumps over the lazy dog"),
            "nvarchar_43",
        ),
        (
            ValueKind::VarChar,
            SqlValue::from(SqlString::new("The quick brown fox jumps over the lazy dog")),
            "varchar_43",
        ),
        (ValueKind::VarBinary, SqlValue::from(vec![0xA5u8; 256]), "varbinary_256"),
    ]
}

fn bench_value_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_serialize");

    for (kind, value, name) in sample_values() {
        let desc = TypeDescriptor::get(kind);
        group.bench_with_input(BenchmarkId::new("serialize", name), &value, |b, value| {
            let mut buf = Vec::with_capacity(512);
            b.iter(|| {
                buf.clear();
                (desc.serialize)(black_box(value), &mut buf).unwrap();
                black_box(buf.len())
            });
        });
    }

    group.finish();
}

fn bench_value_deserialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("value_deserialize");

    for (kind, value, name) in sample_values() {
        let desc = TypeDescriptor::get(kind);
        let mut buf = Vec::new();
        (desc.serialize)(&value, &mut buf).unwrap();

        group.bench_with_input(BenchmarkId::new("provider", name), &buf, |b, data| {
            b.iter(|| {
                let mut offset = 0;
                black_box((desc.read_provider)(black_box(data), &mut offset).unwrap())
            });
        });
        group.bench_with_input(BenchmarkId::new("native", name), &buf, |b, data| {
            b.iter(|| {
                let mut offset = 0;
                black_box((desc.read_native)(black_box(data), &mut offset).unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_varint_encode,
    bench_varint_decode,
    bench_value_serialize,
    bench_value_deserialize,
);
criterion_main!(benches);
