//! Benchmarks for the frame decoder
//!
//! Covers each classification path a device message can take:
//! - `T:` telemetry lines
//! - `name=value` status lines
//! - binary frames with hex and base64 previews
//!
//! Platform: Cross-platform, no network

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use telemlink::decoder;
use telemlink::types::Frame;

fn bench_telemetry_lines(c: &mut Criterion) {
    let frame = Frame::text("T:-0.01,0.36,6.02,2.00,2.00");

    let mut group = c.benchmark_group("decode_telemetry");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("five_fields", |b| b.iter(|| black_box(decoder::decode(black_box(&frame)))));

    let short = Frame::text("t: 1.5 , 2.5 , 3.5");
    group.bench_function("three_fields_padded", |b| b.iter(|| black_box(decoder::decode(black_box(&short)))));
    group.finish();
}

fn bench_key_values(c: &mut Criterion) {
    let frame = Frame::text("status=OK sensor=IMU seq=120 uptime_ms=12000 temp = 41.5 status=WARN");

    let mut group = c.benchmark_group("decode_key_values");
    group.throughput(Throughput::Bytes(frame.len() as u64));
    group.bench_function("status_line", |b| b.iter(|| black_box(decoder::decode(black_box(&frame)))));

    let plain = Frame::text("Boot complete, waiting for host");
    group.bench_function("raw_text", |b| b.iter(|| black_box(decoder::decode(black_box(&plain)))));
    group.finish();
}

fn bench_binary_preview(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_binary");
    for size in [16usize, 128, 4096] {
        let frame = Frame::binary((0..size).map(|i| (i % 251) as u8).collect());
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("{size}_bytes"), |b| {
            b.iter(|| black_box(decoder::decode(black_box(&frame))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_telemetry_lines, bench_key_values, bench_binary_preview);
criterion_main!(benches);
