//! Benchmarks for the per-cycle hot path
//!
//! Covers the work done once per relay cycle:
//! - Frame location in a noisy serial read
//! - GYK frame decoding
//! - Payload encoding, CRC and packet assembly
//!
//! Platform: Cross-platform (synthetic frames, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use trackside_relay::packet::{OutboundPacket, crc16};
use trackside_relay::protocol::{REFERENCE_FRAME, decode_frame, find_frame};
use trackside_relay::test_utils::GykFrameBuilder;
use trackside_relay::types::{CivilDateTime, DetectionChannel, DetectionFlagSet};

/// A 512-byte read with the frame near the end, as after line noise.
fn noisy_read() -> Vec<u8> {
    let frame = GykFrameBuilder::new()
        .timestamp(CivilDateTime { year: 2025, month: 8, day: 19, hour: 16, minute: 9, second: 20 })
        .speed(80)
        .kilometer_post_meters(123_456, false)
        .train_number(55172)
        .locomotive_number(1)
        .build();
    let mut buf = vec![0x10; 512 - frame.len()];
    buf.extend_from_slice(&frame);
    buf
}

fn bench_frame_scan(c: &mut Criterion) {
    let buf = noisy_read();
    let mut group = c.benchmark_group("frame_scan");
    group.throughput(Throughput::Bytes(buf.len() as u64));

    group.bench_function("find_frame_512", |b| b.iter(|| black_box(find_frame(black_box(&buf)))));

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    c.bench_function("decode_reference_frame", |b| {
        b.iter(|| black_box(decode_frame(black_box(&REFERENCE_FRAME))))
    });
}

fn bench_encode(c: &mut Criterion) {
    let telemetry = decode_frame(&REFERENCE_FRAME).expect("reference frame decodes");
    let flags = DetectionFlagSet::only(DetectionChannel::Camera1Thermal);

    let mut group = c.benchmark_group("packet_encoding");
    group.bench_function("assemble", |b| {
        b.iter(|| black_box(OutboundPacket::assemble(black_box(&telemetry), black_box(flags))))
    });

    let packet = OutboundPacket::assemble(&telemetry, flags);
    group.throughput(Throughput::Bytes(53));
    group.bench_function("crc16_53_bytes", |b| {
        b.iter(|| black_box(crc16(black_box(&packet.as_bytes()[..53]))))
    });
    group.finish();
}

criterion_group!(benches, bench_frame_scan, bench_decode, bench_encode);
criterion_main!(benches);
