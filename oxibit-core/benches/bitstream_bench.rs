//! Performance benchmarks for the bit stream engine
//!
//! This benchmark suite evaluates:
//! - Write and read throughput across field widths
//! - Values that straddle cache words (widths above 32 bits)
//! - Bulk byte transfer versus packed per-element transfer

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use oxibit_core::{BitStream, ReadOnly};
use std::hint::black_box;
use std::io::Cursor;

/// Number of fields per iteration
const FIELDS: usize = 16 * 1024;

/// Reproducible pseudo-random values masked to `bits`
fn values(bits: u32) -> Vec<u64> {
    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    let mut seed: u64 = 0x1234_5678_9ABC_DEF0;
    (0..FIELDS)
        .map(|_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            seed & mask
        })
        .collect()
}

fn encode(values: &[u64], bits: u32) -> Vec<u8> {
    let mut stream = BitStream::writer(Cursor::new(Vec::with_capacity(
        values.len() * bits as usize / 8 + 8,
    )))
    .unwrap();
    for &v in values {
        stream.write_bits(v, bits).unwrap();
    }
    stream.into_inner().unwrap().into_inner()
}

/// Benchmark writing fields of various widths
fn bench_write_widths(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_widths");

    for bits in [1u32, 7, 13, 32, 45, 64] {
        let data = values(bits);

        group.throughput(Throughput::Bytes((FIELDS * bits as usize / 8) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(bits), &data, |b, data| {
            b.iter(|| black_box(encode(black_box(data), bits)));
        });
    }

    group.finish();
}

/// Benchmark reading fields of various widths
fn bench_read_widths(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_widths");

    for bits in [1u32, 7, 13, 32, 45, 64] {
        let encoded = encode(&values(bits), bits);

        group.throughput(Throughput::Bytes(encoded.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(bits), &encoded, |b, encoded| {
            b.iter(|| {
                let base = ReadOnly::new(Cursor::new(encoded.as_slice()));
                let mut stream = BitStream::reader(base).unwrap();
                let mut sum = 0u64;
                for _ in 0..FIELDS {
                    sum = sum.wrapping_add(stream.read_bits(bits, false).unwrap());
                }
                black_box(sum);
            });
        });
    }

    group.finish();
}

/// Benchmark byte arrays: bulk path at a byte boundary, per-element path
/// off it, and 5-bit packing
fn bench_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("bytes");
    let payload: Vec<u8> = (0..64 * 1024).map(|i| (i % 32) as u8).collect();
    group.throughput(Throughput::Bytes(payload.len() as u64));

    let cases: [(&str, u32, u32); 3] = [("aligned", 0, 8), ("unaligned", 3, 8), ("packed5", 0, 5)];
    for (name, lead, bits) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), &payload, |b, payload| {
            b.iter(|| {
                let mut stream =
                    BitStream::writer(Cursor::new(Vec::with_capacity(payload.len() + 8))).unwrap();
                if lead > 0 {
                    stream.write_word(0, lead).unwrap();
                }
                stream.write_bytes_packed(black_box(payload), bits).unwrap();
                black_box(stream.into_inner().unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_write_widths, bench_read_widths, bench_bytes);
criterion_main!(benches);
