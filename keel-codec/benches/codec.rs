//! Encoding throughput per varint width and for byte strings.
//!
//! Run with: cargo bench -p keel-codec

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use keel_codec::{MAX_VARINT_LEN, Reader, Writer, pack_bytes, unpack_bytes, unpack_varint};

const COUNT: usize = 1024;

fn values(width: u32) -> Vec<i64> {
    // Near the top of the width so none fit a narrower form
    let max = (1i64 << (width - 1)) - 1;
    (0..COUNT as i64).map(|i| max - i % 32).collect()
}

// ============================================================================
// Varint
// ============================================================================

fn bench_varint(c: &mut Criterion) {
    let mut group = c.benchmark_group("varint");
    group.throughput(Throughput::Elements(COUNT as u64));

    for (name, width) in [("1B", 7), ("2B", 14), ("4B", 29), ("8B", 60), ("9B", 64)] {
        let input = if width == 64 {
            (0..COUNT as i64).map(|i| i64::MIN + i).collect()
        } else {
            values(width)
        };
        let mut buf = vec![0u8; COUNT * MAX_VARINT_LEN];

        group.bench_function(format!("pack/{name}"), |b| {
            b.iter(|| {
                let mut w = Writer::new(&mut buf);
                for &v in &input {
                    w.put_varint(black_box(v)).unwrap();
                }
                black_box(w.position())
            });
        });

        let mut w = Writer::new(&mut buf);
        for &v in &input {
            w.put_varint(v).unwrap();
        }
        let len = w.position();
        let encoded = &buf[..len];

        group.bench_function(format!("unpack/{name}"), |b| {
            b.iter(|| {
                let mut data = black_box(encoded);
                let mut sum = 0i64;
                while !data.is_empty() {
                    let (v, n) = unpack_varint(data).unwrap();
                    sum = sum.wrapping_add(v);
                    data = &data[n..];
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

// ============================================================================
// Byte strings
// ============================================================================

fn bench_bytes(c: &mut Criterion) {
    let mut group = c.benchmark_group("bytes");

    for size in [16usize, 200, 4096] {
        let payload = vec![0x5Au8; size];
        let mut buf = vec![0u8; size + MAX_VARINT_LEN];
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_function(format!("pack/{size}"), |b| {
            b.iter(|| black_box(pack_bytes(&mut buf, black_box(&payload)).unwrap()));
        });

        let n = pack_bytes(&mut buf, &payload).unwrap();
        group.bench_function(format!("unpack/{size}"), |b| {
            b.iter(|| {
                let mut r = Reader::new(black_box(&buf[..n]));
                black_box(r.get_bytes().unwrap().len())
            });
        });

        group.bench_function(format!("unpack_fn/{size}"), |b| {
            b.iter(|| black_box(unpack_bytes(black_box(&buf[..n])).unwrap().1));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_varint, bench_bytes);
criterion_main!(benches);
