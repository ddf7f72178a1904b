//! Codec benchmarks
//!
//! Run with: `cargo bench --bench codec_bench -p courier-common --features
//! runtime`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use courier_common::codec::{
    Codec, CodecChain, CompressionAlgorithm, CompressionCodec, EncryptionCodec,
};

fn payload(size: usize) -> Vec<u8> {
    br#"{"id":1,"title":"homework","done":false},"#.iter().copied().cycle().take(size).collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_encode");
    let key = EncryptionCodec::generate_key();
    let Ok(encryption) = EncryptionCodec::new(&key) else {
        return;
    };
    let chain = CodecChain::new()
        .with(CompressionCodec::new(CompressionAlgorithm::Gzip, 6))
        .with(encryption);

    for size in [1_024usize, 16_384, 131_072] {
        let data = payload(size);
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("gzip+aes", size), &data, |b, data| {
            b.iter(|| chain.encode(black_box(data)));
        });
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_decode");
    let chain = CodecChain::new().with(CompressionCodec::new(CompressionAlgorithm::Zlib, 6));

    for size in [1_024usize, 131_072] {
        let Ok(stored) = chain.encode(&payload(size)) else {
            continue;
        };
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("zlib", size), &stored, |b, stored| {
            b.iter(|| chain.decode(black_box(stored)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
