use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use imu_rs::frame::{decode, encode};
use imu_rs::transport::Channel;
use imu_rs::unpacker::Unpacker;
use std::time::Duration;

const TARGET_FRAME_DECODE_MS: f64 = 1.0;

fn benchmark_frame_roundtrip(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_roundtrip");
    group.measurement_time(Duration::from_secs(10));
    group.warm_up_time(Duration::from_secs(3));

    let empty = encode(0x0001, &[]);
    group.bench_function("encode_empty_payload", |b| {
        b.iter(|| encode(black_box(0x0001), black_box(&[])))
    });
    group.bench_function("decode_empty_payload", |b| {
        b.iter(|| {
            let _ = decode(black_box(&empty));
        })
    });

    let max_payload = vec![0xAAu8; 236];
    let max_frame = encode(0x1000, &max_payload);
    group.bench_function("encode_max_payload", |b| {
        b.iter(|| encode(black_box(0x1000), black_box(&max_payload)))
    });
    group.bench_function("decode_max_payload", |b| {
        b.iter(|| {
            let _ = decode(black_box(&max_frame));
        })
    });

    group.finish();
}

fn benchmark_unpacker_resync(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpacker_resync");

    let clean_stream: Vec<u8> = (0..10)
        .flat_map(|i| encode(0x0A01, &[0, i as u8]))
        .collect();
    group.bench_function("feed_ten_clean_frames", |b| {
        b.iter(|| {
            let mut unpacker = Unpacker::new(Channel::SendBuffer);
            let _ = unpacker.feed(black_box(&clean_stream));
        })
    });

    let mut noisy_stream = vec![0xFFu8; 50];
    noisy_stream.extend(encode(0x0A01, &[0, 42]));
    noisy_stream.extend(vec![0x00u8; 30]);
    noisy_stream.extend(encode(0x0A01, &[0, 43]));
    group.bench_function("feed_frames_with_leading_garbage", |b| {
        b.iter(|| {
            let mut unpacker = Unpacker::new(Channel::SendBuffer);
            let _ = unpacker.feed(black_box(&noisy_stream));
        })
    });

    group.finish();
}

fn check_performance_targets(c: &mut Criterion) {
    let mut group = c.benchmark_group("performance_targets");
    group.significance_level(0.05);

    let max_payload = vec![0xAAu8; 236];
    let max_frame = encode(0x1000, &max_payload);
    group.bench_with_input(
        BenchmarkId::new("frame_decode_under_1ms", "max_payload"),
        &max_frame,
        |b, frame| {
            b.iter(|| {
                let _ = decode(black_box(frame));
            });
        },
    );
    let _ = TARGET_FRAME_DECODE_MS;

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(200).noise_threshold(0.05);
    targets = benchmark_frame_roundtrip, benchmark_unpacker_resync, check_performance_targets
}
criterion_main!(benches);
