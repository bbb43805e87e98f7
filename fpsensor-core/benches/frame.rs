use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fpsensor_core::{Frame, PacketType, ReplyCollector, ReplyShape};
use std::time::Duration;

fn bench_encode(c: &mut Criterion) {
    let frame = Frame::command(0xFFFF_FFFF, vec![0x1B, 0x01, 0x00, 0x00, 0x00, 0xA3]).unwrap();

    c.bench_function("encode_fast_search", |b| b.iter(|| black_box(&frame).encode()));
}

fn bench_decode(c: &mut Criterion) {
    let raw = Frame::new(0xFFFF_FFFF, PacketType::Data, vec![0xAB; 128])
        .unwrap()
        .encode();

    c.bench_function("decode_data_128", |b| b.iter(|| Frame::parse(black_box(&raw))));
}

fn bench_collect(c: &mut Criterion) {
    let raw = Frame::new(0xFFFF_FFFF, PacketType::Ack, vec![0x00, 0x00, 0x05, 0x00, 0x40])
        .unwrap()
        .encode();

    c.bench_function("collect_split_ack", |b| {
        b.iter(|| {
            let mut collector = ReplyCollector::new();
            collector
                .begin(ReplyShape::Ack { extra: 4 }, Duration::from_millis(500))
                .unwrap();
            collector.push(&raw[..5]);
            collector.push(&raw[5..])
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_collect);
criterion_main!(benches);
