//! # Pipeline Benchmarks
//!
//! Hot paths of the ingest node:
//!
//! - Canonical encoding of a reading
//! - HMAC tag verification
//! - Full pipeline: verify and append over in-memory adapters
//!
//! Run with `cargo bench -p tl-tests`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Map, Value};
use shared_types::{attach_tag, verify_tag, CanonicalEncoder, TAG_FIELD};
use tl_tests::fixtures::{cafeteria, signed, Harness, SECRET};

fn reading(seq: u64) -> Map<String, Value> {
    match json!({
        "temperature": 21.95,
        "humidity": 40.04,
        "localTemp": 23.12,
        "localHum": 38.7,
        "loraStatus": true,
        "dhtStatus": true,
        "timeSynced": true,
        "seq": seq,
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn bench_canonical_encoding(c: &mut Criterion) {
    let encoder = CanonicalEncoder::telemetry();
    let object = reading(42);

    c.bench_function("canonical_encode_reading", |b| {
        b.iter(|| encoder.encode_object(black_box(&object)).unwrap())
    });
}

fn bench_tag_verification(c: &mut Criterion) {
    let encoder = CanonicalEncoder::telemetry();
    let signed = attach_tag(&encoder, SECRET, reading(42)).unwrap();
    let tag = signed[TAG_FIELD].as_str().unwrap().to_string();

    c.bench_function("hmac_verify_reading", |b| {
        b.iter(|| verify_tag(&encoder, SECRET, black_box(&signed), black_box(&tag)).unwrap())
    });
}

fn bench_pipeline_append(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("pipeline_append");

    for batch in [1u64, 16, 128] {
        group.throughput(Throughput::Elements(batch));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            b.iter_batched(
                || {
                    let payloads: Vec<Vec<u8>> = (0..batch).map(|seq| signed(Value::Object(reading(seq)))).collect();
                    (runtime.block_on(Harness::new()), payloads)
                },
                |(node, payloads)| {
                    runtime.block_on(async {
                        for payload in &payloads {
                            node.submit(&cafeteria(), payload).await.unwrap();
                        }
                        node.ledger.shutdown().await;
                    })
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_canonical_encoding,
    bench_tag_verification,
    bench_pipeline_append
);
criterion_main!(benches);
