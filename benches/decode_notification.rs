/// Benchmarks for the notification hot path: decoding one inbound frame and fanning the
/// result out to subscribers.
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use docstream::notifications::{NotificationMessage, decode};
use docstream::ws::{Listener, ListenerRegistry};

const FRAME: &str = r#"{"Timestamp":"2023-01-01T00:00:00Z","UserID":"user1","UserName":"User One","DocumentID":"doc1","DocumentTitle":"Document One"}"#;

const FRAME_WITH_EXTRA_FIELD: &str = r#"{"Timestamp":"2023-01-01T00:00:00Z","UserID":"user1","UserName":"User One","DocumentID":"doc1","DocumentTitle":"Document One","Revision":7}"#;

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("notifications/decode");

    group.throughput(Throughput::Bytes(FRAME.len() as u64));
    group.bench_function("valid", |b| {
        b.iter(|| {
            decode(std::hint::black_box(FRAME)).expect("Decoding should succeed");
        });
    });

    group.throughput(Throughput::Bytes(FRAME_WITH_EXTRA_FIELD.len() as u64));
    group.bench_function("unknown_field", |b| {
        b.iter(|| {
            decode(std::hint::black_box(FRAME_WITH_EXTRA_FIELD)).expect("Decoding should succeed");
        });
    });

    group.bench_function("malformed", |b| {
        b.iter(|| {
            decode(std::hint::black_box("not json")).expect_err("Decoding should fail");
        });
    });

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("notifications/dispatch");
    let message = decode(FRAME).expect("Decoding should succeed");

    for listeners in [1_usize, 8, 64] {
        let registry = ListenerRegistry::<NotificationMessage>::new();
        for _ in 0..listeners {
            registry.add(Listener::infallible(|message: &NotificationMessage| {
                std::hint::black_box(message.document_id.len());
            }));
        }

        group.bench_with_input(BenchmarkId::from_parameter(listeners), &registry, |b, registry| {
            b.iter(|| registry.dispatch(std::hint::black_box(&message)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_decode, bench_dispatch);
criterion_main!(benches);
