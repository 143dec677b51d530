//! Command and event throughput over the in-memory transport.
//!
//! Measures the engine alone, with no network in the path:
//! - Single command round-trip
//! - Concurrent commands in flight: 10, 100
//! - Event fan-out to 1 and 16 subscribers
//!
//! Run with: cargo bench --bench roundtrip
//! Results saved to: target/criterion/

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use devtools_mux::{ChannelTransport, Connection, RemoteEnd};
use futures_util::future::join_all;
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::sync::Mutex;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const IN_FLIGHT: &[usize] = &[10, 100];
const SUBSCRIBERS: &[usize] = &[1, 16];

// ============================================================================
// Helpers
// ============================================================================

/// Answers every command with an empty result.
async fn respond_forever(mut remote: RemoteEnd) {
    while let Some(frame) = remote.recv_json().await {
        remote.push_json(&json!({"id": frame["id"], "result": {}}));
    }
}

fn echo_connection(rt: &Runtime) -> Connection {
    rt.block_on(async {
        let (transport, remote) = ChannelTransport::pair();
        tokio::spawn(respond_forever(remote));
        Connection::with_transport(transport)
    })
}

// ============================================================================
// Benchmark: Commands
// ============================================================================

fn bench_roundtrip(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let connection = echo_connection(&rt);
    let root = connection.root();

    c.bench_function("command_roundtrip", |b| {
        b.to_async(&rt).iter(|| async {
            connection
                .send("Bench.ping", json!({}), &root)
                .await
                .expect("response")
        });
    });

    rt.block_on(connection.close());
}

fn bench_in_flight(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let connection = echo_connection(&rt);
    let root = connection.root();

    let mut group = c.benchmark_group("commands_in_flight");
    for &count in IN_FLIGHT {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.to_async(&rt).iter(|| async {
                let calls = (0..count).map(|_| connection.send("Bench.ping", json!({}), &root));
                for result in join_all(calls).await {
                    result.expect("response");
                }
            });
        });
    }
    group.finish();

    rt.block_on(connection.close());
}

// ============================================================================
// Benchmark: Events
// ============================================================================

fn bench_fanout(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");

    let mut group = c.benchmark_group("event_fanout");
    for &count in SUBSCRIBERS {
        let (connection, remote) = rt.block_on(async {
            let (transport, remote) = ChannelTransport::pair();
            (Connection::with_transport(transport), remote)
        });
        let root = connection.root();
        let subscriptions: Vec<_> = (0..count)
            .map(|_| connection.subscribe(&root, "Bench.*").expect("subscribe"))
            .collect();
        let subscriptions = Mutex::new(subscriptions);
        let event = json!({"method": "Bench.tick", "params": {"n": 1}});

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.to_async(&rt).iter(|| async {
                remote.push_json(&event);
                let mut subscriptions = subscriptions.lock().await;
                for subscription in subscriptions.iter_mut() {
                    subscription.recv().await.expect("event");
                }
            });
        });

        drop(subscriptions);
        rt.block_on(connection.close());
    }
    group.finish();
}

criterion_group!(benches, bench_roundtrip, bench_in_flight, bench_fanout);
criterion_main!(benches);
