//! Hashgraph consensus benchmarks.
//!
//! Measures:
//! - Event insertion throughput, including the rounds it decides
//! - Participant counts: 4, 16, 32
//! - Restart from a snapshot followed by a full replay
//! - Sorting a round's events into consensus order

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use solana_hash::Hash;
use solana_signature::Signature;
use trv1_bench::helpers::{make_gossip_history, make_weight_table, make_weighted_table};
use trv1_consensus_hashgraph::{
    ordering::{compare_consensus_order, whitening, OrderKey},
    ConsensusConfig, ConsensusEngine, GossipEvent, WeightTable,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn run_engine(config: &ConsensusConfig, weights: &WeightTable, events: &[GossipEvent]) -> ConsensusEngine {
    let mut engine = ConsensusEngine::new(config.clone(), weights.clone())
        .expect("valid engine parameters");
    for event in events {
        engine.add_event(event.clone()).expect("event accepted");
    }
    engine
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_add_event_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/add_event");
    group.sample_size(20);

    for &n_participants in &[4usize, 16, 32] {
        let (weights, keypairs) = make_weight_table(n_participants);
        let events = make_gossip_history(&keypairs, 1_000, 4, 7);
        let config = ConsensusConfig::default();

        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("participants", n_participants),
            &events,
            |b, events| {
                b.iter(|| run_engine(&config, &weights, events));
            },
        );
    }
    group.finish();
}

fn bench_weighted_add_event(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/add_event_weighted");
    group.sample_size(20);

    for &n_participants in &[4usize, 16] {
        let (weights, keypairs) = make_weighted_table(n_participants);
        let events = make_gossip_history(&keypairs, 1_000, 4, 11);
        let config = ConsensusConfig::default();

        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("participants", n_participants),
            &events,
            |b, events| {
                b.iter(|| run_engine(&config, &weights, events));
            },
        );
    }
    group.finish();
}

fn bench_pruned_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/pruned_window");
    group.sample_size(10);

    let (weights, keypairs) = make_weight_table(8);
    let events = make_gossip_history(&keypairs, 4_000, 2, 3);
    let config = ConsensusConfig {
        rounds_non_ancient: 4,
        rounds_expired: 8,
        ..ConsensusConfig::default()
    };

    group.throughput(Throughput::Elements(events.len() as u64));
    group.bench_function("participants/8", |b| {
        b.iter(|| run_engine(&config, &weights, &events));
    });
    group.finish();
}

fn bench_restart_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/restart_replay");
    group.sample_size(20);

    for &n_participants in &[4usize, 16] {
        let (weights, keypairs) = make_weight_table(n_participants);
        let events = make_gossip_history(&keypairs, 1_000, 2, 5);
        let config = ConsensusConfig::default();

        // Take the snapshot of a round halfway through the history.
        let mut engine = ConsensusEngine::new(config.clone(), weights.clone())
            .expect("valid engine parameters");
        let mut snapshots = Vec::new();
        for event in &events {
            for round in engine.add_event(event.clone()).expect("event accepted") {
                snapshots.push(round.snapshot);
            }
        }
        let Some(snapshot) = snapshots.get(snapshots.len() / 2).cloned() else {
            continue;
        };

        group.throughput(Throughput::Elements(events.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("participants", n_participants),
            &events,
            |b, events| {
                b.iter(|| {
                    let mut engine = ConsensusEngine::new(config.clone(), weights.clone())
                        .expect("valid engine parameters");
                    engine.load_snapshot(&snapshot).expect("valid snapshot");
                    for event in events {
                        engine.add_event(event.clone()).expect("event accepted");
                    }
                    engine
                });
            },
        );
    }
    group.finish();
}

fn bench_consensus_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordering/consensus_sort");

    for &n_events in &[100usize, 1_000, 10_000] {
        let judges: Vec<Signature> = (0..16u8).map(|i| Signature::from([i; 64])).collect();
        let white = whitening(judges.iter());
        let keys: Vec<OrderKey> = (0..n_events)
            .map(|i| {
                let i = i as u64;
                OrderKey {
                    // many ties so the later keys are exercised
                    consensus_timestamp_nanos: 1_000 * (i % 10),
                    received_times: (0..16).map(|j| 1_000 * (i % 7) + j).collect(),
                    generation: i % 5,
                    hash: Hash::new_unique(),
                }
            })
            .collect();

        group.throughput(Throughput::Elements(n_events as u64));
        group.bench_with_input(BenchmarkId::new("events", n_events), &keys, |b, keys| {
            b.iter(|| {
                let mut sorted = keys.clone();
                sorted.sort_by(|a, b| compare_consensus_order(a, b, &white));
                sorted
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_add_event_throughput,
    bench_weighted_add_event,
    bench_pruned_window,
    bench_restart_replay,
    bench_consensus_sort,
);
criterion_main!(benches);
