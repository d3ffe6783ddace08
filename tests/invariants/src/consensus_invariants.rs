//! Property-based tests for hashgraph consensus invariants.
//!
//! Properties tested:
//! 1. Determinism: any topological delivery order decides the same rounds.
//! 2. Total order: consensus orders are gapless and timestamps increase.
//! 3. Thresholds: generation thresholds never move backwards.
//! 4. Restart: resuming from a snapshot reproduces every later round.

#[cfg(test)]
mod tests {
    use {
        proptest::{prelude::*, sample::Index},
        solana_hash::Hash,
        solana_pubkey::Pubkey,
        solana_signature::Signature,
        std::collections::{BTreeMap, HashSet},
        trv1_consensus_hashgraph::{
            ordering::calc_min_timestamp_for_next_event, CompletedRound, ConsensusConfig,
            ConsensusEngine, ConsensusEvent, GossipEvent, Round, WeightTable,
        },
    };

    // ── Helpers ──

    /// One gossip sync: `creator` creates an event on top of the latest event
    /// by `creator + offset`.
    #[derive(Debug, Clone)]
    struct Sync {
        creator: usize,
        offset: usize,
        delay_nanos: u64,
        num_transactions: u8,
        signature_byte: u8,
    }

    fn make_participants(n: usize) -> (Vec<Pubkey>, WeightTable) {
        let pks: Vec<Pubkey> = (0..n)
            .map(|i| {
                let mut bytes = [0u8; 32];
                bytes[0] = i as u8;
                bytes[31] = 0xBB;
                Pubkey::new_from_array(bytes)
            })
            .collect();
        let weights = WeightTable::new_equal(&pks);
        (pks, weights)
    }

    /// Genesis events for every participant followed by the given syncs, in
    /// creation order.
    fn build_events(pks: &[Pubkey], syncs: &[Sync]) -> Vec<GossipEvent> {
        let n = pks.len();
        let mut latest: Vec<Option<GossipEvent>> = vec![None; n];
        let mut events = Vec::with_capacity(n + syncs.len());
        let mut clock = 0u64;

        for (i, pk) in pks.iter().enumerate() {
            clock += 1_000;
            let event = GossipEvent::new(*pk, None, None, clock, vec![], Signature::from([i as u8; 64]));
            latest[i] = Some(event.clone());
            events.push(event);
        }
        for sync in syncs {
            let creator = sync.creator % n;
            let other = (creator + 1 + sync.offset % (n - 1)) % n;
            clock += sync.delay_nanos;
            let transactions = (0..sync.num_transactions)
                .map(|k| vec![k, sync.signature_byte])
                .collect();
            let event = GossipEvent::new(
                pks[creator],
                latest[creator].as_ref(),
                latest[other].as_ref(),
                clock,
                transactions,
                Signature::from([sync.signature_byte; 64]),
            );
            latest[creator] = Some(event.clone());
            events.push(event);
        }
        events
    }

    /// The same events delivered in another topological order.
    fn shuffle_topologically(events: &[GossipEvent], picks: &[Index]) -> Vec<GossipEvent> {
        let mut remaining: Vec<GossipEvent> = events.to_vec();
        let mut delivered: HashSet<Hash> = HashSet::new();
        let mut order = Vec::with_capacity(events.len());
        let mut pick = picks.iter().cycle();

        while !remaining.is_empty() {
            let ready: Vec<usize> = remaining
                .iter()
                .enumerate()
                .filter(|(_, event)| {
                    [event.self_parent, event.other_parent]
                        .iter()
                        .flatten()
                        .all(|parent| delivered.contains(parent))
                })
                .map(|(i, _)| i)
                .collect();
            let chosen = match pick.next() {
                Some(index) => ready[index.index(ready.len())],
                None => ready[0],
            };
            let event = remaining.remove(chosen);
            delivered.insert(event.hash);
            order.push(event);
        }
        order
    }

    fn run(
        config: &ConsensusConfig,
        weights: &WeightTable,
        events: &[GossipEvent],
    ) -> (ConsensusEngine, Vec<CompletedRound>) {
        let mut engine = ConsensusEngine::new(config.clone(), weights.clone()).unwrap();
        let mut completed = Vec::new();
        for event in events {
            completed.extend(engine.add_event(event.clone()).unwrap());
        }
        (engine, completed)
    }

    fn by_round(completed: &[CompletedRound]) -> BTreeMap<Round, Vec<ConsensusEvent>> {
        completed
            .iter()
            .map(|round| (round.round, round.events.clone()))
            .collect()
    }

    fn sync_strategy() -> impl Strategy<Value = Sync> {
        (0..16usize, 0..16usize, 1..3_000u64, 0..3u8, any::<u8>()).prop_map(
            |(creator, offset, delay_nanos, num_transactions, signature_byte)| Sync {
                creator,
                offset,
                delay_nanos,
                num_transactions,
                signature_byte,
            },
        )
    }

    fn window_config() -> impl Strategy<Value = ConsensusConfig> {
        (2..=4u32, 0..=3u32).prop_map(|(rounds_non_ancient, extra)| ConsensusConfig {
            rounds_non_ancient,
            rounds_expired: rounds_non_ancient + extra,
            ..ConsensusConfig::default()
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 1. Determinism: delivery order does not matter
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// Two engines fed the same graph in different topological orders
        /// decide identical rounds wherever both decided them.
        #[test]
        fn reordered_delivery_decides_same_rounds(
            num_participants in 4..=7usize,
            syncs in prop::collection::vec(sync_strategy(), 150..300),
            picks in prop::collection::vec(any::<Index>(), 64),
            config in window_config(),
        ) {
            let (pks, weights) = make_participants(num_participants);
            let events = build_events(&pks, &syncs);
            let shuffled = shuffle_topologically(&events, &picks);

            let (_, in_order) = run(&config, &weights, &events);
            let (_, reordered) = run(&config, &weights, &shuffled);
            let (a, b) = (by_round(&in_order), by_round(&reordered));

            for (round, events) in &a {
                if let Some(other) = b.get(round) {
                    prop_assert_eq!(events, other, "round {} differs after reordering", round);
                }
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 2. Total order
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Consensus orders count up from zero without gaps, every event
        /// reaches consensus at most once, and each transaction gets a later
        /// timestamp than the one before it.
        #[test]
        fn consensus_order_is_gapless_and_timestamps_increase(
            num_participants in 4..=7usize,
            syncs in prop::collection::vec(sync_strategy(), 100..300),
        ) {
            let (pks, weights) = make_participants(num_participants);
            let events = build_events(&pks, &syncs);
            let config = ConsensusConfig::default();
            let incr = config.min_trans_timestamp_incr_nanos;
            let (engine, completed) = run(&config, &weights, &events);

            let mut seen: HashSet<Hash> = HashSet::new();
            let mut next_order = 0u64;
            let mut min_next_timestamp = 0u64;
            let mut last_round = 0;
            for round in &completed {
                prop_assert_eq!(round.round, last_round + 1, "rounds must be decided in sequence");
                last_round = round.round;
                for event in &round.events {
                    prop_assert!(seen.insert(event.hash), "event reached consensus twice");
                    prop_assert_eq!(event.consensus_order, next_order);
                    prop_assert_eq!(event.round_received, round.round);
                    prop_assert!(event.consensus_timestamp_nanos >= min_next_timestamp);
                    next_order += 1;
                    let last_transaction = event.consensus_timestamp_nanos
                        + incr * (event.transactions.len().max(1) as u64 - 1);
                    min_next_timestamp = calc_min_timestamp_for_next_event(last_transaction, incr);
                }
            }
            prop_assert_eq!(engine.num_consensus(), next_order);
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 3. Threshold monotonicity
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// The published thresholds and event windows only move forward, even
        /// with tight pruning windows.
        #[test]
        fn thresholds_never_decrease(
            num_participants in 4..=6usize,
            syncs in prop::collection::vec(sync_strategy(), 100..250),
            config in window_config(),
        ) {
            let (pks, weights) = make_participants(num_participants);
            let events = build_events(&pks, &syncs);
            let mut engine = ConsensusEngine::new(config, weights).unwrap();
            let thresholds = engine.thresholds();

            let mut previous = (0u64, 0u64, 0u64, 1);
            for event in events {
                for round in engine.add_event(event).unwrap() {
                    prop_assert!(round.window.min_round_generation <= round.window.min_generation_non_ancient);
                }
                let current = (
                    thresholds.min_round_generation(),
                    thresholds.min_generation_non_ancient(),
                    thresholds.max_round_generation(),
                    thresholds.fame_decided_below(),
                );
                prop_assert!(current.0 >= previous.0, "min round generation decreased");
                prop_assert!(current.1 >= previous.1, "min non-ancient generation decreased");
                prop_assert!(current.2 >= previous.2, "max round generation decreased");
                prop_assert!(current.3 >= previous.3, "fame decided below decreased");
                previous = current;
            }
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 4. Restart equivalence
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        /// An engine restarted from the snapshot of any decided round, then
        /// fed every event again, decides exactly the rounds that followed.
        #[test]
        fn restart_from_snapshot_reproduces_later_rounds(
            num_participants in 4..=7usize,
            syncs in prop::collection::vec(sync_strategy(), 150..300),
            config in window_config(),
            restart_at in any::<Index>(),
        ) {
            let (pks, weights) = make_participants(num_participants);
            let events = build_events(&pks, &syncs);
            let (original, completed) = run(&config, &weights, &events);
            prop_assume!(!completed.is_empty());
            let snapshot = completed[restart_at.index(completed.len())].snapshot.clone();

            let mut restarted = ConsensusEngine::new(config.clone(), weights.clone()).unwrap();
            restarted.load_snapshot(&snapshot).unwrap();
            let mut resumed = Vec::new();
            for event in &events {
                resumed.extend(restarted.add_event(event.clone()).unwrap());
            }
            prop_assert!(restarted.check_snapshot_recovered().is_ok());

            let expected: Vec<(Round, Vec<ConsensusEvent>)> = completed
                .iter()
                .filter(|round| round.round > snapshot.round)
                .map(|round| (round.round, round.events.clone()))
                .collect();
            let actual: Vec<(Round, Vec<ConsensusEvent>)> = resumed
                .into_iter()
                .map(|round| (round.round, round.events))
                .collect();
            prop_assert_eq!(actual, expected);
            prop_assert_eq!(restarted.num_consensus(), original.num_consensus());
            prop_assert_eq!(
                restarted.last_consensus_timestamp_nanos(),
                original.last_consensus_timestamp_nanos()
            );
        }
    }
}
