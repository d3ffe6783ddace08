//! Fuzz the hashgraph consensus engine with random gossip schedules.
//!
//! Goals:
//! - Find panics on forks, orphans, duplicates and unknown creators.
//! - Verify that consensus orders stay gapless and timestamps increase.
//! - Verify that decided rounds come in sequence and thresholds never regress.
//! - Verify that a restart from any snapshot recovers once events are replayed.

#![no_main]

use {
    arbitrary::{Arbitrary, Unstructured},
    libfuzzer_sys::fuzz_target,
    solana_hash::Hash,
    solana_pubkey::Pubkey,
    solana_signature::Signature,
    std::collections::HashSet,
    trv1_consensus_hashgraph::{
        CompletedRound, ConsensusConfig, ConsensusEngine, ConsensusError, ConsensusSnapshot,
        GossipEvent, WeightTable,
    },
};

/// A fuzzable gossip action.
#[derive(Debug)]
enum FuzzAction {
    /// `creator` syncs with `other` and creates an event.
    Sync {
        creator: usize,
        other: usize,
        delay_nanos: u64,
        num_transactions: u8,
        signature_byte: u8,
    },
    /// `creator` builds on an older event of its own, forking its chain.
    Fork { creator: usize, depth: usize },
    /// An event whose self-parent was never seen.
    Orphan { creator: usize, parent_byte: u8 },
    /// Deliver an event that was already added.
    Duplicate { event_idx: usize },
    /// An event by a participant outside the weight table.
    Stranger,
    /// Restart a second engine from the latest snapshot and replay.
    Restart,
}

impl<'a> Arbitrary<'a> for FuzzAction {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        // syncs dominate so that rounds actually get decided
        let variant = u.int_in_range(0..=19)?;
        match variant {
            0..=13 => Ok(FuzzAction::Sync {
                creator: u.int_in_range(0..=7)?,
                other: u.int_in_range(0..=7)?,
                delay_nanos: u.int_in_range(1..=5_000)?,
                num_transactions: u.int_in_range(0..=3)?,
                signature_byte: u.arbitrary()?,
            }),
            14 => Ok(FuzzAction::Fork {
                creator: u.int_in_range(0..=7)?,
                depth: u.int_in_range(1..=4)?,
            }),
            15 => Ok(FuzzAction::Orphan {
                creator: u.int_in_range(0..=7)?,
                parent_byte: u.arbitrary()?,
            }),
            16 => Ok(FuzzAction::Duplicate {
                event_idx: u.arbitrary()?,
            }),
            17 => Ok(FuzzAction::Stranger),
            18 | 19 => Ok(FuzzAction::Restart),
            _ => unreachable!(),
        }
    }
}

/// Invariants over the rounds one engine has decided so far.
#[derive(Default)]
struct OutputChecker {
    next_round: Option<i64>,
    next_order: Option<u64>,
    last_timestamp: Option<u64>,
    seen: HashSet<Hash>,
}

impl OutputChecker {
    fn check(&mut self, rounds: &[CompletedRound]) {
        for round in rounds {
            if let Some(expected) = self.next_round {
                assert_eq!(round.round, expected, "rounds decided out of sequence");
            }
            self.next_round = Some(round.round + 1);
            for event in &round.events {
                assert!(self.seen.insert(event.hash), "event reached consensus twice");
                if let Some(expected) = self.next_order {
                    assert_eq!(event.consensus_order, expected, "gap in consensus order");
                }
                self.next_order = Some(event.consensus_order + 1);
                if let Some(last) = self.last_timestamp {
                    assert!(
                        event.consensus_timestamp_nanos > last,
                        "consensus timestamps must strictly increase"
                    );
                }
                self.last_timestamp = Some(event.consensus_timestamp_nanos);
            }
        }
    }
}

fuzz_target!(|data: &[u8]| {
    let mut u = Unstructured::new(data);

    // Create a deterministic set of participants (4-8).
    let num_participants: usize = match u.int_in_range(4..=8) {
        Ok(n) => n,
        Err(_) => return,
    };

    let pks: Vec<Pubkey> = (0..num_participants)
        .map(|i| {
            let mut bytes = [0u8; 32];
            bytes[0] = i as u8;
            bytes[31] = 0xAA; // marker
            Pubkey::new_from_array(bytes)
        })
        .collect();

    let weights = WeightTable::new(
        pks.iter()
            .map(|pk| (*pk, u.int_in_range(1..=1000).unwrap_or(100)))
            .collect(),
    );

    let rounds_non_ancient = u.int_in_range(2..=6).unwrap_or(4);
    let config = ConsensusConfig {
        rounds_non_ancient,
        rounds_expired: rounds_non_ancient + u.int_in_range(0..=4).unwrap_or(2),
        coin_freq: u.int_in_range(2..=12).unwrap_or(12),
        ..ConsensusConfig::default()
    };

    let mut engine = match ConsensusEngine::new(config.clone(), weights.clone()) {
        Ok(engine) => engine,
        Err(_) => return,
    };
    let thresholds = engine.thresholds();
    let mut checker = OutputChecker::default();

    // Every event delivered so far, and each creator's own chain.
    let mut delivered: Vec<GossipEvent> = Vec::new();
    let mut chains: Vec<Vec<GossipEvent>> = vec![Vec::new(); num_participants];
    let mut latest_snapshot: Option<ConsensusSnapshot> = None;
    let mut clock = 0u64;

    let num_actions: usize = u.int_in_range(1..=400).unwrap_or(100);

    for _ in 0..num_actions {
        let action: FuzzAction = match u.arbitrary() {
            Ok(a) => a,
            Err(_) => break,
        };

        let event = match action {
            FuzzAction::Sync {
                creator,
                other,
                delay_nanos,
                num_transactions,
                signature_byte,
            } => {
                let creator = creator % num_participants;
                let other = other % num_participants;
                clock += delay_nanos;
                let other_parent = if other == creator {
                    None
                } else {
                    chains[other].last()
                };
                GossipEvent::new(
                    pks[creator],
                    chains[creator].last(),
                    other_parent,
                    clock,
                    (0..num_transactions).map(|k| vec![k, signature_byte]).collect(),
                    Signature::from([signature_byte; 64]),
                )
            }

            FuzzAction::Fork { creator, depth } => {
                let creator = creator % num_participants;
                let chain = &chains[creator];
                let Some(parent) = chain.len().checked_sub(1 + depth).and_then(|i| chain.get(i)) else {
                    continue;
                };
                clock += 1;
                GossipEvent::new(pks[creator], Some(parent), None, clock, vec![vec![0xF0]], Signature::default())
            }

            FuzzAction::Orphan {
                creator,
                parent_byte,
            } => {
                let creator = creator % num_participants;
                clock += 1;
                let mut event =
                    GossipEvent::new(pks[creator], None, None, clock, vec![], Signature::default());
                event.self_parent = Some(Hash::new_from_array([parent_byte; 32]));
                event.generation = 1;
                event.hash = event.compute_hash();
                event
            }

            FuzzAction::Duplicate { event_idx } => {
                if delivered.is_empty() {
                    continue;
                }
                let event = delivered[event_idx % delivered.len()].clone();
                match engine.add_event(event.clone()) {
                    Err(ConsensusError::DuplicateEvent(hash)) => assert_eq!(hash, event.hash),
                    // already pruned, so it is accepted again as a new event
                    Ok(rounds) => checker.check(&rounds),
                    Err(err) => panic!("unexpected error for a known event: {err}"),
                }
                continue;
            }

            FuzzAction::Stranger => {
                let stranger = Pubkey::new_from_array([0xEE; 32]);
                let event = GossipEvent::new(stranger, None, None, clock, vec![], Signature::default());
                let result = engine.add_event(event);
                assert!(
                    matches!(result, Err(ConsensusError::UnknownCreator { .. })),
                    "event by an unknown creator was accepted"
                );
                continue;
            }

            FuzzAction::Restart => {
                let Some(snapshot) = latest_snapshot.as_ref() else {
                    continue;
                };
                let mut restarted = ConsensusEngine::new(config.clone(), weights.clone())
                    .expect("parameters were accepted once");
                restarted.load_snapshot(snapshot).expect("engine produced this snapshot");
                for event in &delivered {
                    let _ = restarted.add_event(event.clone());
                }
                assert!(
                    restarted.check_snapshot_recovered().is_ok(),
                    "replaying every event must recover the snapshot judges"
                );
                assert!(restarted.num_consensus() <= engine.num_consensus());
                continue;
            }
        };

        let creator = weights.index_of(&event.creator).unwrap_or(0);
        chains[creator].push(event.clone());
        delivered.push(event.clone());

        let before = (
            thresholds.min_round_generation(),
            thresholds.min_generation_non_ancient(),
            thresholds.fame_decided_below(),
        );

        // ── Invariant checks ──

        // 1. Every new event from a known creator is accepted.
        let rounds = engine.add_event(event).expect("fresh event rejected");

        // 2. Decided rounds are sequential with a gapless, increasing order.
        checker.check(&rounds);
        if let Some(last) = rounds.last() {
            latest_snapshot = Some(last.snapshot.clone());
        }

        // 3. Thresholds never move backwards.
        assert!(thresholds.min_round_generation() >= before.0);
        assert!(thresholds.min_generation_non_ancient() >= before.1);
        assert!(thresholds.fame_decided_below() >= before.2);
    }
});
