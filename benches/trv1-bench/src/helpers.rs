//! Shared helpers for TRv1 benchmarks.

use {
    rand::{rngs::StdRng, Rng, SeedableRng},
    solana_keypair::Keypair,
    solana_pubkey::Pubkey,
    solana_signer::Signer,
    trv1_consensus_hashgraph::{GossipEvent, WeightTable},
};

/// Create a weight table of `n` participants with equal weight.
pub fn make_weight_table(n: usize) -> (WeightTable, Vec<Keypair>) {
    let keypairs: Vec<Keypair> = (0..n).map(|_| Keypair::new()).collect();
    let participants: Vec<(Pubkey, u64)> = keypairs
        .iter()
        .map(|kp| (kp.pubkey(), 1_000_000))
        .collect();
    (WeightTable::new(participants), keypairs)
}

/// Create a weight table with descending weights.
pub fn make_weighted_table(n: usize) -> (WeightTable, Vec<Keypair>) {
    let keypairs: Vec<Keypair> = (0..n).map(|_| Keypair::new()).collect();
    let participants: Vec<(Pubkey, u64)> = keypairs
        .iter()
        .enumerate()
        .map(|(i, kp)| {
            // the first participants carry the most weight
            let weight = ((n.saturating_sub(i)) as u64).saturating_mul(1_000_000);
            (kp.pubkey(), weight)
        })
        .collect();
    (WeightTable::new(participants), keypairs)
}

fn sign(keypair: &Keypair, mut event: GossipEvent) -> GossipEvent {
    event.signature = keypair.sign_message(event.hash.as_ref());
    event
}

/// A signed gossip history: one genesis event per participant, then `steps`
/// random syncs carrying up to `max_transactions` transactions each. Events
/// are returned in creation order.
pub fn make_gossip_history(
    keypairs: &[Keypair],
    steps: usize,
    max_transactions: usize,
    seed: u64,
) -> Vec<GossipEvent> {
    let n = keypairs.len();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut latest: Vec<Option<GossipEvent>> = vec![None; n];
    let mut events = Vec::with_capacity(n + steps);
    let mut clock = 1_700_000_000_000_000_000u64;

    for (i, keypair) in keypairs.iter().enumerate() {
        clock += 1_000;
        let event = sign(
            keypair,
            GossipEvent::new(keypair.pubkey(), None, None, clock, vec![], Default::default()),
        );
        latest[i] = Some(event.clone());
        events.push(event);
    }

    for _ in 0..steps {
        let creator = rng.random_range(0..n);
        let other = (creator + rng.random_range(1..n.max(2))) % n;
        clock += rng.random_range(1_000..50_000);
        let transactions = (0..rng.random_range(0..=max_transactions))
            .map(|_| {
                let mut tx = vec![0u8; 64];
                rng.fill(&mut tx[..]);
                tx
            })
            .collect();
        let keypair = &keypairs[creator];
        let event = sign(
            keypair,
            GossipEvent::new(
                keypair.pubkey(),
                latest[creator].as_ref(),
                latest[other].as_ref(),
                clock,
                transactions,
                Default::default(),
            ),
        );
        latest[creator] = Some(event.clone());
        events.push(event);
    }
    events
}
