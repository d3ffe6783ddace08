//! Core types for hashgraph consensus.
//!
//! Defines the events handed to the engine (`GossipEvent`), the records it
//! emits once a round is decided (`ConsensusEvent`, `CompletedRound`), and the
//! snapshot used to restart from a decided round.

use {
    solana_hash::Hash,
    solana_pubkey::Pubkey,
    solana_signature::Signature,
};

// ---------------------------------------------------------------------------
// Rounds
// ---------------------------------------------------------------------------

/// A round number. Rounds start at [`ROUND_FIRST`]; events that no longer
/// take part in round computation sit at [`ROUND_NEGATIVE_INFINITY`].
pub type Round = i64;

/// The round of every event without parents.
pub const ROUND_FIRST: Round = 1;

/// Round assigned to ancient and consensus events, and to missing parents.
pub const ROUND_NEGATIVE_INFINITY: Round = i64::MIN;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An event as received from gossip: already validated, deduplicated and
/// signed. Parents are referenced by hash and resolved by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipEvent {
    /// Content hash identifying this event.
    pub hash: Hash,
    /// Participant that created the event.
    pub creator: Pubkey,
    /// Hash of the creator's previous event, if any.
    pub self_parent: Option<Hash>,
    /// Hash of the event by another participant this one was synced from.
    pub other_parent: Option<Hash>,
    /// 1 + the max generation of the parents, 0 without parents.
    pub generation: u64,
    /// Creator's claimed creation time, nanoseconds since the Unix epoch.
    pub time_created_nanos: u64,
    /// Opaque application transactions.
    pub transactions: Vec<Vec<u8>>,
    /// Creator's signature over `hash`.
    pub signature: Signature,
}

impl GossipEvent {
    /// Build an event on top of the given parents, filling in its generation
    /// and hash.
    pub fn new(
        creator: Pubkey,
        self_parent: Option<&GossipEvent>,
        other_parent: Option<&GossipEvent>,
        time_created_nanos: u64,
        transactions: Vec<Vec<u8>>,
        signature: Signature,
    ) -> Self {
        let generation = self_parent
            .iter()
            .chain(other_parent.iter())
            .map(|parent| parent.generation.saturating_add(1))
            .max()
            .unwrap_or(0);
        let mut event = Self {
            hash: Hash::default(),
            creator,
            self_parent: self_parent.map(|parent| parent.hash),
            other_parent: other_parent.map(|parent| parent.hash),
            generation,
            time_created_nanos,
            transactions,
            signature,
        };
        event.hash = event.compute_hash();
        event
    }

    /// Compute the content hash over creator, parents, generation, creation
    /// time and transactions. The signature is not covered.
    pub fn compute_hash(&self) -> Hash {
        let parent_bytes = |parent: &Option<Hash>| match parent {
            Some(hash) => hash.to_bytes(),
            None => [0u8; 32],
        };
        let self_parent = parent_bytes(&self.self_parent);
        let other_parent = parent_bytes(&self.other_parent);
        let presence = [
            u8::from(self.self_parent.is_some()),
            u8::from(self.other_parent.is_some()),
        ];
        let creator = self.creator.to_bytes();
        let generation = self.generation.to_le_bytes();
        let time_created = self.time_created_nanos.to_le_bytes();

        let mut parts: Vec<&[u8]> = vec![
            &creator[..],
            &presence[..],
            &self_parent[..],
            &other_parent[..],
            &generation[..],
            &time_created[..],
        ];
        parts.extend(self.transactions.iter().map(Vec::as_slice));
        solana_sha256_hasher::hashv(&parts)
    }

    /// Returns true if the event names at least one parent, even one that is
    /// no longer known locally.
    pub fn has_parents(&self) -> bool {
        self.self_parent.is_some() || self.other_parent.is_some()
    }

    /// Number of transactions carried by the event.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

/// An event that has reached consensus, in the order it was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusEvent {
    pub hash: Hash,
    pub creator: Pubkey,
    pub generation: u64,
    pub time_created_nanos: u64,
    /// Round whose judges all descend from this event.
    pub round_received: Round,
    /// Position in the global total order.
    pub consensus_order: u64,
    /// Consensus timestamp of the event (and of its first transaction).
    pub consensus_timestamp_nanos: u64,
    /// True for the last event received in `round_received`.
    pub last_in_round_received: bool,
    pub transactions: Vec<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// Round output
// ---------------------------------------------------------------------------

/// Generation thresholds in force after a round was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    /// The round that was just decided.
    pub latest_consensus_round: Round,
    /// Events below this generation are ancient and will never reach
    /// consensus.
    pub min_generation_non_ancient: u64,
    /// Events below this generation are expired and have been dropped.
    pub min_round_generation: u64,
}

/// Everything needed to resume consensus right after a decided round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusSnapshot {
    /// The decided round this snapshot was taken at.
    pub round: Round,
    /// Hashes of that round's judges.
    pub judges: Vec<Hash>,
    /// Minimum judge generation of every retained decided round, ascending by
    /// round and ending with `round`.
    pub min_generations: Vec<(Round, u64)>,
    /// The consensus order the next consensus event will receive.
    pub next_consensus_order: u64,
    /// Timestamp of the last transaction that reached consensus, if any.
    pub last_consensus_timestamp_nanos: Option<u64>,
}

impl ConsensusSnapshot {
    /// Minimum judge generation recorded for `round`.
    pub fn min_generation(&self, round: Round) -> Option<u64> {
        self.min_generations
            .iter()
            .find(|(r, _)| *r == round)
            .map(|(_, generation)| *generation)
    }
}

/// A round whose fame is fully decided, with the events it brought to
/// consensus in their final order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRound {
    pub round: Round,
    pub events: Vec<ConsensusEvent>,
    pub window: EventWindow,
    pub snapshot: ConsensusSnapshot,
}

// ---------------------------------------------------------------------------
// Voting
// ---------------------------------------------------------------------------

/// A witness's vote in one election round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteResult {
    /// The vote settles the candidate's fame.
    Decided(bool),
    /// The vote is cast but fame stays open.
    Undecided(bool),
}

impl VoteResult {
    /// The vote that was cast.
    pub fn vote(&self) -> bool {
        match self {
            VoteResult::Decided(vote) | VoteResult::Undecided(vote) => *vote,
        }
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, VoteResult::Decided(_))
    }
}

impl std::fmt::Display for VoteResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteResult::Decided(vote) => write!(f, "Decided({vote})"),
            VoteResult::Undecided(vote) => write!(f, "Undecided({vote})"),
        }
    }
}

/// Votes cast in coin rounds since the engine was created or last reset.
/// Votes recast while recalculating after a decided round count again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoinRoundStats {
    /// Every vote cast in a coin round.
    pub votes: u64,
    /// Votes without a supermajority in a coin round that votes `true`.
    pub forced_true: u64,
    /// Votes without a supermajority taken from the voter's signature.
    pub coin_flips: u64,
}
