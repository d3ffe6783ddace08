//! TRv1 Hashgraph Consensus Core
//!
//! This crate implements hashgraph virtual-voting consensus. Participants
//! gossip signed events that reference a self-parent and an other-parent;
//! from that shared graph alone every node independently computes the same
//! total order of events, without sending a single vote message:
//!
//! 1. **Rounds**: Each event gets a round created. An event that strongly
//!    sees a supermajority of the previous round's witnesses starts a new
//!    round; the first event of a creator in a round is a witness.
//! 2. **Fame**: Witnesses of later rounds vote on whether each witness of
//!    the round being elected is famous, with a coin round every
//!    `coin_freq` voting rounds to break stalemates.
//! 3. **Round received**: Once every witness of a round has a decided
//!    fame, the famous ones (the judges) fix which events reach consensus
//!    in that round.
//! 4. **Order**: Those events are sorted by consensus timestamp, the
//!    extended median of their received times, generation, and whitened
//!    hash, then numbered.
//!
//! # Key Properties
//!
//! - **Deterministic**: the same events added in any topological order yield
//!   the same decided rounds, judges and consensus order.
//! - **Final**: a decided round and its judges never change.
//! - **Bounded memory**: events fall out of the window after
//!   `rounds_non_ancient` (can no longer reach consensus) and
//!   `rounds_expired` (dropped) decided rounds.
//! - **Restartable**: a [`ConsensusSnapshot`] taken after any decided round
//!   lets a fresh engine resume with identical output once events are
//!   replayed.
//! - **Safety**: consensus holds as long as less than 1/3 of the weight is
//!   Byzantine.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               ConsensusEngine                │
//! │  ┌─────────┐  ┌─────────────┐  ┌──────────┐  │
//! │  │ Config  │  │ WeightTable │  │ Ancestor │  │
//! │  │         │  │             │  │  Search  │  │
//! │  └─────────┘  └─────────────┘  └──────────┘  │
//! │  ┌────────────────────────────────────────┐  │
//! │  │              EventGraph                │  │
//! │  │  events, parent links, round memos     │  │
//! │  └────────────────────────────────────────┘  │
//! │  ┌───────────────────┐  ┌─────────────────┐  │
//! │  │   RoundRegistry   │  │    Ordering     │  │
//! │  │ elections, judges │  │ timestamps, key │  │
//! │  └───────────────────┘  └─────────────────┘  │
//! └──────────────────────────────────────────────┘
//! ```

pub mod ancestors;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_graph;
pub mod ordering;
pub mod round_info;
pub mod rounds;
pub mod types;
pub mod weight_table;

// Re-exports for convenience
pub use config::{ConfigError, ConsensusConfig};
pub use engine::ConsensusEngine;
pub use error::{ConsensusError, Result};
pub use event_graph::{EventIdx, EventView};
pub use rounds::RoundThresholds;
pub use types::{
    CoinRoundStats, CompletedRound, ConsensusEvent, ConsensusSnapshot, EventWindow, GossipEvent,
    Round, VoteResult, ROUND_FIRST, ROUND_NEGATIVE_INFINITY,
};
pub use weight_table::{Participant, WeightTable};
