//! Error types for the hashgraph consensus core.
//!
//! Every variant is an invariant violation. None of them are retried: the
//! caller either fed the engine input it promised not to, or the local state
//! has diverged and must not produce any further consensus output.

use {
    crate::{config::ConfigError, types::Round},
    solana_hash::Hash,
    solana_pubkey::Pubkey,
    thiserror::Error,
};

/// Errors raised by the consensus engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    /// The configuration failed validation.
    #[error("invalid consensus config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The weight table has no participants.
    #[error("weight table is empty")]
    EmptyWeightTable,

    /// Every participant has zero weight, so no supermajority can ever form.
    #[error("weight table has zero total weight")]
    ZeroTotalWeight,

    /// An event was created by someone outside the weight table.
    #[error("event {hash} created by unknown participant {creator}")]
    UnknownCreator {
        /// Hash of the rejected event.
        hash: Hash,
        /// Creator named by the event.
        creator: Pubkey,
    },

    /// An event with this hash was already added.
    #[error("duplicate event {0}")]
    DuplicateEvent(Hash),

    /// A round needed for bookkeeping has no round record.
    #[error("missing round info for round {0}")]
    MissingRoundInfo(Round),

    /// A generation threshold would have moved backwards.
    #[error("round registry value {name} decreased from {current} to {attempted}")]
    ThresholdRegressed {
        /// Which threshold.
        name: &'static str,
        /// Value before the update.
        current: u64,
        /// Value the update tried to publish.
        attempted: u64,
    },

    /// Fame decided below must advance one round at a time.
    #[error("fame decided below must advance from {current} to {expected}, got {attempted}")]
    FameDecidedBelowMismatch {
        current: Round,
        expected: Round,
        attempted: Round,
    },

    /// The snapshot is internally inconsistent.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// Events were replayed after a snapshot load but some judges never arrived.
    #[error("{missing} judge(s) of snapshot round {round} were never found")]
    SnapshotJudgesMissing {
        /// Round of the loaded snapshot.
        round: Round,
        /// Number of judges still missing.
        missing: usize,
    },
}

/// Convenience result type for consensus operations.
pub type Result<T> = std::result::Result<T, ConsensusError>;
