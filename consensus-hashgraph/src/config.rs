//! Hashgraph consensus configuration.
//!
//! Defines the voting coin frequency, the ancient/expired round windows used
//! for pruning, and the minimum spacing between consensus timestamps.

/// Configuration for the hashgraph consensus engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusConfig {
    /// Number of rounds behind the latest decided round whose events are still
    /// non-ancient. An event older than this can never reach consensus.
    /// Default: 26.
    pub rounds_non_ancient: u32,

    /// Number of rounds behind the latest decided round that are retained at
    /// all. Round records and events older than this are dropped.
    /// Default: 500.
    pub rounds_expired: u32,

    /// Every `coin_freq`-th voting round of an election is a coin round, in
    /// which voters without a supermajority fall back to a pseudorandom vote.
    /// Default: 12.
    pub coin_freq: u32,

    /// Minimum gap in nanoseconds between the consensus timestamps of two
    /// consecutive transactions.
    /// Default: 1000.
    pub min_trans_timestamp_incr_nanos: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            rounds_non_ancient: 26,
            rounds_expired: 500,
            coin_freq: 12,
            min_trans_timestamp_incr_nanos: 1_000,
        }
    }
}

impl ConsensusConfig {
    /// Returns true if an election of the given age votes by coin.
    pub fn is_coin_round(&self, age: i64) -> bool {
        age % i64::from(self.coin_freq) == 0
    }

    /// Every other coin round votes `true` instead of flipping the coin.
    pub fn is_forced_true_coin_round(&self, age: i64) -> bool {
        let coin_freq = i64::from(self.coin_freq);
        age % (2 * coin_freq) == coin_freq
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coin_freq < 2 {
            return Err(ConfigError::InvalidCoinFrequency(self.coin_freq));
        }
        if self.rounds_non_ancient == 0 {
            return Err(ConfigError::InvalidRoundsNonAncient);
        }
        if self.rounds_expired < self.rounds_non_ancient {
            return Err(ConfigError::ExpiredBeforeAncient {
                rounds_expired: self.rounds_expired,
                rounds_non_ancient: self.rounds_non_ancient,
            });
        }
        if self.min_trans_timestamp_incr_nanos == 0 {
            return Err(ConfigError::InvalidTimestampIncrement);
        }
        Ok(())
    }
}

/// Errors in consensus configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("coin_freq must be >= 2, got {0}")]
    InvalidCoinFrequency(u32),
    #[error("rounds_non_ancient must be > 0")]
    InvalidRoundsNonAncient,
    #[error(
        "rounds_expired ({rounds_expired}) must be >= rounds_non_ancient ({rounds_non_ancient})"
    )]
    ExpiredBeforeAncient {
        rounds_expired: u32,
        rounds_non_ancient: u32,
    },
    #[error("min_trans_timestamp_incr_nanos must be > 0")]
    InvalidTimestampIncrement,
}
