//! Round registry and the generation thresholds derived from it.
//!
//! The registry owns a [`RoundInfo`] per retained round and tracks which
//! rounds have their fame decided. Each decision moves three generation
//! thresholds forward:
//!
//! - `max_round_generation`: minimum judge generation of the latest decided
//!   round.
//! - `min_generation_non_ancient`: events below it are ancient.
//! - `min_round_generation`: events below it are expired.
//!
//! The thresholds are mirrored in a shared [`RoundThresholds`] so gossip and
//! pruning code can poll them without holding the engine.

use {
    crate::{
        config::ConsensusConfig,
        error::{ConsensusError, Result},
        event_graph::EventIdx,
        round_info::RoundInfo,
        types::{ConsensusSnapshot, Round, ROUND_FIRST, ROUND_NEGATIVE_INFINITY},
    },
    std::{
        collections::{BTreeMap, HashSet},
        sync::{
            atomic::{AtomicI64, AtomicU64, Ordering},
            Arc,
        },
    },
};

/// Lock-free view of the registry's round and generation thresholds.
///
/// Writers only ever publish from the consensus thread. The generation
/// values never decrease.
#[derive(Debug)]
pub struct RoundThresholds {
    max_round: AtomicI64,
    fame_decided_below: AtomicI64,
    min_round_generation: AtomicU64,
    max_round_generation: AtomicU64,
    min_generation_non_ancient: AtomicU64,
}

impl Default for RoundThresholds {
    fn default() -> Self {
        Self {
            max_round: AtomicI64::new(ROUND_NEGATIVE_INFINITY),
            fame_decided_below: AtomicI64::new(ROUND_FIRST),
            min_round_generation: AtomicU64::new(0),
            max_round_generation: AtomicU64::new(0),
            min_generation_non_ancient: AtomicU64::new(0),
        }
    }
}

impl RoundThresholds {
    pub fn max_round(&self) -> Round {
        self.max_round.load(Ordering::Acquire)
    }

    pub fn fame_decided_below(&self) -> Round {
        self.fame_decided_below.load(Ordering::Acquire)
    }

    pub fn min_round_generation(&self) -> u64 {
        self.min_round_generation.load(Ordering::Acquire)
    }

    pub fn max_round_generation(&self) -> u64 {
        self.max_round_generation.load(Ordering::Acquire)
    }

    pub fn min_generation_non_ancient(&self) -> u64 {
        self.min_generation_non_ancient.load(Ordering::Acquire)
    }
}

/// Per-round bookkeeping for the engine.
#[derive(Debug)]
pub struct RoundRegistry {
    rounds_non_ancient: Round,
    rounds_expired: Round,
    num_participants: usize,

    rounds: BTreeMap<Round, RoundInfo>,
    min_round: Round,
    max_round: Round,
    fame_decided_below: Round,
    min_round_generation: u64,
    max_round_generation: u64,
    min_generation_non_ancient: u64,
    /// Judges of the latest decided round; their round is fixed.
    last_decided_judges: HashSet<EventIdx>,

    thresholds: Arc<RoundThresholds>,
}

impl RoundRegistry {
    pub fn new(config: &ConsensusConfig, num_participants: usize) -> Self {
        Self {
            rounds_non_ancient: Round::from(config.rounds_non_ancient),
            rounds_expired: Round::from(config.rounds_expired),
            num_participants,
            rounds: BTreeMap::new(),
            min_round: ROUND_FIRST,
            max_round: ROUND_NEGATIVE_INFINITY,
            fame_decided_below: ROUND_FIRST,
            min_round_generation: 0,
            max_round_generation: 0,
            min_generation_non_ancient: 0,
            last_decided_judges: HashSet::new(),
            thresholds: Arc::new(RoundThresholds::default()),
        }
    }

    /// Shared handle to the published thresholds.
    pub fn thresholds(&self) -> Arc<RoundThresholds> {
        Arc::clone(&self.thresholds)
    }

    pub fn max_round(&self) -> Round {
        self.max_round
    }

    pub fn min_round(&self) -> Round {
        self.min_round
    }

    /// Every round below this has all of its witnesses' fame decided. This is
    /// also the round currently being elected.
    pub fn fame_decided_below(&self) -> Round {
        self.fame_decided_below
    }

    /// Latest decided round, `ROUND_FIRST - 1` before any decision.
    pub fn last_decided_round(&self) -> Round {
        self.fame_decided_below.saturating_sub(1)
    }

    pub fn min_round_generation(&self) -> u64 {
        self.min_round_generation
    }

    pub fn max_round_generation(&self) -> u64 {
        self.max_round_generation
    }

    pub fn min_generation_non_ancient(&self) -> u64 {
        self.min_generation_non_ancient
    }

    /// True if an event of this generation can no longer reach consensus.
    pub fn is_ancient(&self, generation: u64) -> bool {
        generation < self.min_generation_non_ancient
    }

    pub fn get(&self, round: Round) -> Option<&RoundInfo> {
        self.rounds.get(&round)
    }

    pub fn get_mut(&mut self, round: Round) -> Option<&mut RoundInfo> {
        self.rounds.get_mut(&round)
    }

    /// Number of round records currently retained.
    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// The round record for `round`, created on first use.
    pub fn get_or_create(&mut self, round: Round) -> &mut RoundInfo {
        if round > self.max_round {
            self.max_round = round;
            self.thresholds.max_round.store(round, Ordering::Release);
        }
        let num_participants = self.num_participants;
        self.rounds
            .entry(round)
            .or_insert_with(|| RoundInfo::new(round, num_participants))
    }

    pub fn add_witness(&mut self, round: Round, witness: EventIdx) {
        self.get_or_create(round).add_witness(witness);
    }

    /// Returns the round of `idx` if it is a judge of the latest decided
    /// round.
    pub fn last_decided_judge_round(&self, idx: EventIdx) -> Option<Round> {
        self.last_decided_judges
            .contains(&idx)
            .then(|| self.last_decided_round())
    }

    /// Fix the judges of the latest decided round.
    pub fn set_last_decided_judges(&mut self, judges: impl IntoIterator<Item = EventIdx>) {
        self.last_decided_judges = judges.into_iter().collect();
    }

    /// Drop every round record that is not yet decided, ahead of a full
    /// recalculation.
    pub fn reset_undecided(&mut self) {
        let fame_decided_below = self.fame_decided_below;
        self.rounds.retain(|round, _| *round < fame_decided_below);
        self.max_round = self
            .rounds
            .keys()
            .next_back()
            .copied()
            .unwrap_or(ROUND_NEGATIVE_INFINITY);
        self.thresholds
            .max_round
            .store(self.max_round, Ordering::Release);
    }

    /// Record that every round below `fame_decided_below` is decided and move
    /// the generation thresholds forward. Rounds are decided one at a time.
    pub fn set_fame_decided_below(
        &mut self,
        fame_decided_below: Round,
        judges: impl IntoIterator<Item = EventIdx>,
    ) -> Result<()> {
        let expected = self.fame_decided_below.saturating_add(1);
        if fame_decided_below != expected {
            return Err(ConsensusError::FameDecidedBelowMismatch {
                current: self.fame_decided_below,
                expected,
                attempted: fame_decided_below,
            });
        }
        let decided = self.fame_decided_below;
        let decided_min_generation = self
            .rounds
            .get(&decided)
            .ok_or(ConsensusError::MissingRoundInfo(decided))?
            .min_generation();

        self.fame_decided_below = fame_decided_below;
        self.thresholds
            .fame_decided_below
            .store(fame_decided_below, Ordering::Release);
        self.set_last_decided_judges(judges);

        if let Some(generation) = decided_min_generation {
            let value = self.max_round_generation.max(generation);
            self.publish_max_round_generation(value)?;
        }
        let oldest_non_ancient = decided
            .saturating_sub(self.rounds_non_ancient)
            .saturating_add(1);
        if let Some(generation) = self.min_generation_of(oldest_non_ancient) {
            let value = self.min_generation_non_ancient.max(generation);
            self.publish_min_generation_non_ancient(value)?;
        }
        Ok(())
    }

    /// Remove rounds older than the retention window and raise
    /// `min_round_generation` to the oldest remaining round. Returns how many
    /// round records were removed.
    pub fn delete_expired_rounds(&mut self) -> Result<usize> {
        let new_min_round = self.fame_decided_below.saturating_sub(self.rounds_expired);
        if new_min_round <= self.min_round {
            return Ok(0);
        }
        let retained = self.rounds.split_off(&new_min_round);
        let removed = std::mem::replace(&mut self.rounds, retained).len();
        self.min_round = new_min_round;
        if let Some(generation) = self.min_generation_of(new_min_round) {
            let value = self.min_round_generation.max(generation);
            self.publish_min_round_generation(value)?;
        }
        Ok(removed)
    }

    /// Minimum judge generation of every retained decided round, ascending.
    pub fn min_generations(&self) -> Vec<(Round, u64)> {
        self.rounds
            .range(..self.fame_decided_below)
            .filter_map(|(round, info)| info.min_generation().map(|g| (*round, g)))
            .collect()
    }

    fn min_generation_of(&self, round: Round) -> Option<u64> {
        self.rounds.get(&round).and_then(RoundInfo::min_generation)
    }

    /// Replace all state with the decided rounds recorded in a snapshot. The
    /// snapshot must already be validated. Thresholds start a fresh history.
    pub fn load_snapshot(&mut self, snapshot: &ConsensusSnapshot) -> Result<()> {
        self.clear();
        for (round, generation) in &snapshot.min_generations {
            self.rounds.insert(
                *round,
                RoundInfo::decided_from_snapshot(*round, *generation, self.num_participants),
            );
        }
        self.min_round = snapshot
            .min_generations
            .first()
            .map_or(snapshot.round, |(round, _)| *round);
        self.max_round = snapshot.round;
        self.fame_decided_below = snapshot.round.saturating_add(1);
        self.thresholds.max_round.store(self.max_round, Ordering::Release);
        self.thresholds
            .fame_decided_below
            .store(self.fame_decided_below, Ordering::Release);

        if let Some(generation) = self.min_generation_of(snapshot.round) {
            self.publish_max_round_generation(generation)?;
        }
        let oldest_non_ancient = snapshot
            .round
            .saturating_sub(self.rounds_non_ancient)
            .saturating_add(1)
            .max(self.min_round);
        if let Some(generation) = self.min_generation_of(oldest_non_ancient) {
            self.publish_min_generation_non_ancient(generation)?;
        }
        if let Some(generation) = self.min_generation_of(self.min_round) {
            self.publish_min_round_generation(generation)?;
        }
        Ok(())
    }

    /// Forget every round and start a new threshold history.
    pub fn clear(&mut self) {
        self.rounds.clear();
        self.min_round = ROUND_FIRST;
        self.max_round = ROUND_NEGATIVE_INFINITY;
        self.fame_decided_below = ROUND_FIRST;
        self.min_round_generation = 0;
        self.max_round_generation = 0;
        self.min_generation_non_ancient = 0;
        self.last_decided_judges.clear();
        self.thresholds = Arc::new(RoundThresholds::default());
    }

    fn publish_min_round_generation(&mut self, value: u64) -> Result<()> {
        check_not_regressed("min_round_generation", self.min_round_generation, value)?;
        self.min_round_generation = value;
        self.thresholds
            .min_round_generation
            .store(value, Ordering::Release);
        Ok(())
    }

    fn publish_max_round_generation(&mut self, value: u64) -> Result<()> {
        check_not_regressed("max_round_generation", self.max_round_generation, value)?;
        self.max_round_generation = value;
        self.thresholds
            .max_round_generation
            .store(value, Ordering::Release);
        Ok(())
    }

    fn publish_min_generation_non_ancient(&mut self, value: u64) -> Result<()> {
        check_not_regressed(
            "min_generation_non_ancient",
            self.min_generation_non_ancient,
            value,
        )?;
        self.min_generation_non_ancient = value;
        self.thresholds
            .min_generation_non_ancient
            .store(value, Ordering::Release);
        Ok(())
    }
}

fn check_not_regressed(name: &'static str, current: u64, attempted: u64) -> Result<()> {
    if attempted < current {
        return Err(ConsensusError::ThresholdRegressed {
            name,
            current,
            attempted,
        });
    }
    Ok(())
}
