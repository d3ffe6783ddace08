//! The hashgraph consensus engine.
//!
//! Events are fed in topological order through [`ConsensusEngine::add_event`].
//! Each event gets a round created, witnesses of the round being elected
//! become candidates, and witnesses of later rounds vote on them. Once every
//! candidate of that round has a decided fame, the round's judges fix the
//! set of events that reach consensus and their order.
//!
//! Only one round is elected at a time. Deciding it changes which events are
//! consensus and which are ancient, so every recent event is recalculated
//! against the new state, which may in turn decide the next round.
//!
//! The engine is deterministic and performs no I/O: given the same events in
//! any topological order it produces the same rounds.

use {
    crate::{
        ancestors::AncestorSearch,
        config::ConsensusConfig,
        error::{ConsensusError, Result},
        event_graph::{EventGraph, EventIdx, EventNode, EventView},
        ordering::{self, OrderKey},
        round_info::Judge,
        rounds::{RoundRegistry, RoundThresholds},
        types::{
            CoinRoundStats, CompletedRound, ConsensusEvent, ConsensusSnapshot, EventWindow,
            GossipEvent, Round, VoteResult, ROUND_FIRST, ROUND_NEGATIVE_INFINITY,
        },
        weight_table::WeightTable,
    },
    log::*,
    solana_hash::Hash,
    std::{collections::HashSet, sync::Arc},
};

/// Judges of a loaded snapshot that have not been seen again yet.
#[derive(Debug)]
struct InitJudges {
    round: Round,
    missing: HashSet<Hash>,
    found: Vec<EventIdx>,
}

/// The hashgraph consensus engine.
///
/// Not reentrant: callers serialize access. Thresholds can be polled from
/// other threads through [`ConsensusEngine::thresholds`].
#[derive(Debug)]
pub struct ConsensusEngine {
    /// Configuration parameters.
    config: ConsensusConfig,
    /// Participants and their voting weight.
    weights: WeightTable,
    /// Every retained event with its consensus metadata.
    graph: EventGraph,
    /// Per-round records and generation thresholds.
    rounds: RoundRegistry,
    /// Non-consensus, non-ancient events in insertion order.
    recent_events: Vec<EventIdx>,
    /// Consensus order the next consensus event receives.
    num_consensus: u64,
    /// Timestamp of the last transaction that reached consensus.
    last_consensus_time: Option<u64>,
    /// Present between a snapshot load and the return of all its judges.
    init_judges: Option<InitJudges>,
    coin_stats: CoinRoundStats,
    search: AncestorSearch,
}

impl ConsensusEngine {
    /// Create an engine at genesis.
    pub fn new(config: ConsensusConfig, weights: WeightTable) -> Result<Self> {
        config.validate()?;
        if weights.is_empty() {
            return Err(ConsensusError::EmptyWeightTable);
        }
        if weights.total_weight() == 0 {
            return Err(ConsensusError::ZeroTotalWeight);
        }
        let rounds = RoundRegistry::new(&config, weights.len());
        Ok(Self {
            config,
            weights,
            graph: EventGraph::new(),
            rounds,
            recent_events: Vec::new(),
            num_consensus: 0,
            last_consensus_time: None,
            init_judges: None,
            coin_stats: CoinRoundStats::default(),
            search: AncestorSearch::new(),
        })
    }

    // -- Public API --

    /// Add a validated event whose parents, if still known, were already
    /// added. Returns every round decided as a consequence, oldest first.
    pub fn add_event(&mut self, event: GossipEvent) -> Result<Vec<CompletedRound>> {
        let creator_index =
            self.weights
                .index_of(&event.creator)
                .ok_or(ConsensusError::UnknownCreator {
                    hash: event.hash,
                    creator: event.creator,
                })?;
        let hash = event.hash;
        let idx = self.graph.insert(event, creator_index)?;
        self.recent_events.push(idx);

        let mut completed = Vec::new();
        let first = if self.record_init_judge(idx, hash) {
            self.recalculate_and_vote()?
        } else {
            self.calculate_and_vote(idx)?
        };
        let Some(round) = first else {
            return Ok(completed);
        };
        completed.push(round);
        while let Some(round) = self.recalculate_and_vote()? {
            completed.push(round);
        }
        Ok(completed)
    }

    /// Restart from a decided round. Clears all state; events must be
    /// replayed afterwards. Consensus output resumes once every judge named
    /// by the snapshot has been added again.
    pub fn load_snapshot(&mut self, snapshot: &ConsensusSnapshot) -> Result<()> {
        validate_snapshot(snapshot)?;
        self.reset();
        self.rounds.load_snapshot(snapshot)?;
        self.num_consensus = snapshot.next_consensus_order;
        self.last_consensus_time = snapshot.last_consensus_timestamp_nanos;

        let missing: HashSet<Hash> = snapshot.judges.iter().copied().collect();
        if missing.len() != snapshot.judges.len() {
            warn!(
                "Snapshot for round {} lists {} duplicate judge hash(es), ignoring them",
                snapshot.round,
                snapshot.judges.len().saturating_sub(missing.len())
            );
        }
        info!(
            "Loaded snapshot at round {}: {} judges, next consensus order {}",
            snapshot.round,
            missing.len(),
            snapshot.next_consensus_order
        );
        self.init_judges = Some(InitJudges {
            round: snapshot.round,
            missing,
            found: Vec::new(),
        });
        Ok(())
    }

    /// Fails if a loaded snapshot still has judges that were never added.
    pub fn check_snapshot_recovered(&self) -> Result<()> {
        match &self.init_judges {
            Some(init) => Err(ConsensusError::SnapshotJudgesMissing {
                round: init.round,
                missing: init.missing.len(),
            }),
            None => Ok(()),
        }
    }

    /// Drop every event and start over from genesis. Threshold handles taken
    /// before the reset stop updating.
    pub fn reset(&mut self) {
        self.graph.clear();
        self.rounds.clear();
        self.recent_events.clear();
        self.num_consensus = 0;
        self.last_consensus_time = None;
        self.init_judges = None;
        self.coin_stats = CoinRoundStats::default();
    }

    // -- Accessors --

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn weights(&self) -> &WeightTable {
        &self.weights
    }

    /// Highest round with a round record.
    pub fn max_round(&self) -> Round {
        self.rounds.max_round()
    }

    /// Every round below this one has been decided.
    pub fn fame_decided_below(&self) -> Round {
        self.rounds.fame_decided_below()
    }

    pub fn min_generation_non_ancient(&self) -> u64 {
        self.rounds.min_generation_non_ancient()
    }

    pub fn min_round_generation(&self) -> u64 {
        self.rounds.min_round_generation()
    }

    pub fn max_round_generation(&self) -> u64 {
        self.rounds.max_round_generation()
    }

    /// Lock-free threshold view for other threads.
    pub fn thresholds(&self) -> Arc<RoundThresholds> {
        self.rounds.thresholds()
    }

    /// Number of events that have reached consensus, including those before
    /// a loaded snapshot.
    pub fn num_consensus(&self) -> u64 {
        self.num_consensus
    }

    pub fn last_consensus_timestamp_nanos(&self) -> Option<u64> {
        self.last_consensus_time
    }

    pub fn coin_round_stats(&self) -> CoinRoundStats {
        self.coin_stats
    }

    /// Number of events currently retained.
    pub fn event_count(&self) -> usize {
        self.graph.len()
    }

    /// Number of events still taking part in round computation.
    pub fn recent_event_count(&self) -> usize {
        self.recent_events.len()
    }

    /// Consensus state of a retained event.
    pub fn event(&self, hash: &Hash) -> Option<EventView<'_>> {
        self.graph.lookup(hash).and_then(|idx| self.graph.view(idx))
    }

    /// Hashes of the judges of a decided round still retained.
    pub fn judges(&self, round: Round) -> Option<Vec<Hash>> {
        self.rounds
            .get(round)
            .filter(|info| info.is_fame_decided())
            .map(|info| info.judge_hashes())
    }

    // -- Event processing --

    /// Count a snapshot judge as found. Returns true once the last one
    /// arrives and recovery has completed.
    fn record_init_judge(&mut self, idx: EventIdx, hash: Hash) -> bool {
        let Some(init) = self.init_judges.as_mut() else {
            return false;
        };
        if !init.missing.remove(&hash) {
            return false;
        }
        init.found.push(idx);
        if !init.missing.is_empty() {
            debug!(
                "Found judge {hash} of snapshot round {}, {} still missing",
                init.round,
                init.missing.len()
            );
            return false;
        }
        let Some(init) = self.init_judges.take() else {
            return false;
        };

        let min_generation = self.rounds.min_generation_non_ancient();
        let common = self
            .search
            .common_ancestors(&self.graph, &init.found, |node| {
                !node.meta.is_consensus && node.generation() >= min_generation
            });
        for ancestor in &common {
            if let Some(meta) = self.graph.meta_mut(*ancestor) {
                meta.is_consensus = true;
                meta.retire();
            }
        }
        self.rounds.set_last_decided_judges(init.found.iter().copied());
        info!(
            "Recovered all {} judges of snapshot round {}, {} events already had consensus",
            init.found.len(),
            init.round,
            common.len()
        );
        true
    }

    /// Recompute every recent event from scratch against the current
    /// decided rounds. Stops at the first round this decides.
    fn recalculate_and_vote(&mut self) -> Result<Option<CompletedRound>> {
        let min_generation = self.rounds.min_generation_non_ancient();
        let graph = &mut self.graph;
        let mut stale = 0usize;
        self.recent_events.retain(|idx| {
            let Some(node) = graph.get_mut(*idx) else {
                return false;
            };
            if node.meta.is_consensus {
                return false;
            }
            if node.generation() < min_generation {
                node.meta.retire();
                stale = stale.saturating_add(1);
                return false;
            }
            true
        });
        if stale > 0 {
            debug!("{stale} event(s) became ancient without reaching consensus");
        }

        self.rounds.reset_undecided();
        let fame_decided_below = self.rounds.fame_decided_below();
        for idx in &self.recent_events {
            if let Some(meta) = self.graph.meta_mut(*idx) {
                meta.clear_round_state(fame_decided_below);
            }
        }
        for idx in self.recent_events.clone() {
            if let Some(round) = self.calculate_and_vote(idx)? {
                return Ok(Some(round));
            }
        }
        Ok(None)
    }

    /// Assign `x` its round, register it if it is a witness of a round still
    /// being elected, and decide the election round if it is ready.
    fn calculate_and_vote(&mut self, x: EventIdx) -> Result<Option<CompletedRound>> {
        let round = self.round(Some(x));
        let self_parent = self.graph.parents(x).0;
        let is_witness = round != ROUND_NEGATIVE_INFINITY && round > self.round(self_parent);

        // memoize everything later events will ask of x
        self.last_see(Some(x), 0);
        self.strongly_see_p(Some(x), 0);
        self.first_self_witness_s(Some(x));
        self.first_witness_s(Some(x));

        if let Some(meta) = self.graph.meta_mut(x) {
            meta.is_witness = is_witness;
        }
        trace!("Event {x:?} has round {round}, witness: {is_witness}");

        let election_round = self.rounds.fame_decided_below();
        if is_witness && round >= election_round {
            self.rounds.add_witness(round, x);
            if round == election_round {
                self.add_candidate(x, round)?;
            } else {
                self.vote_in_all_elections(x, round)?;
            }
        }
        self.decide_round_if_ready()
    }

    fn add_candidate(&mut self, candidate: EventIdx, round: Round) -> Result<()> {
        let num_participants = self.weights.len();
        // a witness of round + 2 already exists: too late to be famous
        let too_late = self
            .rounds
            .get(round.saturating_add(2))
            .is_some_and(|info| info.has_witnesses());
        self.rounds
            .get_mut(round)
            .ok_or(ConsensusError::MissingRoundInfo(round))?
            .add_candidate(candidate, num_participants);
        debug!("Witness {candidate:?} is a candidate in round {round}");
        if too_late {
            self.set_famous(candidate, round, false)?;
        }
        Ok(())
    }

    /// Cast `voter`'s vote in every open election of the round being decided.
    fn vote_in_all_elections(&mut self, voter: EventIdx, voter_round: Round) -> Result<()> {
        let election_round = self.rounds.fame_decided_below();
        let age = voter_round.saturating_sub(election_round);
        if age <= 0 {
            return Ok(());
        }
        let num_participants = self.weights.len();
        let Some(info) = self.rounds.get_mut(election_round) else {
            return Ok(());
        };
        let elections = info.election_row(age, num_participants);
        let Some(voter_node) = self.graph.get(voter) else {
            return Ok(());
        };
        let voter_index = voter_node.creator_index;
        let coin = ordering::coin(&voter_node.event.signature);

        for (election, candidate, prev_round) in elections {
            let open = self
                .rounds
                .get(election_round)
                .is_some_and(|info| info.num_unknown_fame() > 0);
            if !open {
                break;
            }
            if self.graph.get(candidate).is_none_or(|node| node.meta.fame_decided) {
                continue;
            }

            let result = if age == 1 {
                VoteResult::Undecided(self.sees_candidate(voter, voter_round, candidate))
            } else {
                let Some(prev_round) = prev_round else {
                    continue;
                };
                self.count_votes(voter, age, prev_round, election_round, coin)
            };
            if let Some(info) = self.rounds.get_mut(election_round) {
                info.set_vote(election, voter_index, result.vote());
            }
            if result.is_decided() {
                self.set_famous(candidate, election_round, result.vote())?;
            }
        }
        Ok(())
    }

    /// First-round vote: whether the earliest witness by the candidate's
    /// creator that `voter` sees in the candidate's round is the candidate.
    fn sees_candidate(&mut self, voter: EventIdx, voter_round: Round, candidate: EventIdx) -> bool {
        let Some(candidate_creator) = self.creator_index(candidate) else {
            return false;
        };
        let mut seen = self.first_see(Some(voter), candidate_creator);
        while let Some(witness) = seen {
            let self_parent = self.graph.parents(witness).0;
            if self.round(Some(witness)) <= voter_round.saturating_sub(1) {
                break;
            }
            let Some(self_parent) = self_parent else {
                break;
            };
            seen = self.first_self_witness_s(Some(self_parent));
        }
        seen == Some(candidate)
    }

    /// Later-round vote: the weighted majority of the previous round's votes
    /// among the witnesses `voter` strongly sees.
    fn count_votes(
        &mut self,
        voter: EventIdx,
        age: i64,
        prev_round: usize,
        election_round: Round,
        coin: bool,
    ) -> VoteResult {
        let mut yes = 0u64;
        let mut no = 0u64;
        for m in 0..self.weights.len() {
            if self.strongly_see_s1(Some(voter), m).is_none() {
                continue;
            }
            let previous = self
                .rounds
                .get(election_round)
                .and_then(|info| info.votes(prev_round))
                .and_then(|votes| votes.get(m).copied())
                .unwrap_or(false);
            let weight = self.weights.weight(m);
            if previous {
                yes = yes.saturating_add(weight);
            } else {
                no = no.saturating_add(weight);
            }
        }
        let majority = yes >= no;
        let super_majority =
            self.weights.is_super_majority(yes) || self.weights.is_super_majority(no);

        if self.config.is_coin_round(age) {
            self.coin_stats.votes = self.coin_stats.votes.saturating_add(1);
            let vote = if super_majority {
                majority
            } else if self.config.is_forced_true_coin_round(age) {
                self.coin_stats.forced_true = self.coin_stats.forced_true.saturating_add(1);
                true
            } else {
                self.coin_stats.coin_flips = self.coin_stats.coin_flips.saturating_add(1);
                coin
            };
            VoteResult::Undecided(vote)
        } else if super_majority {
            VoteResult::Decided(majority)
        } else {
            VoteResult::Undecided(majority)
        }
    }

    fn set_famous(&mut self, candidate: EventIdx, round: Round, famous: bool) -> Result<()> {
        let Some(node) = self.graph.get_mut(candidate) else {
            return Ok(());
        };
        node.meta.fame_decided = true;
        node.meta.is_famous = famous;
        node.meta.fame_round = Some(round);
        let creator_index = node.creator_index;
        let judge = famous.then(|| Judge {
            idx: candidate,
            hash: node.event.hash,
            generation: node.event.generation,
        });
        self.rounds
            .get_mut(round)
            .ok_or(ConsensusError::MissingRoundInfo(round))?
            .decide_fame(candidate, creator_index, judge);
        debug!("Witness {candidate:?} of round {round} decided famous: {famous}");
        Ok(())
    }

    fn decide_round_if_ready(&mut self) -> Result<Option<CompletedRound>> {
        if self.init_judges.is_some() {
            return Ok(None);
        }
        let round = self.rounds.fame_decided_below();
        let ready = self
            .rounds
            .get(round)
            .is_some_and(|info| info.all_fame_known());
        if !ready {
            return Ok(None);
        }
        self.finalize_round(round).map(Some)
    }

    // -- Round finalization --

    /// Fix the consensus events of a round whose fame is fully decided and
    /// advance the registry past it.
    fn finalize_round(&mut self, round: Round) -> Result<CompletedRound> {
        let info = self
            .rounds
            .get_mut(round)
            .ok_or(ConsensusError::MissingRoundInfo(round))?;
        info.set_fame_decided();
        let judges = info.judges();
        let judge_hashes = info.judge_hashes();

        let whitening = ordering::whitening(
            judges
                .iter()
                .filter_map(|judge| self.graph.get(*judge))
                .map(|node| &node.event.signature),
        );

        let min_generation = self.rounds.min_generation_non_ancient();
        let mut visited = Vec::new();
        let mut consensus = Vec::new();
        for judge in &judges {
            let reached = self.search.search(&self.graph, *judge, |node| {
                !node.meta.is_consensus && node.generation() >= min_generation
            });
            for ancestor in reached {
                let Some(meta) = self.graph.meta_mut(ancestor.idx) else {
                    continue;
                };
                if meta.received_times.is_empty() {
                    visited.push(ancestor.idx);
                }
                meta.received_times.push(ancestor.time_reached_nanos);
                if meta.received_times.len() == judges.len() {
                    meta.received_times.sort_unstable();
                    meta.is_consensus = true;
                    meta.round_received = Some(round);
                    meta.consensus_timestamp_nanos = ordering::median(&meta.received_times);
                    consensus.push(ancestor.idx);
                }
            }
        }

        let mut keys: Vec<(OrderKey, EventIdx)> = consensus
            .iter()
            .filter_map(|idx| {
                let node = self.graph.get(*idx)?;
                Some((
                    OrderKey {
                        consensus_timestamp_nanos: node.meta.consensus_timestamp_nanos?,
                        received_times: node.meta.received_times.clone(),
                        generation: node.generation(),
                        hash: node.event.hash,
                    },
                    *idx,
                ))
            })
            .collect();
        keys.sort_by(|(a, _), (b, _)| ordering::compare_consensus_order(a, b, &whitening));

        let events = self.assign_consensus_order(round, &keys, &judges);

        for idx in visited {
            if let Some(node) = self.graph.get_mut(idx) {
                node.meta.received_times = Vec::new();
                if node.meta.is_consensus {
                    node.meta.retire();
                }
            }
        }

        self.rounds
            .set_fame_decided_below(round.saturating_add(1), judges.iter().copied())?;
        let expired_rounds = self.rounds.delete_expired_rounds()?;
        let expired_events = self
            .graph
            .remove_below_generation(self.rounds.min_round_generation());

        info!(
            "Round {round} decided: {} judges, {} consensus events, {} expired rounds, {} expired events",
            judges.len(),
            events.len(),
            expired_rounds,
            expired_events
        );

        Ok(CompletedRound {
            round,
            events,
            window: EventWindow {
                latest_consensus_round: round,
                min_generation_non_ancient: self.rounds.min_generation_non_ancient(),
                min_round_generation: self.rounds.min_round_generation(),
            },
            snapshot: ConsensusSnapshot {
                round,
                judges: judge_hashes,
                min_generations: self.rounds.min_generations(),
                next_consensus_order: self.num_consensus,
                last_consensus_timestamp_nanos: self.last_consensus_time,
            },
        })
    }

    /// Number the sorted consensus events and space their timestamps so every
    /// transaction gets a unique, increasing time.
    fn assign_consensus_order(
        &mut self,
        round: Round,
        sorted: &[(OrderKey, EventIdx)],
        judges: &[EventIdx],
    ) -> Vec<ConsensusEvent> {
        let incr = self.config.min_trans_timestamp_incr_nanos;
        if sorted.is_empty() {
            self.last_consensus_time = Some(match self.last_consensus_time {
                Some(last) => ordering::calc_min_timestamp_for_next_event(last, incr),
                None => {
                    let mut created: Vec<u64> = judges
                        .iter()
                        .filter_map(|judge| self.graph.get(*judge))
                        .map(|node| node.event.time_created_nanos)
                        .collect();
                    created.sort_unstable();
                    ordering::median(&created).unwrap_or(0)
                }
            });
            return Vec::new();
        }

        let mut events = Vec::with_capacity(sorted.len());
        for (position, (key, idx)) in sorted.iter().enumerate() {
            let Some(node) = self.graph.get_mut(*idx) else {
                continue;
            };
            let mut timestamp = key.consensus_timestamp_nanos;
            if let Some(last) = self.last_consensus_time {
                timestamp = timestamp.max(ordering::calc_min_timestamp_for_next_event(last, incr));
            }
            let last_in_round = position.saturating_add(1) == sorted.len();
            node.meta.consensus_order = Some(self.num_consensus);
            node.meta.consensus_timestamp_nanos = Some(timestamp);
            node.meta.last_in_round_received = last_in_round;
            self.last_consensus_time = Some(ordering::last_transaction_time(
                timestamp,
                node.event.transaction_count(),
                incr,
            ));
            events.push(ConsensusEvent {
                hash: node.event.hash,
                creator: node.event.creator,
                generation: node.event.generation,
                time_created_nanos: node.event.time_created_nanos,
                round_received: round,
                consensus_order: self.num_consensus,
                consensus_timestamp_nanos: timestamp,
                last_in_round_received: last_in_round,
                transactions: node.event.transactions.clone(),
            });
            self.num_consensus = self.num_consensus.saturating_add(1);
        }
        events
    }

    // -- Graph queries --
    //
    // Each takes `Option<EventIdx>` so a missing parent is just another
    // input. Events that are consensus or ancient (other than the judges of
    // the latest decided round) no longer take part: they have round
    // negative infinity and see nothing.

    fn creator_index(&self, idx: EventIdx) -> Option<usize> {
        self.graph.get(idx).map(|node| node.creator_index)
    }

    fn is_live(&self, idx: EventIdx) -> bool {
        self.graph.get(idx).is_some_and(|node| self.node_is_live(idx, node))
    }

    fn node_is_live(&self, idx: EventIdx, node: &EventNode) -> bool {
        (!node.meta.is_consensus && !self.rounds.is_ancient(node.generation()))
            || self.rounds.last_decided_judge_round(idx).is_some()
    }

    /// Round created of `x`.
    fn round(&mut self, x: Option<EventIdx>) -> Round {
        let Some(x) = x else {
            return ROUND_NEGATIVE_INFINITY;
        };
        if let Some(round) = self.rounds.last_decided_judge_round(x) {
            return round;
        }
        if !self.is_live(x) {
            return ROUND_NEGATIVE_INFINITY;
        }
        if let Some(round) = self.graph.get(x).and_then(|node| node.meta.round_created) {
            return round;
        }
        let round = self.compute_round(x);
        if let Some(meta) = self.graph.meta_mut(x) {
            meta.round_created = Some(round);
        }
        round
    }

    fn compute_round(&mut self, x: EventIdx) -> Round {
        let has_parents = self
            .graph
            .get(x)
            .is_some_and(|node| node.event.has_parents());
        if !has_parents {
            return ROUND_FIRST;
        }
        let (self_parent, other_parent) = self.graph.parents(x);
        let rsp = self.round(self_parent);
        let rop = self.round(other_parent);
        if rsp != rop {
            return rsp.max(rop);
        }
        if rsp == ROUND_NEGATIVE_INFINITY {
            return ROUND_NEGATIVE_INFINITY;
        }
        let mut weight = 0u64;
        for m in 0..self.weights.len() {
            if self.strongly_see_p(Some(x), m).is_some() {
                weight = weight.saturating_add(self.weights.weight(m));
            }
        }
        if self.weights.is_super_majority(weight) {
            rsp.saturating_add(1)
        } else {
            rsp
        }
    }

    /// Highest round among the parents of `x`.
    fn parent_round(&mut self, x: Option<EventIdx>) -> Round {
        let Some(x) = x else {
            return ROUND_NEGATIVE_INFINITY;
        };
        let (self_parent, other_parent) = self.graph.parents(x);
        let rsp = self.round(self_parent);
        let rop = self.round(other_parent);
        rsp.max(rop)
    }

    /// Latest event by creator `m` that `x` descends from.
    fn last_see(&mut self, x: Option<EventIdx>, m: usize) -> Option<EventIdx> {
        let x = x.filter(|x| self.is_live(*x))?;
        if let Some(memo) = self.graph.get(x).and_then(|node| node.meta.last_see.as_ref()) {
            return memo.get(m).copied().flatten();
        }
        let table = self.compute_last_see(x);
        let result = table.get(m).copied().flatten();
        if let Some(meta) = self.graph.meta_mut(x) {
            meta.last_see = Some(table);
        }
        result
    }

    fn compute_last_see(&mut self, x: EventIdx) -> Vec<Option<EventIdx>> {
        let creator = self.creator_index(x);
        let (self_parent, other_parent) = self.graph.parents(x);
        let num_participants = self.weights.len();
        let mut table = Vec::with_capacity(num_participants);
        for m in 0..num_participants {
            let seen = if creator == Some(m) {
                Some(x)
            } else if self_parent.is_none() && other_parent.is_none() {
                None
            } else {
                let lsop = self.last_see(other_parent, m);
                let lssp = self.last_see(self_parent, m);
                let prefer_other = self.round(lsop) > self.round(lssp)
                    || (self.generation_of(lsop) > self.generation_of(lssp)
                        && self.first_see(other_parent, m) == self.first_see(self_parent, m));
                if prefer_other {
                    lsop
                } else {
                    lssp
                }
            };
            table.push(seen);
        }
        table
    }

    fn generation_of(&self, x: Option<EventIdx>) -> u64 {
        x.and_then(|x| self.graph.get(x))
            .map_or(0, EventNode::generation)
    }

    /// The witness by `m` that `x` sees through the latest event by `m2`.
    fn see_thru(&mut self, x: Option<EventIdx>, m: usize, m2: usize) -> Option<EventIdx> {
        let x = x?;
        if m == m2 && self.creator_index(x) == Some(m2) {
            let self_parent = self.graph.parents(x).0;
            return self.first_self_witness_s(self_parent);
        }
        let through = self.last_see(Some(x), m2);
        self.first_see(through, m)
    }

    /// The witness by `m` in the parent round of `x` that `x` strongly sees.
    fn strongly_see_p(&mut self, x: Option<EventIdx>, m: usize) -> Option<EventIdx> {
        let x = x.filter(|x| self.is_live(*x))?;
        if let Some(memo) = self
            .graph
            .get(x)
            .and_then(|node| node.meta.strongly_see.as_ref())
        {
            return memo.get(m).copied().flatten();
        }
        let table = self.compute_strongly_see_p(x);
        let result = table.get(m).copied().flatten();
        if let Some(meta) = self.graph.meta_mut(x) {
            meta.strongly_see = Some(table);
        }
        result
    }

    fn compute_strongly_see_p(&mut self, x: EventIdx) -> Vec<Option<EventIdx>> {
        let (self_parent, other_parent) = self.graph.parents(x);
        let prx = self.parent_round(Some(x));
        let prsp = self.parent_round(self_parent);
        let prop = self.parent_round(other_parent);
        let num_participants = self.weights.len();

        let mut table = Vec::with_capacity(num_participants);
        for m in 0..num_participants {
            let via_self_parent = self.strongly_see_p(self_parent, m);
            if via_self_parent.is_some() && prx == prsp {
                table.push(via_self_parent);
                continue;
            }
            let via_other_parent = self.strongly_see_p(other_parent, m);
            if via_other_parent.is_some() && prx == prop {
                table.push(via_other_parent);
                continue;
            }
            let canonical = self.see_thru(Some(x), m, m);
            if self.round(canonical) != prx {
                table.push(None);
                continue;
            }
            let mut weight = 0u64;
            for m3 in 0..num_participants {
                if self.see_thru(Some(x), m, m3) == canonical {
                    weight = weight.saturating_add(self.weights.weight(m3));
                }
            }
            table.push(canonical.filter(|_| self.weights.is_super_majority(weight)));
        }
        table
    }

    /// The witness by `m` in the previous round that `x`'s round's first
    /// witness strongly sees.
    fn strongly_see_s1(&mut self, x: Option<EventIdx>, m: usize) -> Option<EventIdx> {
        let first_witness = self.first_witness_s(x);
        self.strongly_see_p(first_witness, m)
    }

    /// The first witness among the self-ancestors of the latest event by `m`
    /// that `x` sees.
    fn first_see(&mut self, x: Option<EventIdx>, m: usize) -> Option<EventIdx> {
        let seen = self.last_see(x, m);
        self.first_self_witness_s(seen)
    }

    /// The witness on `x`'s self-parent chain that starts `x`'s round.
    fn first_self_witness_s(&mut self, x: Option<EventIdx>) -> Option<EventIdx> {
        let mut walked = Vec::new();
        let mut cursor = x;
        let result = loop {
            let Some(current) = cursor.filter(|c| self.is_live(*c)) else {
                break None;
            };
            if let Some(memo) = self
                .graph
                .get(current)
                .and_then(|node| node.meta.first_self_witness)
            {
                break memo;
            }
            walked.push(current);
            let self_parent = self.graph.parents(current).0;
            if self.round(Some(current)) > self.round(self_parent) {
                break Some(current);
            }
            cursor = self_parent;
        };
        for idx in walked {
            if let Some(meta) = self.graph.meta_mut(idx) {
                meta.first_self_witness = Some(result);
            }
        }
        result
    }

    /// The earliest witness of `x`'s round that `x` descends from, following
    /// the parent that shares `x`'s round.
    fn first_witness_s(&mut self, x: Option<EventIdx>) -> Option<EventIdx> {
        let mut walked = Vec::new();
        let mut cursor = x;
        let result = loop {
            let Some(current) = cursor.filter(|c| self.is_live(*c)) else {
                break None;
            };
            if let Some(memo) = self
                .graph
                .get(current)
                .and_then(|node| node.meta.first_witness)
            {
                break memo;
            }
            walked.push(current);
            let round = self.round(Some(current));
            if round > self.parent_round(Some(current)) {
                break Some(current);
            }
            let (self_parent, other_parent) = self.graph.parents(current);
            cursor = if round == self.round(self_parent) {
                self_parent
            } else {
                other_parent
            };
        };
        for idx in walked {
            if let Some(meta) = self.graph.meta_mut(idx) {
                meta.first_witness = Some(result);
            }
        }
        result
    }
}

/// Reject snapshots that cannot describe a decided round.
fn validate_snapshot(snapshot: &ConsensusSnapshot) -> Result<()> {
    if snapshot.round < ROUND_FIRST {
        return Err(ConsensusError::MalformedSnapshot(format!(
            "round {} is before the first round",
            snapshot.round
        )));
    }
    if snapshot.judges.is_empty() {
        return Err(ConsensusError::MalformedSnapshot(
            "no judges".to_string(),
        ));
    }
    let ascending = snapshot
        .min_generations
        .windows(2)
        .all(|pair| pair[0].0 < pair[1].0);
    if !ascending {
        return Err(ConsensusError::MalformedSnapshot(
            "min generations are not strictly ascending by round".to_string(),
        ));
    }
    match snapshot.min_generations.last() {
        Some((last, _)) if *last == snapshot.round => Ok(()),
        Some((last, _)) => Err(ConsensusError::MalformedSnapshot(format!(
            "min generations end at round {last}, expected {}",
            snapshot.round
        ))),
        None => Err(ConsensusError::MalformedSnapshot(
            "no min generations".to_string(),
        )),
    }
}
