//! Per-round bookkeeping and the election grid.
//!
//! A [`RoundInfo`] records the witnesses of one round and, once their fame is
//! known, the round's judges. While the round is the one being decided it
//! also owns the grid of in-flight elections: one [`ElectionRound`] per
//! undecided candidate per voting age. Nodes live in an arena and are linked
//! by index in four directions:
//!
//! ```text
//!            candidate c1      candidate c2      candidate c3
//!  age 1  ->   [e] <-------->   [e] <-------->   [e]        (prev/next election)
//!               ^                ^                ^
//!               v                v                v          (prev/next round)
//!  age 2  ->   [e] <-------->   [e] <-------->   [e]
//! ```
//!
//! Deciding a candidate unlinks its whole column.

use {
    crate::{event_graph::EventIdx, types::Round},
    solana_hash::Hash,
    std::collections::HashMap,
};

pub(crate) type ElectionId = usize;

/// One candidate's election at one voting age.
#[derive(Debug, Clone)]
pub(crate) struct ElectionRound {
    pub candidate: EventIdx,
    /// Voting round minus the candidate's round.
    pub age: i64,
    /// Vote of each participant's witness at this age, indexed by creator.
    pub votes: Vec<bool>,
    pub prev_round: Option<ElectionId>,
    pub next_round: Option<ElectionId>,
    pub prev_election: Option<ElectionId>,
    pub next_election: Option<ElectionId>,
}

/// A famous witness selected as its creator's judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Judge {
    pub idx: EventIdx,
    pub hash: Hash,
    pub generation: u64,
}

/// Bookkeeping for one round.
#[derive(Debug, Clone)]
pub struct RoundInfo {
    round: Round,
    fame_decided: bool,
    /// Witnesses in registration order.
    witnesses: Vec<EventIdx>,
    /// Candidates whose fame is still open, in registration order.
    undecided: Vec<EventIdx>,
    num_unknown_fame: usize,
    /// Unique famous witness per creator index.
    judges: Vec<Option<Judge>>,
    /// Minimum generation of the judges, `None` until the first judge.
    min_generation: Option<u64>,

    elections: Vec<ElectionRound>,
    /// Head of the row for each age, `row_heads[age - 1]`.
    row_heads: Vec<Option<ElectionId>>,
    /// First (age 1) election of each candidate with an open column.
    columns: HashMap<EventIdx, ElectionId>,
}

impl RoundInfo {
    pub fn new(round: Round, num_participants: usize) -> Self {
        Self {
            round,
            fame_decided: false,
            witnesses: Vec::new(),
            undecided: Vec::new(),
            num_unknown_fame: 0,
            judges: vec![None; num_participants],
            min_generation: None,
            elections: Vec::new(),
            row_heads: Vec::new(),
            columns: HashMap::new(),
        }
    }

    /// A decided round known only by its minimum judge generation, as
    /// restored from a snapshot.
    pub fn decided_from_snapshot(round: Round, min_generation: u64, num_participants: usize) -> Self {
        let mut info = Self::new(round, num_participants);
        info.fame_decided = true;
        info.min_generation = Some(min_generation);
        info
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn is_fame_decided(&self) -> bool {
        self.fame_decided
    }

    pub fn set_fame_decided(&mut self) {
        self.fame_decided = true;
    }

    pub fn witnesses(&self) -> &[EventIdx] {
        &self.witnesses
    }

    pub fn has_witnesses(&self) -> bool {
        !self.witnesses.is_empty()
    }

    pub fn num_unknown_fame(&self) -> usize {
        self.num_unknown_fame
    }

    /// True once at least one witness is known and every candidate's fame is
    /// settled.
    pub fn all_fame_known(&self) -> bool {
        self.has_witnesses() && self.num_unknown_fame == 0
    }

    pub fn min_generation(&self) -> Option<u64> {
        self.min_generation
    }

    /// Judges ordered by creator index.
    pub fn judges(&self) -> Vec<EventIdx> {
        self.judges.iter().flatten().map(|judge| judge.idx).collect()
    }

    pub fn judge_hashes(&self) -> Vec<Hash> {
        self.judges.iter().flatten().map(|judge| judge.hash).collect()
    }

    pub fn add_witness(&mut self, witness: EventIdx) {
        self.witnesses.push(witness);
    }

    /// Open an election for a witness of this round. If voting has already
    /// started, the candidate joins the first row so later voters see it.
    pub fn add_candidate(&mut self, candidate: EventIdx, num_participants: usize) {
        self.num_unknown_fame = self.num_unknown_fame.saturating_add(1);
        self.undecided.push(candidate);
        if self.row_heads.first().is_some() {
            self.push_election(candidate, 1, None, num_participants);
        }
    }

    /// Record a candidate's fame. Famous candidates become their creator's
    /// judge unless a fork with a smaller hash already holds the slot.
    pub(crate) fn decide_fame(&mut self, candidate: EventIdx, creator_index: usize, judge: Option<Judge>) {
        let Some(position) = self.undecided.iter().position(|c| *c == candidate) else {
            return;
        };
        self.undecided.remove(position);
        self.num_unknown_fame = self.num_unknown_fame.saturating_sub(1);
        self.unlink_column(candidate);

        if let (Some(judge), Some(slot)) = (judge, self.judges.get_mut(creator_index)) {
            let replace = slot.as_ref().is_none_or(|current| judge.hash < current.hash);
            if replace {
                *slot = Some(judge);
                self.min_generation = self.judges.iter().flatten().map(|j| j.generation).min();
            }
        }
    }

    /// Elections at `age` as `(election, candidate, previous-age election)`,
    /// creating the row (and any missing rows before it) on first use.
    pub(crate) fn election_row(
        &mut self,
        age: i64,
        num_participants: usize,
    ) -> Vec<(ElectionId, EventIdx, Option<ElectionId>)> {
        let Some(row) = usize::try_from(age).ok().filter(|row| *row >= 1) else {
            return Vec::new();
        };
        while self.row_heads.len() < row {
            self.build_next_row(num_participants);
        }
        let mut out = Vec::new();
        let mut cursor = self.row_heads.get(row - 1).copied().flatten();
        while let Some(id) = cursor {
            let Some(election) = self.elections.get(id) else {
                break;
            };
            out.push((id, election.candidate, election.prev_round));
            cursor = election.next_election;
        }
        out
    }

    /// Votes cast at one election, indexed by creator.
    pub(crate) fn votes(&self, election: ElectionId) -> Option<&[bool]> {
        self.elections.get(election).map(|e| e.votes.as_slice())
    }

    pub(crate) fn set_vote(&mut self, election: ElectionId, voter_index: usize, vote: bool) {
        if let Some(slot) = self
            .elections
            .get_mut(election)
            .and_then(|e| e.votes.get_mut(voter_index))
        {
            *slot = vote;
        }
    }

    /// Number of rows created so far.
    pub fn election_rows(&self) -> usize {
        self.row_heads.len()
    }

    fn build_next_row(&mut self, num_participants: usize) {
        let age = self.row_heads.len().saturating_add(1);
        self.row_heads.push(None);
        if age == 1 {
            for candidate in self.undecided.clone() {
                self.push_election(candidate, 1, None, num_participants);
            }
            return;
        }
        let mut previous = Vec::new();
        let mut cursor = self.row_heads.get(age - 2).copied().flatten();
        while let Some(id) = cursor {
            let Some(election) = self.elections.get(id) else {
                break;
            };
            previous.push((id, election.candidate));
            cursor = election.next_election;
        }
        // pushing prepends, so walk backwards to keep the previous row's order
        for (prev_id, candidate) in previous.into_iter().rev() {
            self.push_election(candidate, age as i64, Some(prev_id), num_participants);
        }
    }

    /// Insert a new election at the head of the row for `age`.
    fn push_election(
        &mut self,
        candidate: EventIdx,
        age: i64,
        prev_round: Option<ElectionId>,
        num_participants: usize,
    ) -> ElectionId {
        let id = self.elections.len();
        let Some(row) = usize::try_from(age).ok().and_then(|a| a.checked_sub(1)) else {
            return id;
        };
        let head = self.row_heads.get(row).copied().flatten();
        self.elections.push(ElectionRound {
            candidate,
            age,
            votes: vec![false; num_participants],
            prev_round,
            next_round: None,
            prev_election: None,
            next_election: head,
        });
        if let Some(head) = head.and_then(|h| self.elections.get_mut(h)) {
            head.prev_election = Some(id);
        }
        if let Some(slot) = self.row_heads.get_mut(row) {
            *slot = Some(id);
        }
        match prev_round.and_then(|p| self.elections.get_mut(p)) {
            Some(prev) => prev.next_round = Some(id),
            None => {
                self.columns.insert(candidate, id);
            }
        }
        id
    }

    /// Remove every election of `candidate` from its row.
    fn unlink_column(&mut self, candidate: EventIdx) {
        let mut cursor = self.columns.remove(&candidate);
        while let Some(id) = cursor {
            let Some(election) = self.elections.get(id) else {
                break;
            };
            let (prev, next, age) = (election.prev_election, election.next_election, election.age);
            cursor = election.next_round;

            match prev.and_then(|p| self.elections.get_mut(p)) {
                Some(prev) => prev.next_election = next,
                None => {
                    let row = usize::try_from(age).ok().and_then(|a| a.checked_sub(1));
                    if let Some(head) = row.and_then(|r| self.row_heads.get_mut(r)) {
                        *head = next;
                    }
                }
            }
            if let Some(next) = next.and_then(|n| self.elections.get_mut(n)) {
                next.prev_election = prev;
            }
        }
    }
}
