//! Weighted participant table.
//!
//! Maps every participant allowed to create events to a dense index and a
//! voting weight. Supermajority checks for strongly-seeing and for voting
//! are made against the table's total weight.

use {
    solana_pubkey::Pubkey,
    std::collections::HashMap,
};

/// A single participant with its voting weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub pubkey: Pubkey,
    pub weight: u64,
}

/// Returns true if `part` is strictly more than two thirds of `total`.
pub fn is_super_majority(part: u64, total: u64) -> bool {
    u128::from(part) * 3 > u128::from(total) * 2
}

/// An immutable, ordered table of participants.
///
/// Participants are sorted by pubkey so that every node assigns the same
/// index to the same creator. Zero-weight participants are kept: they may
/// create events and relay votes, they just never count toward a
/// supermajority.
#[derive(Debug, Clone)]
pub struct WeightTable {
    /// Participants sorted by pubkey (ascending).
    participants: Vec<Participant>,
    /// Fast lookup from pubkey to index in the participants vec.
    index: HashMap<Pubkey, usize>,
    /// Sum of all participant weights.
    total_weight: u64,
}

impl WeightTable {
    /// Create a table from (pubkey, weight) pairs. A pubkey listed twice keeps
    /// its last weight.
    pub fn new(participants: Vec<(Pubkey, u64)>) -> Self {
        let deduped: HashMap<Pubkey, u64> = participants.into_iter().collect();
        let mut participants: Vec<Participant> = deduped
            .into_iter()
            .map(|(pubkey, weight)| Participant { pubkey, weight })
            .collect();
        participants.sort_by(|a, b| a.pubkey.cmp(&b.pubkey));

        let total_weight = participants
            .iter()
            .fold(0u64, |sum, p| sum.saturating_add(p.weight));
        let index = participants
            .iter()
            .enumerate()
            .map(|(i, p)| (p.pubkey, i))
            .collect();

        Self {
            participants,
            index,
            total_weight,
        }
    }

    /// Create a table where every participant has weight 1.
    pub fn new_equal(pubkeys: &[Pubkey]) -> Self {
        Self::new(pubkeys.iter().map(|pubkey| (*pubkey, 1)).collect())
    }

    /// Returns the number of participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Returns total weight across all participants.
    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Returns the participant at the given index.
    pub fn get(&self, index: usize) -> Option<&Participant> {
        self.participants.get(index)
    }

    /// Look up a participant's index by pubkey.
    pub fn index_of(&self, pubkey: &Pubkey) -> Option<usize> {
        self.index.get(pubkey).copied()
    }

    /// Returns the weight of the participant at `index`, or 0 if out of range.
    pub fn weight(&self, index: usize) -> u64 {
        self.participants.get(index).map_or(0, |p| p.weight)
    }

    /// Returns the weight of a participant, or 0 if not in the table.
    pub fn weight_of(&self, pubkey: &Pubkey) -> u64 {
        self.index_of(pubkey).map_or(0, |i| self.weight(i))
    }

    /// Check whether a participant is in the table.
    pub fn contains(&self, pubkey: &Pubkey) -> bool {
        self.index.contains_key(pubkey)
    }

    /// Returns true if `weight` is a supermajority of the table's total.
    pub fn is_super_majority(&self, weight: u64) -> bool {
        is_super_majority(weight, self.total_weight)
    }

    /// Sum the weight of the participants at the given indices.
    pub fn weight_of_indices(&self, indices: impl IntoIterator<Item = usize>) -> u64 {
        indices
            .into_iter()
            .fold(0u64, |sum, i| sum.saturating_add(self.weight(i)))
    }

    /// Returns an iterator over all participants in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter()
    }

    /// Returns all participant pubkeys in index order.
    pub fn pubkeys(&self) -> Vec<Pubkey> {
        self.participants.iter().map(|p| p.pubkey).collect()
    }
}
