//! Arena of events and their consensus metadata.
//!
//! Events are stored in insertion order and addressed by a stable
//! [`EventIdx`] that is never reused. Parent links are resolved to indices
//! once, at insertion. Expired events are removed from the front of the
//! arena as the generation window moves forward; a link to a removed event
//! resolves to nothing.

use {
    crate::{
        error::{ConsensusError, Result},
        types::{GossipEvent, Round, ROUND_NEGATIVE_INFINITY},
    },
    solana_hash::Hash,
    solana_pubkey::Pubkey,
    std::collections::{HashMap, VecDeque},
};

/// Stable index of an event in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventIdx(u64);

/// Mutable consensus state of one event. Owned by the engine.
#[derive(Debug, Default)]
pub(crate) struct EventMetadata {
    /// `None` until computed.
    pub round_created: Option<Round>,
    pub is_witness: bool,
    pub fame_decided: bool,
    pub is_famous: bool,
    /// Round of the election that decided `is_famous`.
    pub fame_round: Option<Round>,
    /// Per creator: the latest event by that creator this event descends from.
    pub last_see: Option<Vec<Option<EventIdx>>>,
    /// Per creator: the parent-round witness this event strongly sees.
    pub strongly_see: Option<Vec<Option<EventIdx>>>,
    /// Outer `None` means not yet computed.
    pub first_self_witness: Option<Option<EventIdx>>,
    pub first_witness: Option<Option<EventIdx>>,

    pub is_consensus: bool,
    pub round_received: Option<Round>,
    pub consensus_order: Option<u64>,
    pub consensus_timestamp_nanos: Option<u64>,
    /// Time each judge's creator first learned of this event. Only populated
    /// while its receiving round is being finalized.
    pub received_times: Vec<u64>,
    pub last_in_round_received: bool,
}

impl EventMetadata {
    /// Forget everything derived from the current round layout so it can be
    /// recomputed. Fame is kept for witnesses of rounds already decided.
    pub fn clear_round_state(&mut self, fame_decided_below: Round) {
        if self
            .fame_round
            .is_none_or(|round| round >= fame_decided_below)
        {
            self.fame_decided = false;
            self.is_famous = false;
            self.fame_round = None;
        }
        self.round_created = None;
        self.is_witness = false;
        self.last_see = None;
        self.strongly_see = None;
        self.first_self_witness = None;
        self.first_witness = None;
    }

    /// Drop the memo tables of an event that will never be recomputed.
    pub fn retire(&mut self) {
        self.round_created = Some(ROUND_NEGATIVE_INFINITY);
        self.last_see = None;
        self.strongly_see = None;
        self.first_self_witness = None;
        self.first_witness = None;
        self.received_times = Vec::new();
    }
}

/// An event together with its resolved links and metadata.
#[derive(Debug)]
pub struct EventNode {
    pub(crate) event: GossipEvent,
    pub(crate) creator_index: usize,
    pub(crate) self_parent: Option<EventIdx>,
    pub(crate) other_parent: Option<EventIdx>,
    pub(crate) meta: EventMetadata,
}

impl EventNode {
    pub fn generation(&self) -> u64 {
        self.event.generation
    }
}

/// Read-only view of an event's consensus state.
#[derive(Debug, Clone, Copy)]
pub struct EventView<'a> {
    node: &'a EventNode,
}

impl<'a> EventView<'a> {
    pub fn event(&self) -> &'a GossipEvent {
        &self.node.event
    }

    pub fn hash(&self) -> Hash {
        self.node.event.hash
    }

    pub fn creator(&self) -> Pubkey {
        self.node.event.creator
    }

    pub fn generation(&self) -> u64 {
        self.node.event.generation
    }

    /// Round created, `None` if not computed since the last recalculation.
    pub fn round_created(&self) -> Option<Round> {
        self.node.meta.round_created
    }

    pub fn is_witness(&self) -> bool {
        self.node.meta.is_witness
    }

    /// `Some(famous)` once the witness's fame is decided.
    pub fn fame(&self) -> Option<bool> {
        self.node
            .meta
            .fame_decided
            .then_some(self.node.meta.is_famous)
    }

    pub fn is_consensus(&self) -> bool {
        self.node.meta.is_consensus
    }

    pub fn round_received(&self) -> Option<Round> {
        self.node.meta.round_received
    }

    pub fn consensus_order(&self) -> Option<u64> {
        self.node.meta.consensus_order
    }

    pub fn consensus_timestamp_nanos(&self) -> Option<u64> {
        self.node.meta.consensus_timestamp_nanos
    }

    pub fn last_in_round_received(&self) -> bool {
        self.node.meta.last_in_round_received
    }
}

/// Insertion-ordered arena of events.
#[derive(Debug, Default)]
pub struct EventGraph {
    /// Slot `i` holds the event with index `first_id + i`, or `None` once
    /// removed.
    nodes: VecDeque<Option<EventNode>>,
    first_id: u64,
    by_hash: HashMap<Hash, EventIdx>,
}

impl EventGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events currently stored.
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    /// Add an event, resolving its parents against the events already
    /// present. Parents that are unknown or already removed stay unlinked.
    pub fn insert(&mut self, event: GossipEvent, creator_index: usize) -> Result<EventIdx> {
        if self.by_hash.contains_key(&event.hash) {
            return Err(ConsensusError::DuplicateEvent(event.hash));
        }
        let self_parent = event.self_parent.and_then(|hash| self.lookup(&hash));
        let other_parent = event.other_parent.and_then(|hash| self.lookup(&hash));

        let idx = EventIdx(self.first_id.saturating_add(self.nodes.len() as u64));
        self.by_hash.insert(event.hash, idx);
        self.nodes.push_back(Some(EventNode {
            event,
            creator_index,
            self_parent,
            other_parent,
            meta: EventMetadata::default(),
        }));
        Ok(idx)
    }

    fn slot(&self, idx: EventIdx) -> Option<usize> {
        let offset = idx.0.checked_sub(self.first_id)?;
        usize::try_from(offset).ok()
    }

    pub fn get(&self, idx: EventIdx) -> Option<&EventNode> {
        let slot = self.slot(idx)?;
        self.nodes.get(slot)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, idx: EventIdx) -> Option<&mut EventNode> {
        let slot = self.slot(idx)?;
        self.nodes.get_mut(slot)?.as_mut()
    }

    pub(crate) fn meta_mut(&mut self, idx: EventIdx) -> Option<&mut EventMetadata> {
        self.get_mut(idx).map(|node| &mut node.meta)
    }

    /// Index of the event with this hash, if it is still stored.
    pub fn lookup(&self, hash: &Hash) -> Option<EventIdx> {
        self.by_hash.get(hash).copied()
    }

    pub fn view(&self, idx: EventIdx) -> Option<EventView<'_>> {
        self.get(idx).map(|node| EventView { node })
    }

    /// Self-parent and other-parent of `idx`, each `None` if absent or removed.
    pub fn parents(&self, idx: EventIdx) -> (Option<EventIdx>, Option<EventIdx>) {
        let Some(node) = self.get(idx) else {
            return (None, None);
        };
        let present = |parent: Option<EventIdx>| parent.filter(|p| self.get(*p).is_some());
        (present(node.self_parent), present(node.other_parent))
    }

    /// Iterate over stored events in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (EventIdx, &EventNode)> {
        let first_id = self.first_id;
        self.nodes.iter().enumerate().filter_map(move |(i, slot)| {
            slot.as_ref()
                .map(|node| (EventIdx(first_id.saturating_add(i as u64)), node))
        })
    }

    /// Remove every event with a generation below `min_generation`. Returns
    /// how many were removed.
    pub fn remove_below_generation(&mut self, min_generation: u64) -> usize {
        let mut removed = 0usize;
        for slot in self.nodes.iter_mut() {
            let expired = slot
                .as_ref()
                .is_some_and(|node| node.event.generation < min_generation);
            if expired {
                if let Some(node) = slot.take() {
                    self.by_hash.remove(&node.event.hash);
                    removed = removed.saturating_add(1);
                }
            }
        }
        while matches!(self.nodes.front(), Some(None)) {
            self.nodes.pop_front();
            self.first_id = self.first_id.saturating_add(1);
        }
        removed
    }

    /// Remove every event. Indices handed out before stay invalid.
    pub fn clear(&mut self) {
        self.first_id = self.first_id.saturating_add(self.nodes.len() as u64);
        self.nodes.clear();
        self.by_hash.clear();
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        assert_matches::assert_matches,
        solana_signature::Signature,
    };

    fn event(
        creator: Pubkey,
        self_parent: Option<&GossipEvent>,
        other_parent: Option<&GossipEvent>,
        time: u64,
    ) -> GossipEvent {
        GossipEvent::new(
            creator,
            self_parent,
            other_parent,
            time,
            vec![],
            Signature::default(),
        )
    }

    #[test]
    fn test_insert_resolves_parents() {
        let a = Pubkey::new_unique();
        let b = Pubkey::new_unique();
        let a0 = event(a, None, None, 1);
        let b0 = event(b, None, None, 1);
        let a1 = event(a, Some(&a0), Some(&b0), 2);

        let mut graph = EventGraph::new();
        let ia0 = graph.insert(a0.clone(), 0).unwrap();
        let ib0 = graph.insert(b0.clone(), 1).unwrap();
        let ia1 = graph.insert(a1.clone(), 0).unwrap();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.parents(ia1), (Some(ia0), Some(ib0)));
        assert_eq!(graph.parents(ia0), (None, None));
        assert_eq!(graph.lookup(&a1.hash), Some(ia1));
        assert_eq!(graph.view(ia1).unwrap().hash(), a1.hash);
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let a0 = event(Pubkey::new_unique(), None, None, 1);
        let mut graph = EventGraph::new();
        graph.insert(a0.clone(), 0).unwrap();
        assert_matches!(
            graph.insert(a0.clone(), 0),
            Err(ConsensusError::DuplicateEvent(hash)) if hash == a0.hash
        );
    }

    #[test]
    fn test_unknown_parent_stays_unlinked() {
        let a = Pubkey::new_unique();
        let a0 = event(a, None, None, 1);
        let a1 = event(a, Some(&a0), None, 2);
        let mut graph = EventGraph::new();
        let ia1 = graph.insert(a1.clone(), 0).unwrap();
        assert_eq!(graph.parents(ia1), (None, None));
        assert!(graph.get(ia1).unwrap().event.has_parents());
    }

    #[test]
    fn test_remove_below_generation_keeps_indices_stable() {
        let a = Pubkey::new_unique();
        let a0 = event(a, None, None, 1);
        let a1 = event(a, Some(&a0), None, 2);
        let a2 = event(a, Some(&a1), None, 3);

        let mut graph = EventGraph::new();
        let ia0 = graph.insert(a0.clone(), 0).unwrap();
        let ia1 = graph.insert(a1.clone(), 0).unwrap();
        let ia2 = graph.insert(a2.clone(), 0).unwrap();

        assert_eq!(graph.remove_below_generation(2), 2);
        assert_eq!(graph.len(), 1);
        assert!(graph.get(ia0).is_none());
        assert!(graph.get(ia1).is_none());
        assert_eq!(graph.get(ia2).unwrap().generation(), 2);
        assert_eq!(graph.lookup(&a0.hash), None);
        // the link to the removed self-parent no longer resolves
        assert_eq!(graph.parents(ia2), (None, None));

        let a3 = event(a, Some(&a2), None, 4);
        let ia3 = graph.insert(a3, 0).unwrap();
        assert!(ia3 > ia2);
        assert_eq!(graph.parents(ia3), (Some(ia2), None));
        assert_eq!(graph.iter().count(), 2);
    }

    #[test]
    fn test_metadata_clear_and_retire() {
        let mut meta = EventMetadata {
            round_created: Some(4),
            is_witness: true,
            fame_decided: true,
            is_famous: true,
            fame_round: Some(4),
            last_see: Some(vec![None; 3]),
            received_times: vec![1, 2],
            ..EventMetadata::default()
        };
        meta.clear_round_state(5);
        assert_eq!(meta.round_created, None);
        assert!(!meta.is_witness);
        assert!(meta.last_see.is_none());
        assert_eq!(meta.received_times, vec![1, 2]);
        // round 4 is decided, its fame stays
        assert!(meta.fame_decided && meta.is_famous);

        meta.fame_round = Some(5);
        meta.clear_round_state(5);
        assert!(!meta.fame_decided);
        assert!(!meta.is_famous);

        meta.retire();
        assert_eq!(meta.round_created, Some(ROUND_NEGATIVE_INFINITY));
        assert!(meta.received_times.is_empty());
    }

    #[test]
    fn test_view_reports_fame_only_when_decided() {
        let mut graph = EventGraph::new();
        let idx = graph
            .insert(event(Pubkey::new_unique(), None, None, 1), 0)
            .unwrap();
        assert_eq!(graph.view(idx).unwrap().fame(), None);
        let meta = graph.meta_mut(idx).unwrap();
        meta.fame_decided = true;
        meta.is_famous = true;
        assert_eq!(graph.view(idx).unwrap().fame(), Some(true));
    }
}
