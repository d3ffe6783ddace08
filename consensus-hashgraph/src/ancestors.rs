//! Non-recursive ancestor search.
//!
//! Walks the ancestry of a root event depth first, self-parent before
//! other-parent, with an explicit stack so arbitrarily long chains never
//! touch the call stack. Only ancestors accepted by a caller predicate are
//! entered; the predicate is how finalization skips consensus and ancient
//! events.

use {
    crate::event_graph::{EventGraph, EventIdx, EventNode},
    std::collections::{HashMap, HashSet},
};

/// An ancestor reached by a search, with the time the root's creator first
/// learned about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReachedAncestor {
    pub idx: EventIdx,
    /// Creation time of the earliest event on the root's own self-parent
    /// chain through which the search reached this ancestor.
    pub time_reached_nanos: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    SelfParent,
    OtherParent,
    Done,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    idx: EventIdx,
    visit: Visit,
    /// Still on the root's self-parent chain.
    self_line: bool,
    time_reached_nanos: u64,
}

/// Reusable depth-first ancestor search.
#[derive(Debug, Default)]
pub struct AncestorSearch {
    stack: Vec<Frame>,
    visited: HashSet<EventIdx>,
}

impl AncestorSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// All ancestors of `root` (inclusive) reachable through events accepted by
    /// `valid`, parents before children and the root last. Returns nothing if
    /// the root itself is not accepted.
    pub fn search<F>(&mut self, graph: &EventGraph, root: EventIdx, mut valid: F) -> Vec<ReachedAncestor>
    where
        F: FnMut(&EventNode) -> bool,
    {
        self.stack.clear();
        self.visited.clear();
        let mut reached = Vec::new();

        let Some(root_node) = graph.get(root).filter(|node| valid(node)) else {
            return reached;
        };
        self.visited.insert(root);
        self.stack.push(Frame {
            idx: root,
            visit: Visit::SelfParent,
            self_line: true,
            time_reached_nanos: root_node.event.time_created_nanos,
        });

        while let Some(frame) = self.stack.last_mut() {
            let current = *frame;
            let (self_parent, other_parent) = graph.parents(current.idx);
            match current.visit {
                Visit::SelfParent => {
                    frame.visit = Visit::OtherParent;
                    if let Some((parent, node)) = self.enter(graph, self_parent, &mut valid) {
                        let time_reached_nanos = if current.self_line {
                            node.event.time_created_nanos
                        } else {
                            current.time_reached_nanos
                        };
                        self.stack.push(Frame {
                            idx: parent,
                            visit: Visit::SelfParent,
                            self_line: current.self_line,
                            time_reached_nanos,
                        });
                    }
                }
                Visit::OtherParent => {
                    frame.visit = Visit::Done;
                    if let Some((parent, _)) = self.enter(graph, other_parent, &mut valid) {
                        self.stack.push(Frame {
                            idx: parent,
                            visit: Visit::SelfParent,
                            self_line: false,
                            time_reached_nanos: current.time_reached_nanos,
                        });
                    }
                }
                Visit::Done => {
                    self.stack.pop();
                    reached.push(ReachedAncestor {
                        idx: current.idx,
                        time_reached_nanos: current.time_reached_nanos,
                    });
                }
            }
        }
        reached
    }

    /// Mark `parent` visited and return it if it exists, was not visited
    /// yet, and passes `valid`.
    fn enter<'g, F>(
        &mut self,
        graph: &'g EventGraph,
        parent: Option<EventIdx>,
        valid: &mut F,
    ) -> Option<(EventIdx, &'g EventNode)>
    where
        F: FnMut(&EventNode) -> bool,
    {
        let parent = parent?;
        if self.visited.contains(&parent) {
            return None;
        }
        let node = graph.get(parent).filter(|node| valid(node))?;
        self.visited.insert(parent);
        Some((parent, node))
    }

    /// Events accepted by `valid` that are ancestors of every root, in the
    /// order the first root's search reached them.
    pub fn common_ancestors<F>(
        &mut self,
        graph: &EventGraph,
        roots: &[EventIdx],
        mut valid: F,
    ) -> Vec<EventIdx>
    where
        F: FnMut(&EventNode) -> bool,
    {
        let Some((first, rest)) = roots.split_first() else {
            return Vec::new();
        };
        let order: Vec<EventIdx> = self
            .search(graph, *first, &mut valid)
            .into_iter()
            .map(|reached| reached.idx)
            .collect();
        let mut counts: HashMap<EventIdx, usize> = order.iter().map(|idx| (*idx, 1)).collect();
        for root in rest {
            for reached in self.search(graph, *root, &mut valid) {
                if let Some(count) = counts.get_mut(&reached.idx) {
                    *count = count.saturating_add(1);
                }
            }
        }
        order
            .into_iter()
            .filter(|idx| counts.get(idx) == Some(&roots.len()))
            .collect()
    }
}
