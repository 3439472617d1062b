// This module implements the dependency graph that decides which nodes end up in the
// image. Nodes are created on demand by the NodeFactory but cost nothing until the graph
// marks them: marking appends the node to a mark queue, and the mark phase takes nodes
// from the front, runs their on-marked hook (a descriptor registers itself with its
// region exactly once) and marks their static dependencies, until the queue is empty.
// Nodes are processed in the order in which they were first marked, so that order drives
// both region membership order and the order in which nodes are laid out in the object
// file, and repeated compilations of the same input produce identical images. The mark
// phase is single threaded.

//! Dependency graph.
//!
//! ```text
//! graph.add_root(node, reason);
//! graph.compute_marked_nodes(&mut factory)?;   // run to a fixed point
//! ImageWriter::new(&factory, &graph, target).write()?;
//! ```

pub mod factory;
pub mod static_base;

pub use factory::{Node, NodeFactory, NodeSymbol, SymbolClass};
pub use static_base::StaticBaseNode;

use hashbrown::HashMap;
use std::collections::VecDeque;
use std::fmt;

use crate::core::GraphResult;

/// Index of a node owned by a [`NodeFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a node was first marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkReason {
    /// Node whose dependency marked this one; `None` for roots.
    pub parent: Option<NodeId>,
    pub reason: &'static str,
}

/// Mark-phase state.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    reasons: HashMap<NodeId, MarkReason>,
    mark_queue: VecDeque<NodeId>,
    marked_order: Vec<NodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `node` as a root. Returns `false` if it was already marked.
    pub fn add_root(&mut self, node: NodeId, reason: &'static str) -> bool {
        self.mark(node, None, reason)
    }

    /// Mark `node` reachable from `parent`. Marking is monotonic: a node
    /// marked once stays marked and is processed once.
    pub fn mark_reachable(&mut self, node: NodeId, parent: NodeId, reason: &'static str) -> bool {
        self.mark(node, Some(parent), reason)
    }

    fn mark(&mut self, node: NodeId, parent: Option<NodeId>, reason: &'static str) -> bool {
        if self.reasons.contains_key(&node) {
            return false;
        }
        self.reasons.insert(node, MarkReason { parent, reason });
        self.mark_queue.push_back(node);
        self.marked_order.push(node);
        log::trace!("Marked node {} ({})", node, reason);
        true
    }

    /// Run the mark phase until no node is pending.
    pub fn compute_marked_nodes(&mut self, factory: &mut NodeFactory<'_>) -> GraphResult<()> {
        let before = self.marked_order.len();
        while let Some(node) = self.mark_queue.pop_front() {
            factory.on_marked(node)?;
            for (dependency, reason) in factory.static_dependencies(node)? {
                self.mark_reachable(dependency, node, reason);
            }
        }
        log::debug!(
            "Mark phase reached a fixed point: {} new node(s), {} total",
            self.marked_order.len() - before,
            self.marked_order.len()
        );
        Ok(())
    }

    /// Nodes marked but not yet processed by the mark phase.
    pub fn pending(&self) -> usize {
        self.mark_queue.len()
    }

    pub fn is_marked(&self, node: NodeId) -> bool {
        self.reasons.contains_key(&node)
    }

    /// Marked nodes in first-marked order.
    pub fn marked_nodes(&self) -> &[NodeId] {
        &self.marked_order
    }

    pub fn mark_reason(&self, node: NodeId) -> Option<MarkReason> {
        self.reasons.get(&node).copied()
    }
}
