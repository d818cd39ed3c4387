//! Node Arena
//!
//! This module owns the topology of the signal graph: which nodes exist,
//! how they are wired, and how they are torn down. Values never live here;
//! each node's value sits in its own shared cell (see [`ValueCell`]) so that
//! update rules can keep reading a parent's final value even while the
//! arena is being restructured mid-pass.
//!
//! # Invariants
//!
//! - Edges are bidirectional: a node appears in its parent's `children` set
//!   exactly when the parent appears in the node's `parents` list. Wiring
//!   (`derive`) and teardown (`close`) maintain both directions together.
//! - A node with no parents is a source. Only sources accept external
//!   injection; derived nodes change value only through propagation.
//! - `queued` is owned by the propagation engine. It is set while a node is
//!   scheduled in the current pass and cleared before the pass returns.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use thiserror::Error;

use crate::signal::engine::UpdateFn;
use crate::time::Timer;

/// Unique identifier for a node in the signal graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Errors produced by graph misuse.
///
/// These are programmer errors, not runtime conditions: a correct caller
/// never sees them. They are surfaced as `Err` rather than swallowed so the
/// mistake is visible at the call site.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// Values may only be injected at graph roots. A node built by a
    /// combinator changes value through propagation alone.
    #[error("node {} is derived; values may only be injected at graph roots", .0.raw())]
    NotASource(NodeId),

    /// The node was torn down and no longer belongs to the graph.
    #[error("node {} has been torn down", .0.raw())]
    Closed(NodeId),
}

/// Shared storage for one node's current value.
///
/// `None` is the distinct "no value yet" state; it is not conflated with
/// any legal value of `T`.
pub(crate) type ValueCell<T> = Arc<RwLock<Option<T>>>;

/// One node's record in the arena.
pub(crate) struct NodeEntry {
    /// Upstream dependencies, in construction order. Fixed at creation;
    /// only teardown of a parent removes entries.
    pub(crate) parents: SmallVec<[NodeId; 2]>,

    /// Downstream dependents, in wiring order.
    pub(crate) children: IndexSet<NodeId>,

    /// Scheduled-in-current-pass marker. See the engine.
    pub(crate) queued: bool,

    /// The node's update rule, invoked during propagation.
    pub(crate) update: UpdateFn,
}

/// A value write waiting for its own propagation pass.
///
/// The write is deferred until the pass that delivers it starts, so a pass
/// in flight never observes a half-applied later injection. Returns `false`
/// when there is nothing to deliver (e.g. a debounce fired before its
/// parent ever held a value).
pub(crate) struct Injection {
    pub(crate) origin: NodeId,
    pub(crate) write: Box<dyn FnOnce() -> bool + Send>,
}

/// FIFO of injections plus the single-owner marker for the drain loop.
pub(crate) struct PassQueue {
    pub(crate) running: bool,
    pub(crate) pending: VecDeque<Injection>,
}

/// The shared heart of a [`crate::signal::Graph`].
///
/// Handles (`Graph`, `Signal`) hold this behind an `Arc`; update rules that
/// need to reach back into the graph (self-teardown, timer re-injection)
/// hold it behind a `Weak` so the arena is not kept alive by its own nodes.
pub(crate) struct GraphCore {
    pub(crate) nodes: RwLock<HashMap<NodeId, NodeEntry>>,
    pub(crate) pass: Mutex<PassQueue>,
    pub(crate) timer: Arc<dyn Timer>,
}

impl GraphCore {
    pub(crate) fn new(timer: Arc<dyn Timer>) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            pass: Mutex::new(PassQueue {
                running: false,
                pending: VecDeque::new(),
            }),
            timer: Arc::clone(&timer),
        }
    }

    /// Register a node under `id`, wiring it as a child of every parent.
    ///
    /// A parent that has already been torn down is recorded in the parent
    /// list but contributes no edge; the new node simply never hears from
    /// it.
    pub(crate) fn derive(&self, id: NodeId, parents: &[NodeId], update: UpdateFn) {
        let mut nodes = self.nodes.write();
        let mut recorded: SmallVec<[NodeId; 2]> = SmallVec::new();

        for &parent in parents {
            match nodes.get_mut(&parent) {
                Some(entry) => {
                    entry.children.insert(id);
                }
                None => {
                    tracing::warn!(parent = parent.raw(), "parent already torn down; edge skipped");
                }
            }
            recorded.push(parent);
        }

        nodes.insert(
            id,
            NodeEntry {
                parents: recorded,
                children: IndexSet::new(),
                queued: false,
                update,
            },
        );
    }

    /// Remove a node from the graph.
    ///
    /// Unwires both edge directions and drops the record. Idempotent: a
    /// second call finds nothing and does nothing. Timers already scheduled
    /// against the node become no-ops when they fire (their injection is
    /// dropped by the drain loop).
    pub(crate) fn close(&self, id: NodeId) {
        let mut nodes = self.nodes.write();
        if let Some(entry) = nodes.remove(&id) {
            for parent in &entry.parents {
                if let Some(parent_entry) = nodes.get_mut(parent) {
                    parent_entry.children.shift_remove(&id);
                }
            }
            for child in &entry.children {
                if let Some(child_entry) = nodes.get_mut(child) {
                    child_entry.parents.retain(|p| *p != id);
                }
            }
        }
    }

    /// Check whether a node is still part of the graph.
    pub(crate) fn contains(&self, id: NodeId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    /// Number of parents a node currently has, or `None` if torn down.
    pub(crate) fn parent_count(&self, id: NodeId) -> Option<usize> {
        self.nodes.read().get(&id).map(|entry| entry.parents.len())
    }

    /// Total number of live nodes.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.read().len()
    }
}
