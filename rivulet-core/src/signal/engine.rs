//! Propagation Engine
//!
//! The engine turns one injected value into one settled graph. It decides
//! which nodes can be affected, the order they run in, and which of them
//! actually get to run.
//!
//! # Algorithm
//!
//! A pass triggered by an injection at node `S` proceeds in three steps:
//!
//! 1. **Collect.** Breadth-first traversal from `S`'s children. A node
//!    whose `queued` flag is already set is skipped — this is the diamond
//!    dedup rule: a node reachable through two parents is scheduled once.
//!    Every visited node has its flag set.
//!
//! 2. **Order.** Kahn's algorithm over the visited set, with in-degrees
//!    counting only parents inside the set. This guarantees a node runs
//!    after every one of its scheduled parents, so it only ever observes
//!    post-update parent values. Plain traversal order is not enough:
//!    in a diamond with arms of unequal length, the join node must wait
//!    for the longer arm.
//!
//! 3. **Run.** Walk the order. A node's update rule is invoked only when
//!    at least one of its parents emitted earlier in the pass (the
//!    injection origin counts as emitted). A rule that declines to emit
//!    leaves its value untouched and gates its descendants — this is what
//!    makes `filter` and `drop_repeats` propagation barriers rather than
//!    mere value filters.
//!
//! Afterwards every visited node's `queued` flag is cleared.
//!
//! # Re-entrancy
//!
//! Update rules run with no arena lock held, so a rule (or a user callback
//! inside one) may freely read signals, build new combinators, tear nodes
//! down, or push. A push that arrives while a pass is in flight — from a
//! callback or from a timer thread — is queued and drained FIFO, one full
//! pass per injection, by whichever caller currently owns the drain loop.
//! Within a single pass the graph is settled before control returns.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::graph::{GraphCore, Injection, NodeId, ValueCell};

/// An update rule as stored in the arena.
///
/// Rules are shared (`Arc`) so the engine can invoke them without holding
/// the arena lock; interior state (counters, timer generations) lives in
/// the closure's captures.
pub(crate) type UpdateFn = Arc<dyn Fn(&mut PassCtx) + Send + Sync>;

/// Per-invocation context handed to an update rule.
///
/// Tells the rule which parent woke it and collects whether it emitted.
pub struct PassCtx {
    updated_parent: Option<NodeId>,
    emitted: bool,
}

impl PassCtx {
    /// The parent that most recently emitted in this pass.
    ///
    /// This is the value a many-parent node (`merge`) forwards.
    pub(crate) fn updated_parent(&self) -> Option<NodeId> {
        self.updated_parent
    }

    /// Publish a new value for this node and mark it as emitted, which
    /// un-gates its children for the remainder of the pass.
    pub(crate) fn emit<T>(&mut self, cell: &ValueCell<T>, value: T) {
        *cell.write() = Some(value);
        self.emitted = true;
    }
}

impl GraphCore {
    /// Deliver an injection, becoming the drain-loop owner if nobody is.
    ///
    /// The injection targeting a torn-down node is dropped silently apart
    /// from a debug line — this is the guard that keeps stale timer
    /// callbacks (`delay`, `debounce`) from resurrecting closed nodes.
    pub(crate) fn inject(&self, origin: NodeId, write: Box<dyn FnOnce() -> bool + Send>) {
        {
            let mut queue = self.pass.lock();
            queue.pending.push_back(Injection { origin, write });
            if queue.running {
                // The owner drains everything, including this one.
                return;
            }
            queue.running = true;
        }

        loop {
            let injection = {
                let mut queue = self.pass.lock();
                match queue.pending.pop_front() {
                    Some(injection) => injection,
                    None => {
                        queue.running = false;
                        break;
                    }
                }
            };

            if !self.contains(injection.origin) {
                tracing::debug!(
                    node = injection.origin.raw(),
                    "dropping injection into torn-down node"
                );
                continue;
            }

            if (injection.write)() {
                self.run_pass(injection.origin);
            }
        }
    }

    /// Execute one propagation pass rooted at `origin`, whose value has
    /// just been written.
    ///
    /// The pass runs against the topology frozen at collection time: a
    /// node torn down mid-pass (a `take` reaching its limit) is skipped
    /// from then on, but values it already emitted still reach the
    /// children it had when the pass began.
    fn run_pass(&self, origin: NodeId) {
        let scheduled = self.collect_pass(origin);

        // Emission ledger: node id -> sequence number of its emission.
        // The origin's write counts as emission zero.
        let mut emitted: HashMap<NodeId, usize> = HashMap::new();
        emitted.insert(origin, 0);
        let mut next_seq = 1usize;

        for node in &scheduled {
            let fetched = {
                let nodes = self.nodes.read();
                nodes.get(&node.id).map(|entry| Arc::clone(&entry.update))
            };
            // Torn down mid-pass: skip.
            let Some(update) = fetched else {
                continue;
            };

            let updated_parent = node
                .parents
                .iter()
                .filter_map(|parent| emitted.get(parent).map(|seq| (*seq, *parent)))
                .max_by_key(|(seq, _)| *seq)
                .map(|(_, parent)| parent);

            // No parent produced a value this pass: stay gated.
            if updated_parent.is_none() {
                continue;
            }

            let mut ctx = PassCtx {
                updated_parent,
                emitted: false,
            };
            (*update)(&mut ctx);

            if ctx.emitted {
                emitted.insert(node.id, next_seq);
                next_seq += 1;
            }
        }

        let mut nodes = self.nodes.write();
        for node in &scheduled {
            if let Some(entry) = nodes.get_mut(&node.id) {
                entry.queued = false;
            }
        }
    }

    /// Collect and order the set of nodes reachable from `origin`,
    /// snapshotting each node's parent list as of pass start.
    ///
    /// Sets the `queued` flag on every node it schedules; `run_pass`
    /// clears the flags once the walk is over.
    fn collect_pass(&self, origin: NodeId) -> Vec<PassNode> {
        let mut nodes = self.nodes.write();

        let mut visited: Vec<NodeId> = Vec::new();
        let mut frontier: VecDeque<NodeId> = VecDeque::new();
        if let Some(entry) = nodes.get(&origin) {
            frontier.extend(entry.children.iter().copied());
        }

        while let Some(id) = frontier.pop_front() {
            let Some(entry) = nodes.get_mut(&id) else {
                continue;
            };
            if entry.queued {
                continue;
            }
            entry.queued = true;
            visited.push(id);
            frontier.extend(entry.children.iter().copied());
        }

        // Kahn's algorithm restricted to the visited set. Duplicate parent
        // edges (a node wired twice to the same parent) count once, to
        // match the single entry in the parent's child set.
        let in_set: HashSet<NodeId> = visited.iter().copied().collect();
        let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(visited.len());
        for &id in &visited {
            let entry = &nodes[&id];
            let mut counted: Vec<NodeId> = Vec::new();
            for &parent in &entry.parents {
                if in_set.contains(&parent) && !counted.contains(&parent) {
                    counted.push(parent);
                }
            }
            in_degree.insert(id, counted.len());
        }

        let mut ready: VecDeque<NodeId> = visited
            .iter()
            .copied()
            .filter(|id| in_degree[id] == 0)
            .collect();
        let mut order: Vec<NodeId> = Vec::with_capacity(visited.len());

        while let Some(id) = ready.pop_front() {
            order.push(id);
            let children: Vec<NodeId> = nodes[&id].children.iter().copied().collect();
            for child in children {
                if let Some(degree) = in_degree.get_mut(&child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.push_back(child);
                    }
                }
            }
        }

        // Combinators can only wire a fresh node below existing ones, so a
        // cycle cannot be expressed through the public API.
        debug_assert_eq!(order.len(), visited.len(), "cycle in signal graph");
        if order.len() != visited.len() {
            tracing::error!(
                scheduled = visited.len(),
                ordered = order.len(),
                "propagation order incomplete; nodes left unordered were skipped"
            );
            // The unordered remainder keeps its queued flag only until the
            // cleanup in `run_pass`; schedule it for clearing too.
            for &id in &visited {
                if !order.contains(&id) {
                    order.push(id);
                }
            }
        }

        order
            .into_iter()
            .map(|id| PassNode {
                id,
                parents: nodes[&id].parents.clone(),
            })
            .collect()
    }
}

/// One scheduled node: its id plus its parent list as of pass start.
struct PassNode {
    id: NodeId,
    parents: smallvec::SmallVec<[NodeId; 2]>,
}
