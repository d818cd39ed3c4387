//! Reactive Signals
//!
//! A [`Signal`] is a cell in a push-based dataflow graph. Sources are fed
//! by [`Signal::push`]; derived signals are built by combinators (`map`,
//! `filter`, `fold`, ...) and update automatically, in one synchronous
//! pass per injection, in an order that respects the dependency graph.
//!
//! # Concepts
//!
//! ## Sources and derived signals
//!
//! A source has no parents and changes only through external injection.
//! Every combinator wires a fresh node under one or more parents and gives
//! it an update rule; the rule runs during propagation and may emit at
//! most one value per pass.
//!
//! ## Absence
//!
//! A signal may not have produced a value yet. [`Signal::get`] returns
//! `Option<T>`; `None` means "never emitted", which is distinct from any
//! legal value of `T`.
//!
//! ## Settlement
//!
//! Within one `push`, every affected signal is recomputed exactly once and
//! observes only fully-updated parents — even across diamond shapes where
//! a signal is reachable through several paths. See the engine module for
//! the ordering machinery.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rivulet_core::{Graph, ManualTimer};
//!
//! let graph = Graph::new(Arc::new(ManualTimer::new()));
//! let clicks = graph.source::<i32>();
//! let total = clicks.fold(|acc, n| acc + n, 0);
//!
//! clicks.push(2).unwrap();
//! clicks.push(3).unwrap();
//! assert_eq!(total.get(), Some(5));
//! ```

mod engine;
mod graph;

pub use graph::{GraphError, NodeId};

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::time::Timer;
use engine::{PassCtx, UpdateFn};
use graph::{GraphCore, ValueCell};

/// Handle to a signal graph.
///
/// Owns the node arena and the timer capability used by `delay`,
/// `debounce` and anything else that needs to wake up later. Cloning is
/// cheap and shares the graph.
pub struct Graph {
    core: Arc<GraphCore>,
}

impl Graph {
    /// Create an empty graph driven by the given timer.
    ///
    /// Pass a [`crate::time::TokioTimer`] for real wall-clock timers or a
    /// [`crate::time::ManualTimer`] for deterministic tests.
    pub fn new(timer: Arc<dyn Timer>) -> Self {
        Self {
            core: Arc::new(GraphCore::new(timer)),
        }
    }

    /// Create a source signal with no value.
    pub fn source<T>(&self) -> Signal<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.source_inner(None)
    }

    /// Create a source signal that already holds `initial`.
    pub fn source_with<T>(&self, initial: T) -> Signal<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.source_inner(Some(initial))
    }

    fn source_inner<T>(&self, initial: Option<T>) -> Signal<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let id = NodeId::next();
        let cell: ValueCell<T> = Arc::new(RwLock::new(initial));
        // Sources never recompute; injection is the only way in.
        let update: UpdateFn = Arc::new(|_: &mut PassCtx| {});
        self.core.derive(id, &[], update);
        Signal {
            core: Arc::clone(&self.core),
            id,
            cell,
        }
    }

    /// Number of live nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.core.node_count()
    }

    /// The timer capability this graph was built with.
    pub fn timer(&self) -> Arc<dyn Timer> {
        Arc::clone(&self.core.timer)
    }
}

impl Clone for Graph {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("node_count", &self.node_count())
            .finish()
    }
}

/// A cell in the reactive graph: a possibly-absent current value plus the
/// wiring that keeps it up to date.
///
/// `Signal` is a handle; cloning shares the underlying node. Dropping all
/// handles does **not** tear the node down — call [`Signal::close`] to
/// remove it from the graph.
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    core: Arc<GraphCore>,
    id: NodeId,
    cell: ValueCell<T>,
}

/// Wire a freshly minted node into the arena and wrap it in a handle.
fn register<B>(
    core: &Arc<GraphCore>,
    id: NodeId,
    parents: &[NodeId],
    cell: ValueCell<B>,
    update: UpdateFn,
) -> Signal<B>
where
    B: Clone + Send + Sync + 'static,
{
    core.derive(id, parents, update);
    Signal {
        core: Arc::clone(core),
        id,
        cell,
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// This signal's node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The current value, if any.
    pub fn get(&self) -> Option<T> {
        self.cell.read().clone()
    }

    /// Whether this signal has ever held a value.
    pub fn has_value(&self) -> bool {
        self.cell.read().is_some()
    }

    /// Inject a value at this source and propagate it through the graph.
    ///
    /// Only sources accept injection: pushing into a derived signal
    /// returns [`GraphError::NotASource`], pushing into a torn-down one
    /// [`GraphError::Closed`]. When called from inside a propagation pass
    /// (an observer callback, a timer), the injection is queued and gets
    /// its own pass after the current one settles.
    pub fn push(&self, value: T) -> Result<(), GraphError> {
        match self.core.parent_count(self.id) {
            None => Err(GraphError::Closed(self.id)),
            Some(n) if n > 0 => Err(GraphError::NotASource(self.id)),
            Some(_) => {
                let cell = Arc::clone(&self.cell);
                self.core.inject(
                    self.id,
                    Box::new(move || {
                        *cell.write() = Some(value);
                        true
                    }),
                );
                Ok(())
            }
        }
    }

    /// Remove this signal from the graph.
    ///
    /// Severs all edges in both directions. Idempotent. In-flight timers
    /// that target this node become no-ops when they fire.
    pub fn close(&self) {
        self.core.close(self.id);
    }

    /// Derived signal whose value is `f` applied to this signal's value.
    pub fn map<B, F>(&self, f: F) -> Signal<B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(&T) -> B + Send + Sync + 'static,
    {
        let parent = Arc::clone(&self.cell);
        let initial = parent.read().as_ref().map(|v| f(v));
        let cell: ValueCell<B> = Arc::new(RwLock::new(initial));
        let out = Arc::clone(&cell);
        let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
            let value = parent.read().as_ref().map(|v| f(v));
            if let Some(value) = value {
                ctx.emit(&out, value);
            }
        });
        register(&self.core, NodeId::next(), &[self.id], cell, update)
    }

    /// Derived signal keeping only values for which `predicate` holds.
    ///
    /// A value that fails the predicate does not merely vanish — it stops
    /// propagation through this node entirely, so descendants keep their
    /// previous values.
    pub fn filter<F>(&self, predicate: F) -> Signal<T>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let parent = Arc::clone(&self.cell);
        let initial = parent.read().clone().filter(|v| predicate(v));
        let cell: ValueCell<T> = Arc::new(RwLock::new(initial));
        let out = Arc::clone(&cell);
        let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
            let value = parent.read().clone();
            if let Some(value) = value {
                if predicate(&value) {
                    ctx.emit(&out, value);
                }
            }
        });
        register(&self.core, NodeId::next(), &[self.id], cell, update)
    }

    /// Derived signal keeping a new value only if `predicate(previous,
    /// next)` holds, where `previous` is this node's last emitted value
    /// (`None` before the first emission).
    pub fn filter_previous<F>(&self, predicate: F) -> Signal<T>
    where
        F: Fn(Option<&T>, &T) -> bool + Send + Sync + 'static,
    {
        let parent = Arc::clone(&self.cell);
        let initial = parent.read().clone();
        let cell: ValueCell<T> = Arc::new(RwLock::new(initial));
        let out = Arc::clone(&cell);
        let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
            let value = parent.read().clone();
            if let Some(next) = value {
                let keep = {
                    let previous = out.read();
                    predicate(previous.as_ref(), &next)
                };
                if keep {
                    ctx.emit(&out, next);
                }
            }
        });
        register(&self.core, NodeId::next(), &[self.id], cell, update)
    }

    /// Derived signal that drops consecutive duplicate values.
    pub fn drop_repeats(&self) -> Signal<T>
    where
        T: PartialEq,
    {
        self.filter_previous(|previous, next| previous.map_or(true, |p| p != next))
    }

    /// Reduce every value this signal produces into an accumulator.
    ///
    /// The derived signal starts out holding `seed`.
    pub fn fold<B, F>(&self, f: F, seed: B) -> Signal<B>
    where
        B: Clone + Send + Sync + 'static,
        F: Fn(B, &T) -> B + Send + Sync + 'static,
    {
        let parent = Arc::clone(&self.cell);
        let cell: ValueCell<B> = Arc::new(RwLock::new(Some(seed)));
        let out = Arc::clone(&cell);
        let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
            let value = parent.read().clone();
            if let Some(next) = value {
                let acc = { out.read().clone() };
                if let Some(acc) = acc {
                    ctx.emit(&out, f(acc, &next));
                }
            }
        });
        register(&self.core, NodeId::next(), &[self.id], cell, update)
    }

    /// Merge this signal with another; see [`merge_all`].
    pub fn merge(&self, other: &Signal<T>) -> Signal<T> {
        merge_all(&[self.clone(), other.clone()])
    }

    /// Pair this signal's value with another's.
    ///
    /// Updates whenever either side emits, once both sides have a value.
    /// Both parents settle before the pair recomputes, so one upstream
    /// injection reaching both sides yields a single consistent pair.
    pub fn zip<U>(&self, other: &Signal<U>) -> Signal<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        let left = Arc::clone(&self.cell);
        let right = Arc::clone(&other.cell);
        let initial = match (left.read().clone(), right.read().clone()) {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        };
        let cell: ValueCell<(T, U)> = Arc::new(RwLock::new(initial));
        let out = Arc::clone(&cell);
        let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
            if let (Some(a), Some(b)) = (left.read().clone(), right.read().clone()) {
                ctx.emit(&out, (a, b));
            }
        });
        register(
            &self.core,
            NodeId::next(),
            &[self.id, other.id],
            cell,
            update,
        )
    }

    /// On every update of this signal, emit the current value of `tag`.
    ///
    /// `tag` is read, not watched: its own updates do not trigger the
    /// derived signal.
    pub fn sample<U>(&self, tag: &Signal<U>) -> Signal<U>
    where
        U: Clone + Send + Sync + 'static,
    {
        let tag_cell = Arc::clone(&tag.cell);
        let initial = tag_cell.read().clone();
        let cell: ValueCell<U> = Arc::new(RwLock::new(initial));
        let out = Arc::clone(&cell);
        let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
            if let Some(value) = tag_cell.read().clone() {
                ctx.emit(&out, value);
            }
        });
        register(&self.core, NodeId::next(), &[self.id], cell, update)
    }

    /// Pass values through only while `guard` currently holds `true`.
    ///
    /// Like [`Signal::sample`]'s tag, the guard is read, not watched.
    pub fn gate(&self, guard: &Signal<bool>) -> Signal<T> {
        self.gated(guard, true)
    }

    /// Pass values through only while `guard` is absent or `false`.
    pub fn gate_not(&self, guard: &Signal<bool>) -> Signal<T> {
        self.gated(guard, false)
    }

    fn gated(&self, guard: &Signal<bool>, wanted: bool) -> Signal<T> {
        let parent = Arc::clone(&self.cell);
        let guard_cell = Arc::clone(&guard.cell);
        let open = move || guard_cell.read().unwrap_or(false) == wanted;
        let initial = if open() { parent.read().clone() } else { None };
        let cell: ValueCell<T> = Arc::new(RwLock::new(initial));
        let out = Arc::clone(&cell);
        let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
            if !open() {
                return;
            }
            if let Some(value) = parent.read().clone() {
                ctx.emit(&out, value);
            }
        });
        register(&self.core, NodeId::next(), &[self.id], cell, update)
    }

    /// Pass through at most `limit` values, then tear the node down.
    pub fn take(&self, limit: usize) -> Signal<T> {
        let parent = Arc::clone(&self.cell);
        let cell: ValueCell<T> = Arc::new(RwLock::new(None));
        let out = Arc::clone(&cell);
        let id = NodeId::next();
        let remaining = Arc::new(AtomicUsize::new(limit));
        let core = Arc::downgrade(&self.core);
        let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
            if remaining.load(Ordering::SeqCst) == 0 {
                if let Some(core) = core.upgrade() {
                    core.close(id);
                }
                return;
            }
            let value = parent.read().clone();
            if let Some(value) = value {
                ctx.emit(&out, value);
                if remaining.fetch_sub(1, Ordering::SeqCst) == 1 {
                    if let Some(core) = core.upgrade() {
                        core.close(id);
                    }
                }
            }
        });
        register(&self.core, id, &[self.id], cell, update)
    }

    /// Re-emit every value of this signal `duration` later.
    ///
    /// The initial value (if the parent has one) is carried over
    /// synchronously; only subsequent updates are delayed. Each delayed
    /// emission is an independent injection, so ordering with respect to
    /// other injections follows timer order alone.
    pub fn delay(&self, duration: Duration) -> Signal<T> {
        let parent = Arc::clone(&self.cell);
        let initial = parent.read().clone();
        let cell: ValueCell<T> = Arc::new(RwLock::new(initial));
        let out = Arc::clone(&cell);
        let id = NodeId::next();
        let core = Arc::downgrade(&self.core);
        let timer = Arc::clone(&self.core.timer);
        let update: UpdateFn = Arc::new(move |_: &mut PassCtx| {
            let Some(saved) = parent.read().clone() else {
                return;
            };
            let core = core.clone();
            let out = Arc::clone(&out);
            timer.schedule(
                duration,
                Box::new(move || {
                    if let Some(core) = core.upgrade() {
                        core.inject(
                            id,
                            Box::new(move || {
                                *out.write() = Some(saved);
                                true
                            }),
                        );
                    }
                }),
            );
        });
        register(&self.core, id, &[self.id], cell, update)
    }

    /// Emit only after this signal has been quiet for `duration`.
    ///
    /// Every parent update restarts the window; when a window finally
    /// elapses untouched, the parent's value at that moment is emitted.
    pub fn debounce(&self, duration: Duration) -> Signal<T> {
        let parent = Arc::clone(&self.cell);
        let cell: ValueCell<T> = Arc::new(RwLock::new(None));
        let out = Arc::clone(&cell);
        let id = NodeId::next();
        let core = Arc::downgrade(&self.core);
        let timer = Arc::clone(&self.core.timer);
        let generation = Arc::new(AtomicU64::new(0));
        let update: UpdateFn = Arc::new(move |_: &mut PassCtx| {
            let current = generation.fetch_add(1, Ordering::SeqCst) + 1;
            let generation = Arc::clone(&generation);
            let parent = Arc::clone(&parent);
            let out = Arc::clone(&out);
            let core = core.clone();
            timer.schedule(
                duration,
                Box::new(move || {
                    if generation.load(Ordering::SeqCst) != current {
                        // Restarted in the meantime.
                        return;
                    }
                    if let Some(core) = core.upgrade() {
                        core.inject(
                            id,
                            Box::new(move || match parent.read().clone() {
                                Some(value) => {
                                    *out.write() = Some(value);
                                    true
                                }
                                None => false,
                            }),
                        );
                    }
                }),
            );
        });
        register(&self.core, id, &[self.id], cell, update)
    }

    /// Call `f` with the current value (if any) and with every subsequent
    /// value of this signal.
    ///
    /// Returns the observer node so the caller can [`Signal::close`] it to
    /// unsubscribe.
    pub fn on_value<F>(&self, f: F) -> Signal<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let parent = Arc::clone(&self.cell);
        let initial = parent.read().clone();
        let cell: ValueCell<T> = Arc::new(RwLock::new(initial.clone()));
        let f = Arc::new(f);
        let callback = Arc::clone(&f);
        let update: UpdateFn = Arc::new(move |_: &mut PassCtx| {
            if let Some(value) = parent.read().clone() {
                (*callback)(&value);
            }
        });
        let observer = register(&self.core, NodeId::next(), &[self.id], cell, update);
        if let Some(value) = initial {
            (*f)(&value);
        }
        observer
    }

    /// Like [`Signal::on_value`], with consecutive duplicates dropped.
    pub fn on_change<F>(&self, f: F) -> Signal<T>
    where
        T: PartialEq,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.drop_repeats().on_value(f)
    }

    /// Call `f` with every *future* value of this signal, ignoring the
    /// value it currently holds.
    pub fn on_next<F>(&self, f: F) -> Signal<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let parent = Arc::clone(&self.cell);
        let cell: ValueCell<T> = Arc::new(RwLock::new(None));
        let f = Arc::new(f);
        let update: UpdateFn = Arc::new(move |_: &mut PassCtx| {
            if let Some(value) = parent.read().clone() {
                (*f)(&value);
            }
        });
        register(&self.core, NodeId::next(), &[self.id], cell, update)
    }

    /// Pass-through node that logs every value at debug level.
    pub fn log_values(&self, label: &str) -> Signal<T>
    where
        T: fmt::Debug,
    {
        let parent = Arc::clone(&self.cell);
        let initial = parent.read().clone();
        let cell: ValueCell<T> = Arc::new(RwLock::new(initial));
        let out = Arc::clone(&cell);
        let label = label.to_string();
        let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
            if let Some(value) = parent.read().clone() {
                tracing::debug!(label = %label, value = ?value, "signal value");
                ctx.emit(&out, value);
            }
        });
        register(&self.core, NodeId::next(), &[self.id], cell, update)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            id: self.id,
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Signal<T>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id.raw())
            .field("value", &self.get())
            .finish()
    }
}

/// Merge any number of signals into one that re-emits whatever any of
/// them emits.
///
/// When several parents emit in the same propagation pass, the merged
/// signal takes the value of the one that settled last. The initial value
/// is the first parent that already holds one.
///
/// # Panics
///
/// Panics when `signals` is empty; a merge needs at least one input.
pub fn merge_all<T>(signals: &[Signal<T>]) -> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    assert!(!signals.is_empty(), "merge_all requires at least one signal");

    let parents: Vec<NodeId> = signals.iter().map(|s| s.id).collect();
    let cells: Vec<(NodeId, ValueCell<T>)> = signals
        .iter()
        .map(|s| (s.id, Arc::clone(&s.cell)))
        .collect();
    let initial = cells.iter().find_map(|(_, cell)| cell.read().clone());
    let cell: ValueCell<T> = Arc::new(RwLock::new(initial));
    let out = Arc::clone(&cell);
    let update: UpdateFn = Arc::new(move |ctx: &mut PassCtx| {
        let Some(updated) = ctx.updated_parent() else {
            return;
        };
        if let Some((_, source)) = cells.iter().find(|(id, _)| *id == updated) {
            if let Some(value) = source.read().clone() {
                ctx.emit(&out, value);
            }
        }
    });
    register(&signals[0].core, NodeId::next(), &parents, cell, update)
}

/// Lift a plain value into a unary function, for use with `map`, `filter`
/// and friends when the result should not depend on the input.
pub fn constant<A, T>(value: T) -> impl Fn(&A) -> T
where
    T: Clone,
{
    move |_| value.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimer;
    use std::sync::atomic::AtomicI32;

    fn graph() -> (Graph, Arc<ManualTimer>) {
        let timer = Arc::new(ManualTimer::new());
        (Graph::new(timer.clone() as Arc<dyn Timer>), timer)
    }

    #[test]
    fn push_and_get() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        assert_eq!(source.get(), None);
        assert!(!source.has_value());

        source.push(42).unwrap();
        assert_eq!(source.get(), Some(42));
        assert!(source.has_value());
    }

    #[test]
    fn source_with_initial_value() {
        let (graph, _) = graph();
        let source = graph.source_with(7);
        assert_eq!(source.get(), Some(7));
    }

    #[test]
    fn push_into_derived_is_rejected() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let doubled = source.map(|n| n * 2);

        let err = doubled.push(1).unwrap_err();
        assert_eq!(err, GraphError::NotASource(doubled.id()));
    }

    #[test]
    fn push_into_closed_is_rejected() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        source.close();

        let err = source.push(1).unwrap_err();
        assert_eq!(err, GraphError::Closed(source.id()));
    }

    #[test]
    fn map_follows_parent() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let doubled = source.map(|n| n * 2);

        source.push(4).unwrap();
        assert_eq!(doubled.get(), Some(8));

        source.push(5).unwrap();
        assert_eq!(doubled.get(), Some(10));
    }

    #[test]
    fn map_initial_value_is_computed_eagerly() {
        let (graph, _) = graph();
        let source = graph.source_with(3);
        let doubled = source.map(|n| n * 2);
        assert_eq!(doubled.get(), Some(6));
    }

    #[test]
    fn filter_blocks_failing_values() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let big = source.filter(|n| *n > 2);

        source.push(1).unwrap();
        assert_eq!(big.get(), None);

        source.push(5).unwrap();
        assert_eq!(big.get(), Some(5));
    }

    #[test]
    fn filter_is_a_propagation_barrier() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let _observer = source
            .filter(|n| *n > 2)
            .on_next(move |_| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            });

        source.push(1).unwrap();
        source.push(2).unwrap();
        source.push(3).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_repeats_emits_once_per_distinct_value() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let distinct = source.drop_repeats();
        let _observer = distinct.on_next(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        source.push(5).unwrap();
        source.push(5).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(distinct.get(), Some(5));

        source.push(6).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fold_accumulates() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let total = source.fold(|acc, n| acc + n, 0);

        assert_eq!(total.get(), Some(0));

        source.push(2).unwrap();
        source.push(3).unwrap();
        assert_eq!(total.get(), Some(5));
    }

    #[test]
    fn merge_takes_latest_updater() {
        let (graph, _) = graph();
        let left = graph.source::<i32>();
        let right = graph.source::<i32>();
        let merged = left.merge(&right);

        left.push(1).unwrap();
        assert_eq!(merged.get(), Some(1));

        right.push(2).unwrap();
        assert_eq!(merged.get(), Some(2));

        left.push(3).unwrap();
        assert_eq!(merged.get(), Some(3));
    }

    #[test]
    fn merge_initial_is_first_parent_with_value() {
        let (graph, _) = graph();
        let empty = graph.source::<i32>();
        let seeded = graph.source_with(9);
        let merged = merge_all(&[empty.clone(), seeded.clone()]);
        assert_eq!(merged.get(), Some(9));
    }

    #[test]
    fn zip_pairs_values() {
        let (graph, _) = graph();
        let left = graph.source::<i32>();
        let right = graph.source::<&'static str>();
        let pair = left.zip(&right);

        left.push(1).unwrap();
        assert_eq!(pair.get(), None);

        right.push("one").unwrap();
        assert_eq!(pair.get(), Some((1, "one")));

        left.push(2).unwrap();
        assert_eq!(pair.get(), Some((2, "one")));
    }

    #[test]
    fn sample_reads_tag_without_watching_it() {
        let (graph, _) = graph();
        let trigger = graph.source::<()>();
        let tag = graph.source::<i32>();
        let sampled = trigger.sample(&tag);

        tag.push(10).unwrap();
        // The tag updating does not trigger the sample.
        assert_eq!(sampled.get(), None);

        trigger.push(()).unwrap();
        assert_eq!(sampled.get(), Some(10));

        tag.push(20).unwrap();
        assert_eq!(sampled.get(), Some(10));

        trigger.push(()).unwrap();
        assert_eq!(sampled.get(), Some(20));
    }

    #[test]
    fn gate_follows_guard() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let guard = graph.source::<bool>();
        let gated = source.gate(&guard);

        source.push(1).unwrap();
        assert_eq!(gated.get(), None);

        guard.push(true).unwrap();
        source.push(2).unwrap();
        assert_eq!(gated.get(), Some(2));

        guard.push(false).unwrap();
        source.push(3).unwrap();
        assert_eq!(gated.get(), Some(2));
    }

    #[test]
    fn gate_not_is_open_while_guard_is_absent() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let guard = graph.source::<bool>();
        let gated = source.gate_not(&guard);

        source.push(1).unwrap();
        assert_eq!(gated.get(), Some(1));

        guard.push(true).unwrap();
        source.push(2).unwrap();
        assert_eq!(gated.get(), Some(1));
    }

    #[test]
    fn take_stops_after_limit_and_closes_itself() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let first_two = source.take(2);
        let nodes_before = graph.node_count();

        source.push(1).unwrap();
        assert_eq!(first_two.get(), Some(1));

        source.push(2).unwrap();
        assert_eq!(first_two.get(), Some(2));

        source.push(3).unwrap();
        assert_eq!(first_two.get(), Some(2));
        assert_eq!(graph.node_count(), nodes_before - 1);
    }

    #[test]
    fn delay_emits_after_timer_fires() {
        let (graph, timer) = graph();
        let source = graph.source::<i32>();
        let delayed = source.delay(Duration::from_millis(100));

        source.push(1).unwrap();
        assert_eq!(delayed.get(), None);

        timer.advance(Duration::from_millis(99));
        assert_eq!(delayed.get(), None);

        timer.advance(Duration::from_millis(1));
        assert_eq!(delayed.get(), Some(1));
    }

    #[test]
    fn delay_after_close_does_not_resurrect() {
        let (graph, timer) = graph();
        let source = graph.source::<i32>();
        let delayed = source.delay(Duration::from_millis(50));

        source.push(1).unwrap();
        delayed.close();
        timer.advance(Duration::from_millis(50));

        assert_eq!(delayed.get(), None);
    }

    #[test]
    fn debounce_waits_for_quiet() {
        let (graph, timer) = graph();
        let source = graph.source::<i32>();
        let settled = source.debounce(Duration::from_millis(100));

        source.push(1).unwrap();
        timer.advance(Duration::from_millis(60));
        source.push(2).unwrap();
        timer.advance(Duration::from_millis(60));

        // The first window was restarted by the second push.
        assert_eq!(settled.get(), None);

        timer.advance(Duration::from_millis(40));
        assert_eq!(settled.get(), Some(2));
    }

    #[test]
    fn on_value_fires_immediately_and_on_updates() {
        let (graph, _) = graph();
        let source = graph.source_with(1);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _observer = source.on_value(move |v| seen_clone.lock().push(*v));

        source.push(2).unwrap();
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn on_next_ignores_current_value() {
        let (graph, _) = graph();
        let source = graph.source_with(1);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _observer = source.on_next(move |v| seen_clone.lock().push(*v));

        source.push(2).unwrap();
        assert_eq!(*seen.lock(), vec![2]);
    }

    #[test]
    fn closed_observer_stops_firing() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();
        let observer = source.on_next(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        source.push(1).unwrap();
        observer.close();
        source.push(2).unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reentrant_push_is_deferred_to_its_own_pass() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let feedback = source.clone();
        let _observer = source.on_next(move |v| {
            seen_clone.lock().push(*v);
            if *v < 3 {
                feedback.push(*v + 1).unwrap();
            }
        });

        source.push(1).unwrap();

        // Each push got its own settled pass, in FIFO order.
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn constant_ignores_its_input() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let tagged = source.map(constant("tick"));

        source.push(1).unwrap();
        assert_eq!(tagged.get(), Some("tick"));
    }

    #[test]
    fn signal_clone_shares_state() {
        let (graph, _) = graph();
        let source = graph.source::<i32>();
        let alias = source.clone();

        source.push(5).unwrap();
        assert_eq!(alias.get(), Some(5));
        assert_eq!(alias.id(), source.id());
    }
}
