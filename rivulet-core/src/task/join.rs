//! Task Aggregation
//!
//! Combinators over collections of tasks: run them one after another
//! ([`sequence`]) or all at once and wait for everybody ([`join_all`]).

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Sinks, Task};

/// Run `tasks` in order, each starting when the previous one resolves.
///
/// Resolves with the *last* task's value; every intermediate value is
/// discarded. The first rejection short-circuits the rest. An empty input
/// has nothing to resolve with and yields [`Task::never`].
pub fn sequence<E, V, P>(tasks: Vec<Task<E, V, P>>) -> Task<E, V, P>
where
    E: 'static,
    V: 'static,
    P: 'static,
{
    let mut tasks = tasks.into_iter();
    let Some(first) = tasks.next() else {
        tracing::debug!("sequence of zero tasks never settles");
        return Task::never();
    };
    tasks.fold(first, |acc, next| acc.then(next))
}

/// State shared by every member of a [`join_all`].
struct JoinState<V> {
    slots: Vec<Option<V>>,
    completed: usize,
}

/// Run every task concurrently and resolve once all of them have
/// finished, with one slot per task in input order.
///
/// A member's rejection does not fail the aggregate: it is logged, its
/// slot stays `None`, and it still counts toward completion. Member
/// progress reports are logged and dropped. The aggregate itself never
/// rejects.
pub fn join_all<E, V, P>(tasks: Vec<Task<E, V, P>>) -> Task<E, Vec<Option<V>>, P>
where
    E: fmt::Debug + 'static,
    V: Send + 'static,
    P: fmt::Debug + 'static,
{
    let tasks = Arc::new(tasks);
    Task::sync(move |sinks: Sinks<E, Vec<Option<V>>, P>| {
        let total = tasks.len();
        if total == 0 {
            sinks.resolve(Vec::new());
            return;
        }

        // One counter, one slot vector, one lock: members may settle
        // synchronously, from timers, in any interleaving.
        let state = Arc::new(Mutex::new(JoinState {
            slots: (0..total).map(|_| None).collect(),
            completed: 0,
        }));

        for (index, task) in tasks.iter().enumerate() {
            let on_resolve = Arc::clone(&state);
            let on_reject = Arc::clone(&state);
            let resolve_sinks = sinks.clone();
            let reject_sinks = sinks.clone();

            task.run(
                Sinks::new(
                    move |value| {
                        let mut state = on_resolve.lock();
                        state.slots[index] = Some(value);
                        state.completed += 1;
                        if state.completed == total {
                            let slots = std::mem::take(&mut state.slots);
                            drop(state);
                            resolve_sinks.resolve(slots);
                        }
                    },
                    move |err| {
                        tracing::error!(err = ?err, "task in join_all rejected");
                        let mut state = on_reject.lock();
                        state.completed += 1;
                        if state.completed == total {
                            let slots = std::mem::take(&mut state.slots);
                            drop(state);
                            reject_sinks.resolve(slots);
                        }
                    },
                )
                .on_progress(|progress| {
                    tracing::debug!(progress = ?progress, "progress in join_all");
                }),
            );
        }
    })
}
