//! Deferred Tasks
//!
//! A [`Task`] is a unit of potentially-failing, potentially-asynchronous
//! work. It holds no result; running it hands the computation a set of
//! [`Sinks`] — three continuations for success, failure and progress —
//! and the computation reports through exactly one of the first two.
//!
//! # Protocol
//!
//! - A computation calls `resolve` or `reject` exactly once per run, and
//!   may call `progress` any number of times before settling. The sinks
//!   enforce this: after the first settlement, later settlements and
//!   progress reports are logged and dropped.
//! - A task may be run any number of times; each run is an independent
//!   execution. Nothing is cached.
//! - [`Task::sync`] runs its computation inside `run`; [`Task::deferred`]
//!   schedules it on a [`Timer`] so the caller can never observe partial
//!   synchronous side effects.
//!
//! Failure values travel on the reject channel and are always
//! recoverable ([`Task::recover`], [`Task::or_value`]). A panic inside a
//! computation is a programmer error and unwinds; fallible Rust code
//! should enter the protocol through [`Task::from_fallible`].
//!
//! Tasks know nothing about signals; the bridge (see [`drive`]) is the
//! one place the two meet.
//!
//! [`drive`]: crate::task::drive

mod bridge;
mod join;

pub use bridge::drive;
pub use join::{join_all, sequence};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::time::Timer;

/// The three continuations handed to a running computation.
///
/// Cloning shares the settlement state: all clones together still settle
/// at most once.
pub struct Sinks<E, V, P> {
    settled: Arc<AtomicBool>,
    resolve: Arc<dyn Fn(V) + Send + Sync>,
    reject: Arc<dyn Fn(E) + Send + Sync>,
    progress: Option<Arc<dyn Fn(P) + Send + Sync>>,
}

impl<E, V, P> Sinks<E, V, P> {
    /// Build sinks from a success and a failure continuation.
    pub fn new(
        resolve: impl Fn(V) + Send + Sync + 'static,
        reject: impl Fn(E) + Send + Sync + 'static,
    ) -> Self {
        Self {
            settled: Arc::new(AtomicBool::new(false)),
            resolve: Arc::new(resolve),
            reject: Arc::new(reject),
            progress: None,
        }
    }

    /// Attach a progress continuation.
    pub fn on_progress(mut self, progress: impl Fn(P) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    /// Report success. First settlement wins; anything after is dropped.
    pub fn resolve(&self, value: V) {
        if self.settled.swap(true, Ordering::SeqCst) {
            tracing::warn!("task already settled; dropping resolve");
            return;
        }
        (*self.resolve)(value);
    }

    /// Report failure. First settlement wins; anything after is dropped.
    pub fn reject(&self, err: E) {
        if self.settled.swap(true, Ordering::SeqCst) {
            tracing::warn!("task already settled; dropping reject");
            return;
        }
        (*self.reject)(err);
    }

    /// Report progress. Ignored (with a debug line) once settled or when
    /// no progress continuation is attached.
    pub fn progress(&self, value: P) {
        if self.settled.load(Ordering::SeqCst) {
            tracing::debug!("task already settled; dropping progress");
            return;
        }
        if let Some(progress) = self.progress.as_deref() {
            progress(value);
        }
    }

    /// Whether a settlement has already happened.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }
}

impl<E, V, P> Clone for Sinks<E, V, P> {
    fn clone(&self) -> Self {
        Self {
            settled: Arc::clone(&self.settled),
            resolve: Arc::clone(&self.resolve),
            reject: Arc::clone(&self.reject),
            progress: self.progress.as_ref().map(Arc::clone),
        }
    }
}

/// A deferred computation with typed failure (`E`), success (`V`) and
/// progress (`P`) channels.
///
/// Cloning is cheap and shares the computation.
pub struct Task<E, V, P> {
    computation: Arc<dyn Fn(Sinks<E, V, P>) + Send + Sync>,
}

impl<E, V, P> Clone for Task<E, V, P> {
    fn clone(&self) -> Self {
        Self {
            computation: Arc::clone(&self.computation),
        }
    }
}

impl<E, V, P> Task<E, V, P>
where
    E: 'static,
    V: 'static,
    P: 'static,
{
    /// A task that runs `computation` synchronously inside [`Task::run`].
    pub fn sync(computation: impl Fn(Sinks<E, V, P>) + Send + Sync + 'static) -> Self {
        Self {
            computation: Arc::new(computation),
        }
    }

    /// A task that schedules `computation` on `timer` with zero delay, so
    /// `run` returns before the computation starts.
    pub fn deferred(
        timer: Arc<dyn Timer>,
        computation: impl Fn(Sinks<E, V, P>) + Send + Sync + 'static,
    ) -> Self {
        let computation: Arc<dyn Fn(Sinks<E, V, P>) + Send + Sync> = Arc::new(computation);
        Self {
            computation: Arc::new(move |sinks: Sinks<E, V, P>| {
                let computation = Arc::clone(&computation);
                timer.schedule(Duration::ZERO, Box::new(move || (*computation)(sinks)));
            }),
        }
    }

    /// Run the computation once with the given sinks.
    pub fn run(&self, sinks: Sinks<E, V, P>) {
        (*self.computation)(sinks);
    }

    /// A task that always resolves with `value`.
    pub fn succeed(value: V) -> Self
    where
        V: Clone + Send + Sync,
    {
        Task::sync(move |sinks| sinks.resolve(value.clone()))
    }

    /// A task that always rejects with `err`.
    pub fn fail(err: E) -> Self
    where
        E: Clone + Send + Sync,
    {
        Task::sync(move |sinks| sinks.reject(err.clone()))
    }

    /// A task that never settles.
    pub fn never() -> Self {
        Task::sync(|_| {})
    }

    /// Lift a `Result` into the protocol: `Ok` resolves, `Err` rejects.
    pub fn from_result(result: Result<V, E>) -> Self
    where
        V: Clone + Send + Sync,
        E: Clone + Send + Sync,
    {
        Task::sync(move |sinks| match &result {
            Ok(value) => sinks.resolve(value.clone()),
            Err(err) => sinks.reject(err.clone()),
        })
    }

    /// Run a fallible function on every run, feeding its `Result` into
    /// the protocol. This is how ordinary fallible Rust code enters a
    /// task pipeline.
    pub fn from_fallible(f: impl Fn() -> Result<V, E> + Send + Sync + 'static) -> Self {
        Task::sync(move |sinks| match f() {
            Ok(value) => sinks.resolve(value),
            Err(err) => sinks.reject(err),
        })
    }

    /// A task that resolves with `value` once `duration` has elapsed on
    /// `timer`.
    pub fn delay(timer: Arc<dyn Timer>, duration: Duration, value: V) -> Self
    where
        V: Clone + Send + Sync,
    {
        Task::sync(move |sinks| {
            let value = value.clone();
            timer.schedule(duration, Box::new(move || sinks.resolve(value)));
        })
    }

    /// Transform the success value; failure and progress pass through.
    pub fn map<B>(&self, f: impl Fn(V) -> B + Send + Sync + 'static) -> Task<E, B, P>
    where
        B: 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Task {
            computation: Arc::new(move |sinks: Sinks<E, B, P>| {
                let f = Arc::clone(&f);
                let on_reject = sinks.clone();
                let on_progress = sinks.clone();
                source.run(
                    Sinks::new(
                        move |value| sinks.resolve((*f)(value)),
                        move |err| on_reject.reject(err),
                    )
                    .on_progress(move |progress| on_progress.progress(progress)),
                );
            }),
        }
    }

    /// Monadic bind: on success, run the task produced by `f` and forward
    /// its channels. A failure of the source is forwarded without
    /// invoking `f` at all.
    pub fn and_then<B>(
        &self,
        f: impl Fn(V) -> Task<E, B, P> + Send + Sync + 'static,
    ) -> Task<E, B, P>
    where
        B: 'static,
    {
        let source = self.clone();
        let f = Arc::new(f);
        Task {
            computation: Arc::new(move |sinks: Sinks<E, B, P>| {
                let f = Arc::clone(&f);
                let on_reject = sinks.clone();
                let on_progress = sinks.clone();
                source.run(
                    Sinks::new(
                        move |value| (*f)(value).run(sinks.clone()),
                        move |err| on_reject.reject(err),
                    )
                    .on_progress(move |progress| on_progress.progress(progress)),
                );
            }),
        }
    }

    /// Run `next` after this task succeeds, discarding this task's value.
    pub fn then<B>(&self, next: Task<E, B, P>) -> Task<E, B, P>
    where
        B: 'static,
    {
        self.and_then(move |_| next.clone())
    }

    /// Turn failure into success by mapping the error to a value.
    pub fn recover(&self, f: impl Fn(E) -> V + Send + Sync + 'static) -> Task<E, V, P> {
        let source = self.clone();
        let f = Arc::new(f);
        Task {
            computation: Arc::new(move |sinks: Sinks<E, V, P>| {
                let f = Arc::clone(&f);
                let on_resolve = sinks.clone();
                let on_progress = sinks.clone();
                source.run(
                    Sinks::new(
                        move |value| on_resolve.resolve(value),
                        move |err| sinks.resolve((*f)(err)),
                    )
                    .on_progress(move |progress| on_progress.progress(progress)),
                );
            }),
        }
    }

    /// Turn failure into success with a fixed fallback value.
    pub fn or_value(&self, value: V) -> Task<E, V, P>
    where
        V: Clone + Send + Sync,
    {
        self.recover(move |_| value.clone())
    }

    /// Reject successes that fail the predicate.
    ///
    /// The replacement failure carries no information beyond "the
    /// predicate said no", so it is `E::default()`.
    pub fn filter(&self, predicate: impl Fn(&V) -> bool + Send + Sync + 'static) -> Task<E, V, P>
    where
        E: Default,
    {
        let source = self.clone();
        let predicate = Arc::new(predicate);
        Task {
            computation: Arc::new(move |sinks: Sinks<E, V, P>| {
                let predicate = Arc::clone(&predicate);
                let on_reject = sinks.clone();
                let on_progress = sinks.clone();
                source.run(
                    Sinks::new(
                        move |value| {
                            if (*predicate)(&value) {
                                sinks.resolve(value);
                            } else {
                                sinks.reject(E::default());
                            }
                        },
                        move |err| on_reject.reject(err),
                    )
                    .on_progress(move |progress| on_progress.progress(progress)),
                );
            }),
        }
    }

    /// Alias of [`Task::filter`] for validation pipelines.
    pub fn validate(&self, predicate: impl Fn(&V) -> bool + Send + Sync + 'static) -> Task<E, V, P>
    where
        E: Default,
    {
        self.filter(predicate)
    }

    /// Map progress reports onto the success channel: the first progress
    /// report settles the task.
    pub fn resolve_on_progress(&self, f: impl Fn(P) -> V + Send + Sync + 'static) -> Task<E, V, P> {
        let source = self.clone();
        let f = Arc::new(f);
        Task {
            computation: Arc::new(move |sinks: Sinks<E, V, P>| {
                let f = Arc::clone(&f);
                let on_resolve = sinks.clone();
                let on_reject = sinks.clone();
                source.run(
                    Sinks::new(
                        move |value| on_resolve.resolve(value),
                        move |err| on_reject.reject(err),
                    )
                    .on_progress(move |progress| sinks.resolve((*f)(progress))),
                );
            }),
        }
    }
}

impl<E, V, P> Task<E, Task<E, V, P>, P>
where
    E: 'static,
    V: 'static,
    P: 'static,
{
    /// Flatten one level of task nesting.
    pub fn join(&self) -> Task<E, V, P> {
        self.and_then(|inner| inner)
    }
}
