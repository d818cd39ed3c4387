//! Timers
//!
//! Everything in this crate that needs to wake up later — `delay`,
//! `debounce`, deferred tasks — goes through the [`Timer`] capability
//! instead of an ambient clock. Production code hands the graph a
//! [`TokioTimer`]; tests hand it a [`ManualTimer`] and advance virtual
//! time explicitly, which makes every timing-dependent behavior
//! deterministic.

mod manual;
mod runtime;

pub use manual::ManualTimer;
pub use runtime::TokioTimer;

use std::time::Duration;

/// A callback handed to a timer, run once when its deadline is reached.
pub type TimerCallback = Box<dyn FnOnce() + Send>;

/// The scheduling capability.
///
/// `schedule` never blocks and gives no handle back: cancellation is the
/// caller's problem (graph nodes guard their callbacks against their own
/// teardown, debounce guards with a generation counter).
pub trait Timer: Send + Sync {
    /// Run `callback` once `delay` has elapsed. A zero delay means "next
    /// tick": the callback must not run inside this call.
    fn schedule(&self, delay: Duration, callback: TimerCallback);
}
