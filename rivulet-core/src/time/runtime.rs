//! Tokio Timer
//!
//! The production [`Timer`]: each scheduled callback becomes a task on a
//! tokio runtime that sleeps out its delay and then runs the callback.
//! The timer holds a runtime [`Handle`], not a runtime, so it can be
//! created from inside any running runtime and cloned freely.

use std::time::Duration;

use tokio::runtime::Handle;

use super::{Timer, TimerCallback};

/// A [`Timer`] backed by a tokio runtime.
#[derive(Clone)]
pub struct TokioTimer {
    handle: Handle,
}

impl TokioTimer {
    /// Build a timer on an explicit runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Build a timer on the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime, like
    /// [`Handle::current`].
    pub fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) {
        self.handle.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            } else {
                // Still yield once so a zero-delay callback never runs
                // inside `schedule`.
                tokio::task::yield_now().await;
            }
            callback();
        });
    }
}
