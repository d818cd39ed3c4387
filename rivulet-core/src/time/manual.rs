//! Manual Timer
//!
//! A timer with a virtual clock, for deterministic tests. Nothing runs
//! until [`ManualTimer::advance`] is called; advancing runs every callback
//! whose deadline falls inside the step, in deadline order (FIFO among
//! equal deadlines), with the virtual clock set to each callback's own
//! deadline while it runs. That last detail matters: a callback that
//! schedules again (a debounce restart, a chained deferral) lands at the
//! correct virtual time.

use std::time::Duration;

use parking_lot::Mutex;

use super::{Timer, TimerCallback};

struct Scheduled {
    due: Duration,
    seq: u64,
    callback: TimerCallback,
}

struct ManualState {
    now: Duration,
    next_seq: u64,
    queue: Vec<Scheduled>,
}

/// A [`Timer`] driven by hand.
pub struct ManualTimer {
    state: Mutex<ManualState>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Duration::ZERO,
                next_seq: 0,
                queue: Vec::new(),
            }),
        }
    }

    /// The current virtual time.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of callbacks still waiting.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Move virtual time forward by `step`, running every callback that
    /// comes due along the way.
    ///
    /// Callbacks run outside the timer's lock, so they may schedule
    /// further callbacks; ones that come due within the same step run too.
    pub fn advance(&self, step: Duration) {
        let target = self.state.lock().now + step;

        loop {
            let next = {
                let mut state = self.state.lock();
                let due_index = state
                    .queue
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.due <= target)
                    .min_by_key(|(_, entry)| (entry.due, entry.seq))
                    .map(|(index, _)| index);

                match due_index {
                    Some(index) => {
                        let entry = state.queue.swap_remove(index);
                        state.now = state.now.max(entry.due);
                        Some(entry.callback)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            match next {
                Some(callback) => callback(),
                None => break,
            }
        }
    }
}

impl Default for ManualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) {
        let mut state = self.state.lock();
        let due = state.now + delay;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(Scheduled { due, seq, callback });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn nothing_runs_without_advance() {
        let timer = ManualTimer::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        timer.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.pending(), 1);
    }

    #[test]
    fn callbacks_run_in_deadline_order() {
        let timer = ManualTimer::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for (delay, tag) in [(30u64, "late"), (10, "early"), (20, "middle")] {
            let order = order.clone();
            timer.schedule(
                Duration::from_millis(delay),
                Box::new(move || order.lock().push(tag)),
            );
        }

        timer.advance(Duration::from_millis(100));
        assert_eq!(*order.lock(), vec!["early", "middle", "late"]);
    }

    #[test]
    fn equal_deadlines_run_fifo() {
        let timer = ManualTimer::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            timer.schedule(Duration::ZERO, Box::new(move || order.lock().push(tag)));
        }

        timer.advance(Duration::ZERO);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn nested_schedules_within_the_step_still_run() {
        let timer = Arc::new(ManualTimer::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let timer_clone = timer.clone();
        let fired_clone = fired.clone();
        timer.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                let fired = fired_clone.clone();
                timer_clone.schedule(
                    Duration::from_millis(10),
                    Box::new(move || {
                        fired.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        timer.advance(Duration::from_millis(20));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(timer.now(), Duration::from_millis(20));
    }

    #[test]
    fn nested_schedule_beyond_the_step_waits() {
        let timer = Arc::new(ManualTimer::new());
        let fired = Arc::new(AtomicUsize::new(0));

        let timer_clone = timer.clone();
        let fired_clone = fired.clone();
        timer.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                let fired = fired_clone.clone();
                timer_clone.schedule(
                    Duration::from_millis(50),
                    Box::new(move || {
                        fired.fetch_add(1, Ordering::SeqCst);
                    }),
                );
            }),
        );

        timer.advance(Duration::from_millis(20));
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        timer.advance(Duration::from_millis(40));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
