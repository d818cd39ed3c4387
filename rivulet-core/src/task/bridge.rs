//! Signal/Task Bridge
//!
//! The one place the reactive graph and the task protocol meet: a signal
//! carrying tasks on one side, a plain value callback on the other.

use std::fmt;
use std::sync::Arc;

use crate::env;
use crate::signal::Signal;

use super::{Sinks, Task};

/// Run every task observed on `tasks` and feed resolutions into
/// `on_value`.
///
/// Rejections are logged and dropped, as are progress reports (the latter
/// only in dev mode); map a task's failure into its success channel
/// upstream ([`Task::recover`]) if its errors matter.
///
/// There is no backpressure and no reordering: `on_value` is called in
/// completion order, which for slow tasks may differ from submission
/// order. Callers that need strict ordering should sequence their tasks
/// before pushing them (see [`crate::task::sequence`]).
///
/// Returns the observer node; closing it stops the driving.
pub fn drive<E, V, P, F>(tasks: &Signal<Task<E, V, P>>, on_value: F) -> Signal<Task<E, V, P>>
where
    E: fmt::Debug + 'static,
    V: 'static,
    P: fmt::Debug + 'static,
    F: Fn(V) + Send + Sync + 'static,
{
    let on_value = Arc::new(on_value);
    tasks.on_value(move |task: &Task<E, V, P>| {
        let on_value = Arc::clone(&on_value);
        task.run(
            Sinks::new(
                move |value| (*on_value)(value),
                |err: E| tracing::warn!(err = ?err, "error running driven task"),
            )
            .on_progress(|progress: P| {
                if env::is_dev() {
                    tracing::debug!(progress = ?progress, "driven task progress");
                }
            }),
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Graph;
    use crate::time::{ManualTimer, Timer};
    use parking_lot::Mutex;
    use std::time::Duration;

    fn graph() -> (Graph, Arc<ManualTimer>) {
        let timer = Arc::new(ManualTimer::new());
        (Graph::new(timer.clone() as Arc<dyn Timer>), timer)
    }

    #[test]
    fn resolutions_reach_the_callback() {
        let (graph, _) = graph();
        let tasks = graph.source::<Task<i32, i32, i32>>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _driver = drive(&tasks, move |v| seen_clone.lock().push(v));

        tasks.push(Task::succeed(1)).unwrap();
        tasks.push(Task::succeed(2)).unwrap();

        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn rejections_are_swallowed() {
        let (graph, _) = graph();
        let tasks = graph.source::<Task<i32, i32, i32>>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _driver = drive(&tasks, move |v| seen_clone.lock().push(v));

        tasks.push(Task::fail(9)).unwrap();
        tasks.push(Task::succeed(1)).unwrap();

        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn deferred_tasks_complete_in_timer_order() {
        let (graph, timer) = graph();
        let tasks = graph.source::<Task<i32, i32, i32>>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _driver = drive(&tasks, move |v| seen_clone.lock().push(v));

        let timer_capability = timer.clone() as Arc<dyn Timer>;
        tasks
            .push(Task::delay(
                Arc::clone(&timer_capability),
                Duration::from_millis(50),
                1,
            ))
            .unwrap();
        tasks
            .push(Task::delay(timer_capability, Duration::from_millis(10), 2))
            .unwrap();

        timer.advance(Duration::from_millis(50));

        // Completion order, not submission order.
        assert_eq!(*seen.lock(), vec![2, 1]);
    }

    #[test]
    fn closed_driver_stops_running_tasks() {
        let (graph, _) = graph();
        let tasks = graph.source::<Task<i32, i32, i32>>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let driver = drive(&tasks, move |v| seen_clone.lock().push(v));

        tasks.push(Task::succeed(1)).unwrap();
        driver.close();
        tasks.push(Task::succeed(2)).unwrap();

        assert_eq!(*seen.lock(), vec![1]);
    }

    #[test]
    fn a_task_already_on_the_signal_is_driven_at_subscribe_time() {
        let (graph, _) = graph();
        let tasks = graph.source_with(Task::<i32, i32, i32>::succeed(7));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _driver = drive(&tasks, move |v| seen_clone.lock().push(v));

        assert_eq!(*seen.lock(), vec![7]);
    }
}
