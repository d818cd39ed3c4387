//! Rivulet Core
//!
//! This crate provides the core runtime for the Rivulet reactive dataflow
//! library. It implements:
//!
//! - A push-based signal graph: sources, derived signals, and a
//!   propagation engine that settles the whole graph once per injection
//! - Deferred tasks: composable units of failable, possibly-asynchronous
//!   work speaking a resolve/reject/progress continuation protocol
//! - The bridge that runs tasks carried on a signal and feeds their
//!   results back into plain values
//! - An explicit timer capability, with a tokio-backed implementation for
//!   production and a virtual-clock implementation for deterministic tests
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `signal`: the reactive graph — node arena, propagation engine, and
//!   the `Signal` combinators (`map`, `filter`, `fold`, `merge`, `zip`,
//!   `sample`, `gate`, `take`, `delay`, `debounce`, ...)
//! - `task`: the `Task` protocol and its combinators (`map`, `and_then`,
//!   `recover`, `sequence`, `join_all`, ...) plus the `drive` bridge
//! - `time`: the `Timer` trait and its implementations
//! - `env`: mode flags and a mock registry, consulted only for
//!   diagnostics
//!
//! Signals push: when a source is injected, every affected derived signal
//! recomputes synchronously, exactly once, in dependency order. Tasks
//! pull nothing and cache nothing: each run is an independent execution
//! reporting through its sinks.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rivulet_core::{drive, Graph, ManualTimer, Task};
//!
//! let timer = Arc::new(ManualTimer::new());
//! let graph = Graph::new(timer.clone());
//!
//! // A graph of derived values...
//! let celsius = graph.source::<f64>();
//! let fahrenheit = celsius.map(|c| c * 9.0 / 5.0 + 32.0);
//!
//! // ...and a queue of work feeding it.
//! let readings = graph.source::<Task<String, f64, ()>>();
//! let sink = celsius.clone();
//! drive(&readings, move |value| {
//!     let _ = sink.push(value);
//! });
//!
//! readings.push(Task::succeed(100.0)).unwrap();
//! assert_eq!(fahrenheit.get(), Some(212.0));
//! ```

pub mod env;
pub mod signal;
pub mod task;
pub mod time;

pub use signal::{constant, merge_all, Graph, GraphError, NodeId, Signal};
pub use task::{drive, join_all, sequence, Sinks, Task};
pub use time::{ManualTimer, Timer, TokioTimer};
