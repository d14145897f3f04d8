//! Earthquake alert orchestration: feed polling, prerequisite-driven task
//! dispatch, per-recipient fanout, and free-text routing.

pub mod compose;
pub mod coordinator;
pub mod deps;
pub mod detector;
pub mod dispatcher;
pub mod fanout;
pub mod feed;
#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;
pub mod generator;
pub mod graph;
pub mod handlers;
pub mod http;
pub mod news;
pub mod notify;
pub mod poller;
pub mod reference;

pub use coordinator::{Coordinator, Reply, Route};
pub use deps::Deps;
pub use dispatcher::{Dispatcher, Handler, Inputs, TaskOutput, TaskResult};
pub use poller::{CycleOutcome, Poller};
