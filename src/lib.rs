//! Concurrency building blocks: a bounded worker pool, channel combinators,
//! a shared counter and a small HTTP server, all cancelled through one
//! [`Context`].

pub mod channels;
pub mod context;
pub mod counter;
pub mod error;
pub mod server;
pub mod worker_pool;

pub use context::{CancelReason, Context};
pub use counter::{process_items, AtomicCounter, Counter, MutexCounter};
pub use error::{Error, ErrorKind, Result};
pub use worker_pool::{Task, TaskId, TaskOutcome, WorkerPool};
