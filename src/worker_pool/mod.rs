use crossbeam::sync::WaitGroup;
use std::sync::Arc;

mod pool;
mod supervisor;
pub use pool::WorkerPool;

pub type TaskId = u64;

/// A unit of work. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task<T> {
    id: TaskId,
    payload: T,
}

impl<T> Task<T> {
    pub fn new(id: TaskId, payload: T) -> Self {
        Task { id, payload }
    }

    /// Numbers the payloads 1..=n in iteration order.
    pub fn batch<I>(payloads: I) -> Vec<Task<T>>
    where
        I: IntoIterator<Item = T>,
    {
        payloads
            .into_iter()
            .zip(1..)
            .map(|(payload, id)| Task::new(id, payload))
            .collect()
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }

    pub fn into_payload(self) -> T {
        self.payload
    }
}

/// What a worker produced for one task. The pool never looks at `error`,
/// it only carries it back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome<O> {
    pub task_id: TaskId,
    pub output: Option<O>,
    pub error: Option<String>,
}

impl<O> TaskOutcome<O> {
    pub fn ok(task_id: TaskId, output: O) -> Self {
        TaskOutcome {
            task_id,
            output: Some(output),
            error: None,
        }
    }

    pub fn failed(task_id: TaskId, error: impl Into<String>) -> Self {
        TaskOutcome {
            task_id,
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub(crate) type Processor<T, O> = Arc<dyn Fn(Task<T>) -> TaskOutcome<O> + Send + Sync>;

pub(crate) enum Message {
    // a worker died while processing; `slot` keeps its place in the wait group
    Dead { id: usize, slot: WaitGroup },
    Terminate,
}
