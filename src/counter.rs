use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// A monotonic counter shared between threads.
pub trait Counter: Send + Sync {
    /// Adds one and returns the new value.
    fn increment(&self) -> u64;

    fn value(&self) -> u64;
}

#[derive(Debug, Default)]
pub struct AtomicCounter {
    value: AtomicU64,
}

impl AtomicCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for AtomicCounter {
    fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn value(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct MutexCounter {
    value: Mutex<u64>,
}

impl MutexCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Counter for MutexCounter {
    fn increment(&self) -> u64 {
        let mut value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        *value += 1;
        *value
    }

    fn value(&self) -> u64 {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs `processor` on every item, each on its own thread, and returns once
/// all of them are done.
pub fn process_items<T, F>(items: Vec<T>, processor: F)
where
    T: Send,
    F: Fn(T) + Sync,
{
    let processor = &processor;
    crossbeam::scope(|scope| {
        for item in items {
            scope.spawn(move |_| processor(item));
        }
    })
    // a panicking processor is re-raised on the caller
    .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
}
