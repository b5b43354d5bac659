//! Cancellation signal shared by every blocking operation in the crate.
//!
//! A [`Context`] is fired either explicitly through [`Context::cancel`] or
//! when its deadline passes. Firing is observed through [`Context::done`], a
//! receiver that never yields a value but becomes disconnected, so it can sit
//! in any `select!` next to the channel being waited on.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use crossbeam::select;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

/// Why a context fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    Cancelled,
    DeadlineExceeded,
}

#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<State>,
    done: Receiver<()>,
    deadline: Option<Instant>,
}

struct State {
    // dropping the only sender disconnects `done`
    trigger: Option<Sender<()>>,
    reason: Option<CancelReason>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fire(&self, reason: CancelReason) {
        let mut state = self.state();
        if let Some(trigger) = state.trigger.take() {
            state.reason = Some(reason);
            drop(trigger);
        }
    }
}

impl Context {
    /// A root context. It only fires when cancelled.
    pub fn new() -> Context {
        Context::with_parts(None)
    }

    fn with_parts(deadline: Option<Instant>) -> Context {
        let (trigger, done) = channel::bounded(0);
        Context {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    trigger: Some(trigger),
                    reason: None,
                }),
                done,
                deadline,
            }),
        }
    }

    /// A child that fires when this context fires or when it is cancelled itself.
    pub fn child(&self) -> Context {
        self.derive(self.deadline())
    }

    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    /// A child that additionally fires at `deadline`. The parent's deadline
    /// still applies when it is earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Context {
        let deadline = match self.deadline() {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        self.derive(Some(deadline))
    }

    fn derive(&self, deadline: Option<Instant>) -> Context {
        let child = Context::with_parts(deadline);

        if let Some(reason) = self.err() {
            child.inner.fire(reason);
            return child;
        }
        if let Some(at) = deadline {
            if at <= Instant::now() {
                child.inner.fire(CancelReason::DeadlineExceeded);
                return child;
            }
        }

        let parent = self.clone();
        let own_done = child.inner.done.clone();
        let weak: Weak<Inner> = Arc::downgrade(&child.inner);
        let timer = match deadline {
            Some(at) => channel::at(at),
            None => channel::never(),
        };
        // exits once either side fires or every handle to the child is gone
        thread::spawn(move || {
            let reason = select! {
                recv(parent.done()) -> _ => parent.err(),
                recv(timer) -> _ => Some(CancelReason::DeadlineExceeded),
                recv(own_done) -> _ => None,
            };
            if let (Some(reason), Some(inner)) = (reason, weak.upgrade()) {
                inner.fire(reason);
            }
        });

        child
    }

    /// Fires the context. Calling it again has no effect.
    pub fn cancel(&self) {
        self.inner.fire(CancelReason::Cancelled);
    }

    /// Ready (disconnected) once the context has fired.
    pub fn done(&self) -> &Receiver<()> {
        &self.inner.done
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub fn err(&self) -> Option<CancelReason> {
        self.inner.state().reason
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent() {
        let ctx = Context::new();
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        ctx.cancel();
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.err(), Some(CancelReason::Cancelled));
    }

    #[test]
    fn child_keeps_earlier_parent_deadline() {
        let parent = Context::new().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[test]
    fn dropping_parent_handle_does_not_fire_child() {
        let parent = Context::new();
        let child = parent.child();
        drop(parent);
        thread::sleep(Duration::from_millis(20));
        assert!(!child.is_cancelled());
    }
}
