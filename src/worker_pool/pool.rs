use super::{supervisor::Supervisor, Message, Processor, Task, TaskOutcome};
use crate::context::Context;
use crate::error::{Error, ErrorKind, Result};
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use crossbeam::select;
use crossbeam::sync::WaitGroup;
use slog::{debug, o, warn, Discard, Logger};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A fixed number of worker threads pulling [`Task`]s from a bounded queue
/// and pushing [`TaskOutcome`]s onto another.
///
/// Both queues hold `2 * worker_count` items. The pool is single use:
/// `start` once, feed it, `stop` once.
pub struct WorkerPool<T, O> {
    worker_count: usize,
    tasks_tx: Option<Sender<Task<T>>>,
    tasks_rx: Receiver<Task<T>>,
    results_tx: Option<Sender<TaskOutcome<O>>>,
    results_rx: Receiver<TaskOutcome<O>>,
    wait_group: Option<WaitGroup>,
    supervisor: Option<(Sender<Message>, JoinHandle<()>)>,
    stopped: bool,
    logger: Logger,
}

impl<T, O> WorkerPool<T, O>
where
    T: Send + 'static,
    O: Send + 'static,
{
    pub fn new(worker_count: usize) -> Result<Self> {
        Self::with_logger(worker_count, Logger::root(Discard, o!()))
    }

    pub fn with_logger(worker_count: usize, logger: Logger) -> Result<Self> {
        let capacity = match worker_count.checked_mul(2) {
            Some(capacity) if worker_count > 0 => capacity,
            _ => return Err(ErrorKind::InvalidWorkerCount(worker_count).into()),
        };
        let (tasks_tx, tasks_rx) = bounded(capacity);
        let (results_tx, results_rx) = bounded(capacity);

        Ok(WorkerPool {
            worker_count,
            tasks_tx: Some(tasks_tx),
            tasks_rx,
            results_tx: Some(results_tx),
            results_rx,
            wait_group: None,
            supervisor: None,
            stopped: false,
            logger,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Capacity of each of the two queues.
    pub fn capacity(&self) -> usize {
        // checked in `with_logger`
        self.worker_count * 2
    }

    /// Spawns the workers. Each one runs `process` on the tasks it receives
    /// until the task queue is closed and drained or `ctx` fires.
    pub fn start<F>(&mut self, ctx: &Context, process: F) -> Result<()>
    where
        F: Fn(Task<T>) -> TaskOutcome<O> + Send + Sync + 'static,
    {
        if self.stopped {
            return Err(ErrorKind::PoolStopped.into());
        }
        let results = match self.results_tx.take() {
            Some(results) => results,
            None => return Err(ErrorKind::AlreadyStarted.into()),
        };

        let wait_group = WaitGroup::new();
        let (notifier, receiver) = unbounded::<Message>();
        let seed = WorkerSeed {
            ctx: ctx.clone(),
            tasks: self.tasks_rx.clone(),
            results,
            process: Arc::new(process),
            notifier: notifier.clone(),
            logger: self.logger.clone(),
        };

        let mut supervisor = Supervisor::new(receiver, seed, self.worker_count, &wait_group)?;
        let handle = thread::Builder::new()
            .name("pool-supervisor".to_string())
            .spawn(move || supervisor.watch())?;

        debug!(self.logger, "worker pool started"; "workers" => self.worker_count);
        self.wait_group = Some(wait_group);
        self.supervisor = Some((notifier, handle));
        Ok(())
    }

    /// Enqueues a task, blocking while the queue is full.
    pub fn submit(&self, task: Task<T>) -> Result<()> {
        let tasks = self.tasks_tx.as_ref().ok_or(ErrorKind::PoolStopped)?;
        tasks
            .send(task)
            .map_err(|_| Error::from(ErrorKind::PoolStopped))
    }

    /// Like [`submit`](Self::submit), but gives up with
    /// [`ErrorKind::Cancelled`] once `ctx` fires.
    pub fn submit_with_context(&self, ctx: &Context, task: Task<T>) -> Result<()> {
        let tasks = self.tasks_tx.as_ref().ok_or(ErrorKind::PoolStopped)?;
        send_task(tasks, ctx, task)
    }

    /// The outcome queue. Iterating it ends once the pool is stopped.
    pub fn results(&self) -> Receiver<TaskOutcome<O>> {
        self.results_rx.clone()
    }

    /// Closes the task queue, waits for every worker to exit and then closes
    /// the outcome queue. Workers blocked on a full outcome queue only exit
    /// once it is drained or their context fires.
    pub fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Err(ErrorKind::AlreadyStopped.into());
        }
        self.stopped = true;
        self.close_tasks();

        if let Some(wait_group) = self.wait_group.take() {
            wait_group.wait();
        }
        if let Some((notifier, handle)) = self.supervisor.take() {
            // the supervisor still holds a clone of the outcome sender
            let _ = notifier.send(Message::Terminate);
            if handle.join().is_err() {
                warn!(self.logger, "pool supervisor panicked");
            }
        }
        self.results_tx.take();

        debug!(self.logger, "worker pool stopped");
        Ok(())
    }

    /// Starts the pool, submits every task and collects one outcome per
    /// task. Outcomes arrive in completion order.
    ///
    /// Tasks are submitted from a helper thread while this one collects, so
    /// batches larger than the queues cannot wedge the pool. The task queue
    /// is closed as soon as the last task is accepted.
    ///
    /// A task whose processing function panics yields a failed outcome
    /// instead of none, so the batch always completes.
    ///
    /// If `ctx` fires while submitting, nothing is returned; if it fires
    /// while collecting, whatever arrived so far is returned.
    pub fn process_tasks<F>(
        &mut self,
        ctx: &Context,
        tasks: Vec<Task<T>>,
        process: F,
    ) -> Result<Vec<TaskOutcome<O>>>
    where
        F: Fn(Task<T>) -> TaskOutcome<O> + Send + Sync + 'static,
    {
        self.start(ctx, move |task: Task<T>| {
            let id = task.id();
            catch_unwind(AssertUnwindSafe(|| process(task)))
                .unwrap_or_else(|_| TaskOutcome::failed(id, "task panicked"))
        })?;
        let sender = self.tasks_tx.take().ok_or(ErrorKind::PoolStopped)?;

        let expected = tasks.len();
        let results = &self.results_rx;
        let mut outcomes = Vec::with_capacity(expected);
        let submitted = crossbeam::scope(|scope| {
            let submitter = scope.spawn(move |_| {
                for task in tasks {
                    if send_task(&sender, ctx, task).is_err() {
                        return false;
                    }
                }
                // `sender` is the last one: dropping it closes the task queue
                true
            });

            while outcomes.len() < expected {
                let next = select! {
                    recv(results) -> outcome => outcome.ok(),
                    recv(ctx.done()) -> _ => None,
                };
                match next {
                    Some(outcome) => outcomes.push(outcome),
                    None => break,
                }
            }
            submitter.join().unwrap_or(false)
        })
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic));

        if !submitted {
            debug!(self.logger, "submission cancelled"; "collected" => outcomes.len());
            return Ok(Vec::new());
        }
        Ok(outcomes)
    }

    fn close_tasks(&mut self) {
        self.tasks_tx.take();
    }
}

impl<T, O> Drop for WorkerPool<T, O> {
    // without joining: workers blocked on the outcome queue see it disconnect
    fn drop(&mut self) {
        self.tasks_tx.take();
        if let Some((notifier, _)) = self.supervisor.take() {
            let _ = notifier.send(Message::Terminate);
        }
    }
}

/// Everything needed to spawn (or respawn) a worker.
pub(crate) struct WorkerSeed<T, O> {
    ctx: Context,
    tasks: Receiver<Task<T>>,
    results: Sender<TaskOutcome<O>>,
    process: Processor<T, O>,
    notifier: Sender<Message>,
    pub(crate) logger: Logger,
}

pub(crate) struct Worker {
    id: usize,
    thread: JoinHandle<()>,
}

impl Worker {
    pub(crate) fn spawn<T, O>(id: usize, seed: &WorkerSeed<T, O>, slot: WaitGroup) -> Result<Worker>
    where
        T: Send + 'static,
        O: Send + 'static,
    {
        let guard = WorkerGuard {
            id,
            slot: Some(slot),
            notifier: seed.notifier.clone(),
        };
        let ctx = seed.ctx.clone();
        let tasks = seed.tasks.clone();
        let results = seed.results.clone();
        let process = Arc::clone(&seed.process);
        let logger = seed.logger.new(o!("worker" => id));

        let thread = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || {
                // declared first so it is released after `results` is dropped
                let _guard = guard;
                do_work(&ctx, &tasks, results, &process, &logger);
            })?;

        Ok(Worker { id, thread })
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn join(self) -> std::thread::Result<()> {
        self.thread.join()
    }
}

// Holds the worker's wait group slot. On a panic the slot goes to the
// supervisor instead of being released.
struct WorkerGuard {
    id: usize,
    slot: Option<WaitGroup>,
    notifier: Sender<Message>,
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            if let Some(slot) = self.slot.take() {
                // a closed supervisor just releases the slot
                let _ = self.notifier.send(Message::Dead { id: self.id, slot });
            }
        }
    }
}

fn send_task<T>(tasks: &Sender<Task<T>>, ctx: &Context, task: Task<T>) -> Result<()> {
    if ctx.is_cancelled() {
        return Err(ErrorKind::Cancelled.into());
    }
    select! {
        send(tasks, task) -> res => res.map_err(|_| Error::from(ErrorKind::PoolStopped)),
        recv(ctx.done()) -> _ => Err(ErrorKind::Cancelled.into()),
    }
}

fn do_work<T, O>(
    ctx: &Context,
    tasks: &Receiver<Task<T>>,
    results: Sender<TaskOutcome<O>>,
    process: &Processor<T, O>,
    logger: &Logger,
) {
    loop {
        let task = select! {
            recv(tasks) -> task => task.ok(),
            recv(ctx.done()) -> _ => None,
        };
        let task = match task {
            Some(task) => task,
            None => break,
        };

        let outcome = process(task);
        let delivered = select! {
            send(results, outcome) -> res => res.is_ok(),
            recv(ctx.done()) -> _ => false,
        };
        if !delivered {
            break;
        }
    }
    debug!(logger, "worker exiting"; "cancelled" => ctx.is_cancelled());
}
