use crossbeam::channel::Receiver;
use crossbeam::sync::WaitGroup;
use slog::{error, warn};

use super::{
    pool::{Worker, WorkerSeed},
    Message,
};
use crate::error::Result;

/// It supervises workers
pub(crate) struct Supervisor<T, O> {
    workers: Vec<Worker>,
    receiver: Receiver<Message>,
    seed: WorkerSeed<T, O>,
}

impl<T, O> Supervisor<T, O>
where
    T: Send + 'static,
    O: Send + 'static,
{
    /// Spawns `size` workers, each holding a slot of `wait_group`.
    pub(crate) fn new(
        receiver: Receiver<Message>,
        seed: WorkerSeed<T, O>,
        size: usize,
        wait_group: &WaitGroup,
    ) -> Result<Self> {
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::spawn(id, &seed, wait_group.clone())?);
        }
        Ok(Supervisor {
            workers,
            receiver,
            seed,
        })
    }

    // listen to channel
    pub(crate) fn watch(&mut self) {
        while let Ok(message) = self.receiver.recv() {
            match message {
                Message::Dead { id, slot } => {
                    warn!(self.seed.logger, "worker panicked, respawning"; "worker" => id);
                    match Worker::spawn(id, &self.seed, slot) {
                        Ok(worker) => {
                            // find original place of worker
                            if let Some(place) = self.workers.iter_mut().find(|w| w.id() == id) {
                                *place = worker;
                            }
                        }
                        Err(e) => {
                            error!(self.seed.logger, "unable to respawn worker"; "worker" => id, "error" => %e);
                        }
                    }
                }
                Message::Terminate => break,
            }
        }

        for worker in self.workers.drain(..) {
            let id = worker.id();
            if worker.join().is_err() {
                warn!(self.seed.logger, "worker exited by panic"; "worker" => id);
            }
        }
    }
}
