//! A small, fixed-size worker pool for fanning out per-repository
//! searches.
//!
//! Hand-rolled on `std::thread` + `mpsc` rather than a crate like
//! rayon: the pool is deliberately tiny (two workers by default — these
//! are I/O- and CPU-heavy searches) and the dispatch logic is a dozen
//! lines, not worth a dependency for.

use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|_| {
                let receiver = Arc::clone(&receiver);
                thread::spawn(move || loop {
                    let job = receiver.lock().unwrap().recv();
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                })
            })
            .collect();

        WorkerPool {
            sender: Some(sender),
            workers,
        }
    }

    /// Queues `job` for execution by the next free worker. Submission
    /// never blocks the caller.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(Box::new(job));
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Dropping the sender closes the channel, which unblocks every
        // worker's `recv()` once its current job (if any) finishes.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
