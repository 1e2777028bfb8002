//! Fixed-size worker pool that runs game sessions.
//!
//! Jobs go through an unbounded crossbeam channel to `size` named threads.
//! A job that panics is caught and logged so the worker survives; anything
//! the job owned (connections, the session slot) is dropped during unwind.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tracing::error;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    /// Dropped on shutdown to close the channel, which stops the workers.
    job_sender: Option<crossbeam_channel::Sender<Job>>,
    worker_handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> std::io::Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();

        let mut handles = Vec::with_capacity(size);
        for index in 0..size {
            let rx = job_rx.clone();
            let handle = thread::Builder::new()
                .name(format!("arena-session-{index}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!(worker = index, "session job panicked");
                        }
                    }
                })?;
            handles.push(handle);
        }

        Ok(Self {
            job_sender: Some(job_tx),
            worker_handles: handles,
        })
    }

    /// Queue a job. Returns `false` once the pool has been shut down.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.job_sender {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Stop accepting jobs and detach the workers. Sessions still running
    /// finish on their own; queued jobs are still drained.
    pub fn shutdown(&mut self) {
        self.job_sender.take();
        self.worker_handles.clear();
    }

    /// Stop accepting jobs and wait for every queued and running job.
    pub fn join(mut self) {
        self.job_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
