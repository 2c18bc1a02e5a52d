//! Interval scheduler for background jobs.
//!
//! An explicit service owned by the manager: each database gets one
//! registered job (its compaction tick) and a [`JobHandle`] the manager
//! keeps for cancellation. Jobs run on plain threads driven by a
//! crossbeam ticker; a job that returns an error is logged and retried
//! on the next tick.
//!
//! Cancellation works by dropping channel senders: a closed cancel or
//! shutdown channel wakes the job thread immediately, so neither
//! [`JobHandle::cancel`] nor [`Scheduler::shutdown`] waits out a tick.

use std::sync::Mutex;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select, tick};
use tracing::{debug, error, info};

use crate::error::Result;

/// Handle to one registered job. Dropping the handle also stops the
/// job (its cancel channel closes); [`JobHandle::cancel`] additionally
/// joins the job thread.
pub struct JobHandle {
    name: String,
    cancel: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl JobHandle {
    /// Stops the job and joins its thread.
    pub fn cancel(mut self) {
        self.cancel_in_place();
    }

    fn cancel_in_place(&mut self) {
        // Closing the channel wakes the job loop.
        self.cancel.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        debug!(job = %self.name, "job cancelled");
    }
}

/// Thread-per-job interval scheduler.
pub struct Scheduler {
    /// Kept only so shutdown can close it; cloned into every job.
    shutdown: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        Self {
            shutdown: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
        }
    }

    /// Registers a job that runs every `interval` until cancelled or
    /// the scheduler shuts down.
    pub fn register<F>(&self, name: impl Into<String>, interval: Duration, job: F) -> JobHandle
    where
        F: Fn() -> Result<()> + Send + 'static,
    {
        let name = name.into();
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let shutdown_rx = self.shutdown_rx.clone();
        let thread_name = name.clone();

        let thread = thread::spawn(move || {
            let ticker = tick(interval);
            let mut run_id = 0u64;
            loop {
                select! {
                    recv(ticker) -> _ => {
                        run_id += 1;
                        debug!(job = %thread_name, run_id, "job tick");
                        if let Err(e) = job() {
                            error!(job = %thread_name, run_id, error = %e, "job failed");
                        }
                    }
                    recv(cancel_rx) -> msg => {
                        if msg.is_err() {
                            info!(job = %thread_name, "job stopping (cancelled)");
                            break;
                        }
                    }
                    recv(shutdown_rx) -> msg => {
                        if msg.is_err() {
                            info!(job = %thread_name, "job stopping (scheduler shutdown)");
                            break;
                        }
                    }
                }
            }
        });

        info!(job = %name, interval_secs = interval.as_secs_f64(), "job registered");
        JobHandle {
            name,
            cancel: Some(cancel_tx),
            thread: Some(thread),
        }
    }

    /// Signals every registered job to stop. Threads are joined by
    /// their handles' owners (or detach on drop).
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.shutdown.lock() {
            guard.take();
        }
        info!("scheduler shut down");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
