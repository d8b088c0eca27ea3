//! Fixed-size pool of named worker threads.
//!
//! Tasks are boxed closures drained FIFO from a shared channel. The pool keeps
//! an outstanding-task counter so owners can wait for completion with a bound
//! (`wait_idle`) instead of joining threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker pool '{0}' is shut down")]
    Closed(String),
}

/// Count of submitted-but-unfinished tasks.
#[derive(Debug, Default)]
struct Outstanding {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Outstanding {
    fn add(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn current(&self) -> usize {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        let count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        let (count, _) = self
            .idle
            .wait_timeout_while(count, timeout, |c| *c > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }
}

/// Fixed-size worker pool.
///
/// Dropping the pool closes its queue without joining: workers finish what is
/// already queued and then exit on their own.
#[derive(Debug)]
pub struct WorkerPool {
    name: String,
    sender: Option<mpsc::Sender<Task>>,
    workers: Vec<thread::JoinHandle<()>>,
    outstanding: Arc<Outstanding>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one) named `{name}-{index}`.
    pub fn new(name: impl Into<String>, size: usize) -> Result<Self, PoolError> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));
        let outstanding = Arc::new(Outstanding::default());

        let mut workers = Vec::with_capacity(size.max(1));
        for index in 0..size.max(1) {
            let worker_name = format!("{name}-{index}");
            let receiver = receiver.clone();
            let outstanding = outstanding.clone();
            let handle = thread::Builder::new()
                .name(worker_name.clone())
                .spawn({
                    let worker_name = worker_name.clone();
                    move || worker_loop(&worker_name, &receiver, &outstanding)
                })
                .map_err(|source| PoolError::Spawn {
                    name: worker_name,
                    source,
                })?;
            workers.push(handle);
        }

        Ok(Self {
            name,
            sender: Some(sender),
            workers,
            outstanding,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a task. Never blocks.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| PoolError::Closed(self.name.clone()))?;

        self.outstanding.add();
        if sender.send(Box::new(task)).is_err() {
            self.outstanding.done();
            return Err(PoolError::Closed(self.name.clone()));
        }
        Ok(())
    }

    /// Tasks submitted but not yet finished.
    pub fn outstanding(&self) -> usize {
        self.outstanding.current()
    }

    /// Block until every submitted task has finished or `timeout` elapses.
    /// Returns `true` when the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.outstanding.wait_idle(timeout)
    }

    /// Close the queue and join every worker once queued work is drained.
    pub fn shutdown(mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!(pool = %self.name, "worker thread panicked outside a task");
            }
        }
    }

    /// Close the queue and detach the workers without waiting for them.
    pub fn abandon(mut self) {
        self.sender.take();
        let detached = self.workers.drain(..).count();
        debug!(pool = %self.name, detached, outstanding = self.outstanding(), "worker pool abandoned");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();
    }
}

fn worker_loop(name: &str, receiver: &Mutex<mpsc::Receiver<Task>>, outstanding: &Outstanding) {
    debug!(worker = name, "worker started");

    loop {
        let next = {
            let receiver = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };
        let Ok(task) = next else {
            break;
        };

        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            error!(worker = name, "worker task panicked");
        }
        outstanding.done();
    }

    debug!(worker = name, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_task() {
        let pool = WorkerPool::new("test-pool", 3).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..50 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 50);
        assert_eq!(pool.outstanding(), 0);
        pool.shutdown();
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new("panicky", 1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        pool.submit(|| panic!("boom")).unwrap();
        let c = counter.clone();
        pool.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert!(pool.wait_idle(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        pool.shutdown();
    }

    #[test]
    fn wait_idle_times_out_on_slow_work() {
        let pool = WorkerPool::new("slow", 1).unwrap();
        pool.submit(|| thread::sleep(Duration::from_millis(300))).unwrap();

        assert!(!pool.wait_idle(Duration::from_millis(20)));
        assert_eq!(pool.outstanding(), 1);
        pool.abandon();
    }

    #[test]
    fn zero_size_still_gets_one_worker() {
        let pool = WorkerPool::new("tiny", 0).unwrap();
        assert_eq!(pool.size(), 1);
        pool.shutdown();
    }
}
