//! A small fixed-size worker pool with a bounded queue.
//!
//! Used to issue descriptor and version-range requests in parallel while the
//! graph-building step stays single-threaded. Workers are daemon-style: they
//! are never joined, and an idle worker exits after `keep_alive`, so the pool
//! needs no explicit shutdown.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Shared pool handle; cloning hands out another reference to the same pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    name: String,
    tx: SyncSender<Job>,
    rx: Mutex<Receiver<Job>>,
    workers: AtomicUsize,
    max_workers: usize,
    keep_alive: Duration,
}

impl WorkerPool {
    /// Create a pool that runs at most `max_workers` jobs concurrently and
    /// buffers at most `queue_capacity` pending jobs. `submit` applies
    /// backpressure once the queue is full.
    pub fn new(name: &str, max_workers: usize, queue_capacity: usize, keep_alive: Duration) -> Self {
        let (tx, rx) = std::sync::mpsc::sync_channel(queue_capacity.max(1));
        Self {
            inner: Arc::new(PoolInner {
                name: name.to_string(),
                tx,
                rx: Mutex::new(rx),
                workers: AtomicUsize::new(0),
                max_workers: max_workers.max(1),
                keep_alive,
            }),
        }
    }

    /// Submit a job, blocking while the queue is full.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job: Job = Box::new(job);
        self.spawn_worker_if_needed();
        match self.inner.tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                // All workers busy and the queue at capacity; make sure a
                // worker exists, then block on the slow path.
                self.spawn_worker_if_needed();
                if self.inner.tx.send(job).is_err() {
                    tracing::warn!("worker pool {} dropped a job", self.inner.name);
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                // The receiver lives inside `inner`, so this cannot occur
                // while the pool handle itself is alive.
                tracing::warn!("worker pool {} is disconnected", self.inner.name);
            }
        }
    }

    /// Number of live worker threads. Workers time out when idle, so this
    /// decays back to zero between bursts.
    pub fn worker_count(&self) -> usize {
        self.inner.workers.load(Ordering::Acquire)
    }

    fn spawn_worker_if_needed(&self) {
        let inner = &self.inner;
        let grew = inner
            .workers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                if n < inner.max_workers {
                    Some(n + 1)
                } else {
                    None
                }
            })
            .is_ok();
        if !grew {
            return;
        }

        let pool = Arc::clone(inner);
        let index = pool.workers.load(Ordering::Acquire);
        let spawn = std::thread::Builder::new()
            .name(format!("{}-{index}", pool.name))
            .spawn(move || worker_loop(pool));
        if let Err(err) = spawn {
            self.inner.workers.fetch_sub(1, Ordering::AcqRel);
            tracing::warn!("failed to spawn worker for {}: {err}", self.inner.name);
        }
    }
}

fn worker_loop(inner: Arc<PoolInner>) {
    loop {
        let job = {
            let rx = lock(&inner.rx);
            rx.recv_timeout(inner.keep_alive)
        };
        match job {
            Ok(job) => job(),
            Err(RecvTimeoutError::Timeout) => {
                inner.workers.fetch_sub(1, Ordering::AcqRel);
                // A job may have been queued between the timeout and the
                // decrement; drain once so it is not stranded.
                let raced = {
                    let rx = lock(&inner.rx);
                    rx.try_recv()
                };
                match raced {
                    Ok(job) => {
                        inner.workers.fetch_add(1, Ordering::AcqRel);
                        job();
                    }
                    Err(_) => return,
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                inner.workers.fetch_sub(1, Ordering::AcqRel);
                return;
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn runs_all_submitted_jobs() {
        let pool = WorkerPool::new("test", 4, 16, Duration::from_millis(200));
        let (tx, rx) = mpsc::channel();
        for i in 0..50 {
            let tx = tx.clone();
            pool.submit(move || {
                let _ = tx.send(i);
            });
        }
        drop(tx);
        let mut seen: Vec<i32> = rx.iter().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn never_exceeds_max_workers() {
        let pool = WorkerPool::new("capped", 2, 64, Duration::from_millis(200));
        let (tx, rx) = mpsc::channel();
        for _ in 0..20 {
            let tx = tx.clone();
            pool.submit(move || {
                std::thread::sleep(Duration::from_millis(5));
                let _ = tx.send(());
            });
        }
        drop(tx);
        assert!(pool.worker_count() <= 2);
        assert_eq!(rx.iter().count(), 20);
    }

    #[test]
    fn idle_workers_expire() {
        let pool = WorkerPool::new("idle", 2, 4, Duration::from_millis(50));
        let (tx, rx) = mpsc::channel();
        pool.submit(move || {
            let _ = tx.send(());
        });
        rx.recv().ok();

        let deadline = Instant::now() + Duration::from_secs(2);
        while pool.worker_count() > 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(pool.worker_count(), 0);
    }
}
