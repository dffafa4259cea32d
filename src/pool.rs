//! Fixed-size worker pool consuming a bounded task queue.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::validation::require_worker_count_within_cap;

/// Above this worker count the `2*W` queue-capacity computation risks
/// overflowing a `usize` on exotic platforms; this is a guard against that,
/// not a resource ceiling (spec.md §9 "Worker cap").
const MAX_WORKERS: usize = usize::MAX / 4;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A fixed pool of OS threads draining a bounded MPMC queue.
///
/// The `Running -> Closing -> Closed` state machine lives behind a
/// `parking_lot::RwLock<bool>` closed flag: `submit` takes the shared (read)
/// lock so any number of submitters can check-and-send concurrently, and
/// `close` takes the exclusive (write) lock before flipping the flag and
/// dropping the sender — this is exactly the discipline spec.md §4.2
/// describes to keep `submit` and `close` from racing.
pub struct WorkerPool {
    sender: RwLock<Option<Sender<Task>>>,
    workers: RwLock<Vec<JoinHandle<()>>>,
    closing: AtomicBool,
}

impl WorkerPool {
    /// `workers <= 0` is normalized to 1. `workers` above [`MAX_WORKERS`]
    /// fails construction rather than risk overflowing the queue-capacity
    /// computation.
    pub fn new(workers: i64) -> Result<Self> {
        let worker_count = if workers <= 0 { 1 } else { workers as usize };
        require_worker_count_within_cap(worker_count, MAX_WORKERS)?;
        let capacity = worker_count.saturating_mul(2).max(1);
        let (sender, receiver) = bounded::<Task>(capacity);

        let mut workers_vec = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let receiver: Receiver<Task> = receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("vertexdb-worker-{index}"))
                .spawn(move || Self::run(index, receiver))
                .expect("failed to spawn worker thread");
            workers_vec.push(handle);
        }

        info!(worker_count, capacity, "worker pool started");
        Ok(Self {
            sender: RwLock::new(Some(sender)),
            workers: RwLock::new(workers_vec),
            closing: AtomicBool::new(false),
        })
    }

    fn run(index: usize, receiver: Receiver<Task>) {
        while let Ok(task) = receiver.recv() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(worker = index, panic = %message, "task panicked, worker continuing");
            }
        }
        debug!(worker = index, "worker drained queue and exited");
    }

    /// Enqueues `task`. Returns `false` without running it if the pool is
    /// closed or closing. Blocks the caller if the queue is full
    /// (cooperative backpressure), never if the pool is merely busy.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
        let guard = self.sender.read();
        match guard.as_ref() {
            Some(sender) => {
                let accepted = sender.send(Box::new(task)).is_ok();
                if accepted {
                    debug!("task submitted");
                } else {
                    debug!("submit rejected: channel disconnected");
                }
                accepted
            }
            None => {
                debug!("submit rejected: pool closed");
                false
            }
        }
    }

    /// Idempotent, blocking shutdown. Safe to call concurrently from
    /// multiple threads; only the first caller actually performs the
    /// transition, the rest observe the same terminal state.
    pub fn close(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            // Another thread is already closing (or has closed); join the
            // same drain by waiting on the workers lock below.
        } else {
            let mut sender_guard = self.sender.write();
            sender_guard.take();
            info!("worker pool closing");
        }

        let mut workers = self.workers.write();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    /// Equivalent to [`WorkerPool::close`] in this design.
    pub fn wait(&self) {
        self.close();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.close();
    }
}

/// A count-down barrier used to join adaptively-spawned DFS children before
/// their parent call returns (spec.md §5, "level barriers / wait groups").
pub struct WaitGroup {
    inner: Arc<WaitGroupInner>,
}

struct WaitGroupInner {
    state: parking_lot::Mutex<usize>,
    condvar: parking_lot::Condvar,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(WaitGroupInner {
                state: parking_lot::Mutex::new(0),
                condvar: parking_lot::Condvar::new(),
            }),
        }
    }

    pub fn add(&self, count: usize) {
        *self.inner.state.lock() += count;
    }

    pub fn done(&self) {
        let mut guard = self.inner.state.lock();
        *guard -= 1;
        if *guard == 0 {
            self.inner.condvar.notify_all();
        }
    }

    pub fn wait(&self) {
        let mut guard = self.inner.state.lock();
        while *guard != 0 {
            self.inner.condvar.wait(&mut guard);
        }
    }

    pub fn clone_handle(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GraphError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn negative_worker_count_normalizes_to_one() {
        let pool = WorkerPool::new(-5).unwrap();
        pool.close();
    }

    #[test]
    fn excessive_worker_count_fails_construction() {
        let err = WorkerPool::new((MAX_WORKERS as i64) + 1).unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));
    }

    #[test]
    fn submit_after_close_is_rejected() {
        let pool = WorkerPool::new(2).unwrap();
        pool.close();
        assert!(!pool.submit(|| {}));
    }

    #[test]
    fn panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        assert!(pool.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
            panic!("boom");
        }));
        let c2 = Arc::clone(&counter);
        assert!(pool.submit(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        }));
        pool.close();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn idempotent_close_from_many_threads() {
        let pool = Arc::new(WorkerPool::new(4).unwrap());
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || pool.close())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn concurrent_submit_and_close_race() {
        let pool = Arc::new(WorkerPool::new(4).unwrap());
        let executed = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::new(AtomicUsize::new(0));

        let submitters: Vec<_> = (0..10)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let executed = Arc::clone(&executed);
                let accepted = Arc::clone(&accepted);
                thread::spawn(move || {
                    for _ in 0..10 {
                        let executed = Arc::clone(&executed);
                        if pool.submit(move || {
                            executed.fetch_add(1, Ordering::SeqCst);
                        }) {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(5));
        pool.close();

        for h in submitters {
            h.join().unwrap();
        }

        assert!(executed.load(Ordering::SeqCst) <= accepted.load(Ordering::SeqCst));
    }

    #[test]
    fn wait_group_joins_spawned_children() {
        let wg = WaitGroup::new();
        let counter = Arc::new(AtomicUsize::new(0));
        wg.add(3);
        for _ in 0..3 {
            let wg = wg.clone_handle();
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                wg.done();
            });
        }
        wg.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
