//! Persistent worker-thread pool (spec.md §5), and the debug-only
//! single-executor guard used to assert that a critical section is only
//! ever touched by one thread at a time (reentrantly allowed).
//!
//! Grounded on `original_source/include/persistent_thread_pool.hpp` and
//! `single_executor_guard.hpp`: a fixed set of worker threads blocking on a
//! condition variable, a shared task queue, and a pending-task counter that
//! `wait_for_all_tasks` blocks on. No async runtime is involved -- the
//! original is a bare `std::thread` pool, and nothing downstream needs more
//! than a blocking join handle, so `std::sync::mpsc` is the idiomatic match
//! rather than a regression to "bare stdlib".

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// A handle to a task's eventual result, returned by [`PersistentThreadPool::enqueue`].
pub struct TaskHandle<R> {
    receiver: mpsc::Receiver<R>,
}

impl<R> TaskHandle<R> {
    /// Blocks until the task completes and returns its result.
    ///
    /// # Panics
    /// Panics if the worker that owned this task panicked before sending a
    /// result (mirrors `std::future::Future::get()` throwing on a broken
    /// promise).
    pub fn join(self) -> R {
        self.receiver.recv().expect("thread pool worker dropped without producing a result")
    }
}

struct Shared {
    queue: Mutex<std::collections::VecDeque<Task>>,
    condition: Condvar,
    all_tasks_done: Condvar,
    stop: AtomicBool,
    pending_tasks: AtomicUsize,
}

/// A fixed-size pool of persistent worker threads processing tasks from a
/// shared queue (spec.md §5).
pub struct PersistentThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl PersistentThreadPool {
    /// Spawns `num_threads` workers (`std::thread::available_parallelism`
    /// by default, mirroring `hardware_concurrency()`).
    pub fn new(num_threads: usize) -> Self {
        let shared = Arc::new(Shared {
            queue: Mutex::new(std::collections::VecDeque::new()),
            condition: Condvar::new(),
            all_tasks_done: Condvar::new(),
            stop: AtomicBool::new(false),
            pending_tasks: AtomicUsize::new(0),
        });

        let workers = (0..num_threads.max(1))
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || worker_loop(shared))
            })
            .collect();

        PersistentThreadPool { shared, workers }
    }

    /// Spawns a pool sized to the available hardware concurrency (spec.md
    /// §5: "spawns `hardware_concurrency()` workers by default").
    pub fn with_default_size() -> Self {
        let n = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self::new(n)
    }

    /// Enqueues a task, returning a handle to its eventual result
    /// (spec.md §5: "thread-safe and can be called concurrently").
    pub fn enqueue<F, R>(&self, f: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let task: Task = Box::new(move || {
            let result = f();
            let _ = sender.send(result);
        });
        {
            let mut queue = self.shared.queue.lock().expect("thread pool queue mutex poisoned");
            queue.push_back(task);
            self.shared.pending_tasks.fetch_add(1, Ordering::SeqCst);
        }
        self.shared.condition.notify_one();
        TaskHandle { receiver }
    }

    /// Blocks until the queue is empty and every dispatched task has
    /// finished (spec.md §5: `wait_for_all_tasks`).
    pub fn wait_for_all_tasks(&self) {
        let queue = self.shared.queue.lock().expect("thread pool queue mutex poisoned");
        let _guard = self
            .shared
            .all_tasks_done
            .wait_while(queue, |q| self.shared.pending_tasks.load(Ordering::SeqCst) != 0 || !q.is_empty())
            .expect("thread pool queue mutex poisoned");
    }

    /// Number of worker threads in the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().expect("thread pool queue mutex poisoned");
            loop {
                if shared.stop.load(Ordering::SeqCst) && queue.is_empty() {
                    return;
                }
                if let Some(task) = queue.pop_front() {
                    break task;
                }
                queue = shared.condition.wait(queue).expect("thread pool queue mutex poisoned");
            }
        };
        task();
        let mut queue = shared.queue.lock().expect("thread pool queue mutex poisoned");
        let remaining = shared.pending_tasks.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && queue.is_empty() {
            shared.all_tasks_done.notify_all();
        }
        drop(queue);
    }
}

impl Drop for PersistentThreadPool {
    /// Sets the stop flag, wakes every worker, and joins them (spec.md §5).
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.condition.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

// ---------------------------------------------------------------------------
// SingleExecutorGuard
// ---------------------------------------------------------------------------

/// Debug-only RAII guard enforcing that a critical section is entered by
/// exactly one thread at a time, or reentrantly by the same thread (spec.md
/// §5). A no-op in release builds, matching the original's `DEBUG_MODE`-gated
/// macro.
#[cfg(debug_assertions)]
pub struct SingleExecutorGuard<'a> {
    owner: &'a Mutex<Option<thread::ThreadId>>,
    counter: &'a AtomicUsize,
}

#[cfg(debug_assertions)]
impl<'a> SingleExecutorGuard<'a> {
    pub fn enter(owner: &'a Mutex<Option<thread::ThreadId>>, counter: &'a AtomicUsize) -> Self {
        let this_id = thread::current().id();
        let old_count = counter.fetch_add(1, Ordering::AcqRel);
        if old_count == 0 {
            *owner.lock().expect("single-executor guard mutex poisoned") = Some(this_id);
        } else {
            let current_owner = *owner.lock().expect("single-executor guard mutex poisoned");
            assert_eq!(
                current_owner,
                Some(this_id),
                "concurrent access from different threads detected"
            );
        }
        SingleExecutorGuard { owner, counter }
    }
}

#[cfg(debug_assertions)]
impl<'a> Drop for SingleExecutorGuard<'a> {
    fn drop(&mut self) {
        let new_count = self.counter.fetch_sub(1, Ordering::AcqRel);
        if new_count == 1 {
            *self.owner.lock().expect("single-executor guard mutex poisoned") = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::time::Duration;

    #[test]
    fn enqueue_and_join_returns_result() {
        let pool = PersistentThreadPool::new(2);
        let handle = pool.enqueue(|| 2 + 2);
        assert_eq!(handle.join(), 4);
    }

    #[test]
    fn wait_for_all_tasks_blocks_until_drained() {
        let pool = PersistentThreadPool::new(4);
        let counter = Arc::new(StdAtomicUsize::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.enqueue(move || {
                thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        pool.wait_for_all_tasks();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn drop_joins_workers_cleanly() {
        let pool = PersistentThreadPool::new(3);
        pool.enqueue(|| 1).join();
        drop(pool);
    }

    #[cfg(debug_assertions)]
    #[test]
    fn guard_allows_same_thread_reentrancy() {
        let owner = Mutex::new(None);
        let counter = AtomicUsize::new(0);
        let _outer = SingleExecutorGuard::enter(&owner, &counter);
        let _inner = SingleExecutorGuard::enter(&owner, &counter);
    }
}
