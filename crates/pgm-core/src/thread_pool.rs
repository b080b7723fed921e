//! A fixed-size worker pool and fork-join wait group: an mpsc-channel worker
//! loop feeding a `Condvar`-based `WaitGroup`, so the orchestrator can fan
//! out one sampling job per worker per epoch and block until the whole
//! epoch's jobs land — the fork-join barrier each learning/inference round
//! needs between its sampling fan-out and its merge step.

use std::{
    fmt::Debug,
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use std::{sync::mpsc, thread};

pub struct WorkResult<T> {
    receiver: mpsc::Receiver<T>,
}

impl<T> WorkResult<T> {
    /// Blocks until the job's result is available.
    pub fn result(&self) -> T {
        self.receiver.recv().unwrap()
    }
}

pub struct ThreadPool {
    sender: mpsc::Sender<Message>,
    workers: Vec<Worker>,
}

impl ThreadPool {
    pub fn new(size: usize) -> Self {
        Self::with_init(size, || {})
    }

    /// Like [`ThreadPool::new`], but `init` runs on each worker's OS thread
    /// before it enters its job loop — the hook a replica uses to bind that
    /// thread to its NUMA domain before it ever touches the replica's graph.
    pub fn with_init<I>(size: usize, init: I) -> Self
    where
        I: Fn() + Send + Sync + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let init = Arc::new(init);

        ThreadPool {
            sender,
            workers: (0..size)
                .map(|id| Worker::new(id, Arc::clone(&receiver), Arc::clone(&init)))
                .collect(),
        }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn is_alive(&self) -> bool {
        self.workers.iter().any(|worker| worker.is_alive())
    }

    /// Fire-and-forget job submission.
    pub fn submit<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let job = Box::new(f);
        self.sender.send(Message::Work(job)).unwrap();
    }

    pub fn submit_with_result<F, T>(&self, f: F) -> WorkResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        let job = Box::new(move || tx.send(f()).unwrap());

        self.sender.send(Message::Work(job)).unwrap();

        WorkResult { receiver: rx }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        for _ in self.workers.iter() {
            self.sender.send(Message::Terminate).unwrap();
        }

        for worker in self.workers.iter_mut() {
            if let Some(thread) = worker.thread.take() {
                thread.join().unwrap();
            }
        }

        assert!(!self.is_alive());
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Work(Job),
    Terminate,
}

struct Worker {
    id: usize,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new<I>(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Message>>>, init: Arc<I>) -> Self
    where
        I: Fn() + Send + Sync + 'static,
    {
        Worker {
            id,
            thread: Some(thread::spawn(move || {
                init();
                loop {
                    let message = receiver.lock().unwrap().recv().unwrap();
                    match message {
                        Message::Work(job) => job(),
                        Message::Terminate => break,
                    }
                }
            })),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.thread.is_some()
    }
}

impl Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("is_alive", &self.is_alive())
            .finish()
    }
}

/// A fork-join barrier: one `guard()` per dispatched job, `wait()` blocks
/// until every outstanding guard has dropped. Used once per epoch to join
/// all of a replica's workers before inter-replica reduction.
#[derive(Clone)]
pub struct WaitGroup {
    inner: Arc<Inner>,
    total_count: Arc<AtomicUsize>,
}

struct Inner {
    counter: AtomicUsize,
    lock: Mutex<()>,
    cvar: Condvar,
}

pub struct WaitGuard {
    wg: WaitGroup,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.wg.inner.counter.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _guard = self.wg.inner.lock.lock().unwrap();
            self.wg.inner.cvar.notify_all();
        }
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGroup {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                counter: AtomicUsize::new(0),
                lock: Mutex::new(()),
                cvar: Condvar::new(),
            }),
            total_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn get_count(&self) -> usize {
        self.total_count.load(Ordering::Acquire)
    }

    pub fn guard(&self) -> WaitGuard {
        self.inner.counter.fetch_add(1, Ordering::AcqRel);
        self.total_count.fetch_add(1, Ordering::AcqRel);
        WaitGuard { wg: self.clone() }
    }

    pub fn wait(&self) -> usize {
        if self.inner.counter.load(Ordering::Acquire) == 0 {
            return 0;
        }

        let lock = self.inner.lock.lock().unwrap();
        let _unused = self
            .inner
            .cvar
            .wait_while(lock, |_| self.inner.counter.load(Ordering::Acquire) != 0);

        self.get_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn thread_pool_creation() {
        let pool = ThreadPool::new(4);
        assert!(pool.is_alive());
    }

    #[test]
    fn basic_job_execution() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(Mutex::new(0));

        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                let mut num = counter.lock().unwrap();
                *num += 1;
            });
        }

        thread::sleep(Duration::from_millis(200));
        assert_eq!(*counter.lock().unwrap(), 8);
    }

    #[test]
    fn job_order_is_a_permutation() {
        let pool = ThreadPool::new(2);
        let results = Arc::new(Mutex::new(vec![]));

        for i in 0..5 {
            let results = Arc::clone(&results);
            pool.submit(move || {
                results.lock().unwrap().push(i);
            });
        }

        thread::sleep(Duration::from_millis(200));
        let mut results = results.lock().unwrap();
        results.sort();
        assert_eq!(*results, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn submit_with_result_returns_value() {
        let pool = ThreadPool::new(4);
        let work_result = pool.submit_with_result(|| 10 + 32);
        assert_eq!(work_result.result(), 42);
    }

    #[test]
    fn wait_group_blocks_until_all_guards_drop() {
        let pool = ThreadPool::new(4);
        let wg = WaitGroup::new();
        let num_tasks = 10;
        let total = Arc::new(Mutex::new(0));

        for _ in 0..num_tasks {
            let guard = wg.guard();
            let total = Arc::clone(&total);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(20));
                *total.lock().unwrap() += 1;
                drop(guard);
            });
        }

        let waited_for = wg.wait();
        assert_eq!(*total.lock().unwrap(), num_tasks);
        assert_eq!(waited_for, num_tasks);
    }

    #[test]
    fn wait_group_zero_tasks_returns_immediately() {
        let wg = WaitGroup::new();
        assert_eq!(wg.wait(), 0);
    }
}
