use crate::traits::TaskProcessor;
use parking_lot::Mutex;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, Instrument};

/// Largest batch of workers added on a single submission.
const SCALE_UP_STEP: usize = 5;
/// Idle time after which a surplus worker leaves.
const IDLE_EXIT: Duration = Duration::from_millis(200);

type Job<T> = Arc<dyn Fn(T) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct PoolState {
    active: usize,
    peak: usize,
    spawned: usize,
    stopped: bool,
    workers: JoinSet<()>,
}

struct Shared<T> {
    min_workers: usize,
    max_workers: usize,
    depth: AtomicUsize,
    state: Mutex<PoolState>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<T>>,
    job: Job<T>,
}

/// Worker pool that grows with the backlog and shrinks cooperatively.
///
/// - starts with `min_workers` (capped by the ceiling)
/// - ceiling is `min(2 * min_workers, task_count)`
/// - a submission that finds more queued tasks than active workers adds up
///   to five workers
/// - a worker that finds the queue empty while the pool is above its
///   minimum exits; nobody is stopped mid-task
pub struct AdaptiveWorkerPool<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    sender: Mutex<Option<mpsc::UnboundedSender<T>>>,
}

impl<T: Send + 'static> AdaptiveWorkerPool<T> {
    pub fn new<F, Fut>(min_workers: usize, task_count: usize, job: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let min_workers = min_workers.max(1);
        let max_workers = (min_workers * 2).min(task_count);
        let initial = min_workers.min(max_workers);

        let (tx, rx) = mpsc::unbounded_channel();
        let job: Job<T> = Arc::new(move |task| Box::pin(job(task)));

        let pool = Self {
            shared: Arc::new(Shared {
                min_workers: initial,
                max_workers,
                depth: AtomicUsize::new(0),
                state: Mutex::new(PoolState {
                    active: 0,
                    peak: 0,
                    spawned: 0,
                    stopped: false,
                    workers: JoinSet::new(),
                }),
                receiver: tokio::sync::Mutex::new(rx),
                job,
            }),
            sender: Mutex::new(Some(tx)),
        };

        {
            let mut state = pool.shared.state.lock();
            Self::start_workers(&pool.shared, &mut state, initial);
        }
        debug!(initial, max_workers, "Worker pool started");
        pool
    }

    /// Queues a task. Ignored once `wait` has been called.
    pub fn submit(&self, task: T) {
        let sender = self.sender.lock();
        let Some(tx) = sender.as_ref() else {
            return;
        };

        {
            let mut state = self.shared.state.lock();
            if state.stopped {
                return;
            }
            let depth = self.shared.depth.load(Ordering::SeqCst);
            if depth > state.active && state.active < self.shared.max_workers {
                let add = (self.shared.max_workers - state.active).min(SCALE_UP_STEP);
                Self::start_workers(&self.shared, &mut state, add);
                debug!(added = add, active = state.active, "Scaled worker pool up");
            }
        }

        self.shared.depth.fetch_add(1, Ordering::SeqCst);
        if tx.send(task).is_err() {
            self.shared.depth.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Closes the queue and waits for every worker to exit.
    pub async fn wait(&self) {
        drop(self.sender.lock().take());
        let mut workers = {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            std::mem::take(&mut state.workers)
        };

        while let Some(res) = workers.join_next().await {
            if let Err(e) = res {
                error!("A worker task panicked or failed to join: {:?}", e);
            }
        }
    }

    pub fn active_workers(&self) -> usize {
        self.shared.state.lock().active
    }

    /// Highest number of workers alive at the same time.
    pub fn peak_workers(&self) -> usize {
        self.shared.state.lock().peak
    }

    pub fn spawned_workers(&self) -> usize {
        self.shared.state.lock().spawned
    }

    pub fn max_workers(&self) -> usize {
        self.shared.max_workers
    }

    pub fn queued(&self) -> usize {
        self.shared.depth.load(Ordering::SeqCst)
    }

    fn start_workers(shared: &Arc<Shared<T>>, state: &mut PoolState, count: usize) {
        for _ in 0..count {
            state.spawned += 1;
            state.active += 1;
            state.peak = state.peak.max(state.active);

            let id = state.spawned;
            let span = tracing::info_span!("worker", worker_id = format!("{:03}", id));
            let shared = Arc::clone(shared);
            state.workers.spawn(Self::worker(shared).instrument(span));
        }
    }

    async fn worker(shared: Arc<Shared<T>>) {
        loop {
            let next = {
                let mut rx = shared.receiver.lock().await;
                tokio::time::timeout(IDLE_EXIT, rx.recv()).await
            };

            match next {
                Ok(Some(task)) => {
                    shared.depth.fetch_sub(1, Ordering::SeqCst);
                    (shared.job)(task).await;
                }
                // queue closed and drained
                Ok(None) => break,
                // idle; fall through to the scale-down check
                Err(_) => {}
            }

            let mut state = shared.state.lock();
            if shared.depth.load(Ordering::SeqCst) == 0 && state.active > shared.min_workers {
                state.active -= 1;
                debug!(active = state.active, "Worker leaving, queue empty");
                return;
            }
        }

        shared.state.lock().active -= 1;
    }
}

/// Feeds tasks through an [`AdaptiveWorkerPool`] and streams non-empty
/// results back on a bounded channel.
pub struct TaskScheduler<T, P>
where
    T: Send + 'static,
    P: TaskProcessor<T>,
{
    processor: Arc<P>,
    min_workers: usize,
    result_capacity: usize,
    pool: Option<AdaptiveWorkerPool<T>>,
    failed: Arc<AtomicUsize>,
}

impl<T, P> TaskScheduler<T, P>
where
    T: Display + Send + 'static,
    P: TaskProcessor<T>,
{
    pub fn new(min_workers: usize, processor: Arc<P>) -> Self {
        Self {
            processor,
            min_workers,
            result_capacity: 10,
            pool: None,
            failed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Submits every task and returns the result channel. The channel
    /// closes once [`wait`](Self::wait) has returned.
    pub fn schedule(&mut self, tasks: Vec<T>) -> mpsc::Receiver<Vec<String>> {
        let (tx, rx) = mpsc::channel(self.result_capacity);
        let processor = Arc::clone(&self.processor);
        let failed = Arc::clone(&self.failed);

        let pool = AdaptiveWorkerPool::new(self.min_workers, tasks.len(), move |task: T| {
            let processor = Arc::clone(&processor);
            let tx = tx.clone();
            let failed = Arc::clone(&failed);
            async move {
                let label = task.to_string();
                match processor.process(task).await {
                    Ok(lines) if !lines.is_empty() => {
                        if tx.send(lines).await.is_err() {
                            error!("[{}] result receiver dropped", label);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        failed.fetch_add(1, Ordering::SeqCst);
                        error!("[{}] task processing failed: {:#}", label, e);
                    }
                }
            }
        });

        for task in tasks {
            info!("[{}] submitting task", task);
            pool.submit(task);
        }

        self.pool = Some(pool);
        rx
    }

    /// Closes the queue, waits for all workers, then drops the pool so the
    /// result channel closes.
    pub async fn wait(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.wait().await;
        }
    }

    pub fn pool(&self) -> Option<&AdaptiveWorkerPool<T>> {
        self.pool.as_ref()
    }

    /// Tasks whose processor returned an error.
    pub fn failed_tasks(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}
