// WorkerPool - fixed-size thread pool backing CommandManager::execute_async

use crate::command::trait_def::{CommandError, CommandResult};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

/// A queued closure, optionally tied to the handle that tracks it
struct Job {
    task: Option<TaskState>,
    run: Box<dyn FnOnce() + Send + 'static>,
}

impl Job {
    /// Drop the job unrun, marking its handle cancelled first
    fn abandon(self) {
        if let Some(task) = &self.task {
            task.try_cancel();
        }
    }
}

const TASK_PENDING: u8 = 0;
const TASK_RUNNING: u8 = 1;
const TASK_DONE: u8 = 2;
const TASK_CANCELLED: u8 = 3;

/// Lifecycle flag shared between an AsyncHandle and the job running it
#[derive(Debug, Clone)]
pub(crate) struct TaskState(Arc<AtomicU8>);

impl TaskState {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicU8::new(TASK_PENDING)))
    }

    /// Called by the worker. False means the task was cancelled first.
    pub(crate) fn try_start(&self) -> bool {
        self.0
            .compare_exchange(TASK_PENDING, TASK_RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn finish(&self) {
        self.0.store(TASK_DONE, Ordering::Release);
    }

    fn try_cancel(&self) -> bool {
        self.0
            .compare_exchange(TASK_PENDING, TASK_CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn get(&self) -> u8 {
        self.0.load(Ordering::Acquire)
    }
}

/// Handle to a command submitted with `execute_async`
///
/// The result is only available by explicitly waiting or polling. Dropping
/// the handle does not cancel the task.
pub struct AsyncHandle {
    state: TaskState,
    result: Receiver<CommandResult<String>>,
    outcome: Option<CommandResult<String>>,
}

impl AsyncHandle {
    pub(crate) fn new(state: TaskState, result: Receiver<CommandResult<String>>) -> Self {
        Self {
            state,
            result,
            outcome: None,
        }
    }

    /// A handle that is already resolved, used when submission itself fails
    pub(crate) fn resolved(outcome: CommandResult<String>) -> Self {
        let (tx, rx) = mpsc::channel();
        let state = TaskState::new();
        state.finish();
        let _ = tx.send(outcome);
        Self::new(state, rx)
    }

    /// Block until the command has run and return whether it succeeded
    pub fn wait(self) -> bool {
        self.join().is_ok()
    }

    /// Block until the command has run and return the detailed outcome
    ///
    /// On success this is the command description.
    pub fn join(mut self) -> CommandResult<String> {
        if let Some(outcome) = self.outcome.take() {
            return outcome;
        }
        self.result.recv().unwrap_or(Err(CommandError::Cancelled))
    }

    /// Wait up to `timeout`. None means the task has not finished yet.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<bool> {
        if self.outcome.is_none() {
            match self.result.recv_timeout(timeout) {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.outcome = Some(Err(CommandError::Cancelled))
                }
            }
        }
        self.outcome.as_ref().map(|o| o.is_ok())
    }

    /// Poll without blocking
    pub fn try_result(&mut self) -> Option<bool> {
        if self.outcome.is_none() {
            match self.result.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => {
                    self.outcome = Some(Err(CommandError::Cancelled))
                }
            }
        }
        self.outcome.as_ref().map(|o| o.is_ok())
    }

    /// Cancel the task if no worker has picked it up yet
    ///
    /// Returns false once the task is running or finished; a running command
    /// always completes.
    pub fn cancel(&self) -> bool {
        self.state.try_cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.get() == TASK_CANCELLED
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state.get(), TASK_DONE | TASK_CANCELLED)
    }
}

/// Decrements the live-worker count when a worker thread exits
struct LiveGuard(Arc<(Mutex<usize>, Condvar)>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let (count, cvar) = &*self.0;
        let mut live = count.lock().unwrap_or_else(|e| e.into_inner());
        *live = live.saturating_sub(1);
        cvar.notify_all();
    }
}

struct Worker {
    #[allow(dead_code)]
    id: usize,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn spawn(
        id: usize,
        receiver: Arc<Mutex<Receiver<Job>>>,
        live: Arc<(Mutex<usize>, Condvar)>,
        abandoned: Arc<AtomicBool>,
    ) -> std::io::Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("command-worker-{}", id))
            .spawn(move || {
                let _guard = LiveGuard(live);
                loop {
                    let job = match receiver.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };

                    match job {
                        Ok(job) => {
                            if abandoned.load(Ordering::Acquire) {
                                tracing::debug!(worker = id, "skipping job after shutdown deadline");
                                job.abandon();
                                continue;
                            }
                            (job.run)();
                        }
                        Err(_) => {
                            tracing::debug!(worker = id, "worker shutting down");
                            break;
                        }
                    }
                }
            })?;

        Ok(Self { id, thread })
    }
}

/// Fixed-size pool of worker threads fed through a shared channel
pub struct WorkerPool {
    workers: Vec<Worker>,
    sender: Option<Sender<Job>>,
    receiver: Arc<Mutex<Receiver<Job>>>,
    live: Arc<(Mutex<usize>, Condvar)>,
    abandoned: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Spawn `size` workers
    ///
    /// # Errors
    /// Returns the OS error if a thread cannot be spawned. Workers spawned
    /// before the failure are shut down.
    pub fn new(size: usize) -> std::io::Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let live = Arc::new((Mutex::new(0usize), Condvar::new()));
        let abandoned = Arc::new(AtomicBool::new(false));

        let mut pool = Self {
            workers: Vec::with_capacity(size),
            sender: Some(sender),
            receiver: receiver.clone(),
            live: live.clone(),
            abandoned: abandoned.clone(),
        };

        for id in 0..size {
            {
                let mut count = live.0.lock().unwrap_or_else(|e| e.into_inner());
                *count += 1;
            }
            match Worker::spawn(id, receiver.clone(), live.clone(), abandoned.clone()) {
                Ok(worker) => pool.workers.push(worker),
                Err(e) => {
                    let mut count = live.0.lock().unwrap_or_else(|e| e.into_inner());
                    *count -= 1;
                    drop(count);
                    pool.shutdown(Duration::from_millis(100));
                    return Err(e);
                }
            }
        }

        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job. Returns false if the pool no longer accepts work.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Job {
            task: None,
            run: Box::new(job),
        })
    }

    /// Queue a job whose handle is marked cancelled if shutdown drops it
    pub(crate) fn submit_task<F>(&self, task: TaskState, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.send(Job {
            task: Some(task),
            run: Box::new(job),
        })
    }

    fn send(&self, job: Job) -> bool {
        match &self.sender {
            Some(sender) => sender.send(job).is_ok(),
            None => false,
        }
    }

    /// Stop accepting work and wait up to `grace` for queued and in-flight
    /// jobs to finish
    ///
    /// After the deadline, jobs still queued are dropped unrun and workers
    /// still busy are detached; a job already running completes on its own.
    /// Returns true if every worker exited within the grace period.
    pub fn shutdown(&mut self, grace: Duration) -> bool {
        // Closing the channel lets workers drain the queue and then exit
        self.sender = None;

        let (count, cvar) = &*self.live;
        let live = count.lock().unwrap_or_else(|e| e.into_inner());
        let (live, timeout) = cvar
            .wait_timeout_while(live, grace, |live| *live > 0)
            .unwrap_or_else(|e| e.into_inner());
        let remaining = *live;
        drop(live);

        if timeout.timed_out() && remaining > 0 {
            self.abandoned.store(true, Ordering::Release);
            // Busy workers do not hold the receiver lock
            let dropped = match self.receiver.lock() {
                Ok(rx) => rx.try_iter().map(Job::abandon).count(),
                Err(_) => 0,
            };
            tracing::warn!(
                remaining,
                dropped,
                grace_ms = grace.as_millis() as u64,
                "worker pool did not stop in time, abandoning remaining jobs"
            );
            self.workers.clear();
            return false;
        }

        for worker in self.workers.drain(..) {
            let _ = worker.thread.join();
        }
        true
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.sender.is_some() {
            self.shutdown(Duration::from_secs(1));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    #[test]
    fn test_pool_runs_jobs() {
        let mut pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.size(), 3);

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = counter.clone();
            assert!(pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        assert!(pool.shutdown(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_submit_after_shutdown_is_rejected() {
        let mut pool = WorkerPool::new(1).unwrap();
        assert!(pool.shutdown(Duration::from_secs(1)));
        assert!(!pool.submit(|| {}));
        assert!(!pool.submit_task(TaskState::new(), || {}));
    }

    #[test]
    fn test_shutdown_deadline_abandons_queued_jobs() {
        let mut pool = WorkerPool::new(1).unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        let (started_tx, started_rx) = mpsc::channel();
        let slow = ran.clone();
        pool.submit(move || {
            let _ = started_tx.send(());
            thread::sleep(Duration::from_millis(300));
            slow.fetch_add(1, Ordering::SeqCst);
        });
        let queued = ran.clone();
        pool.submit(move || {
            queued.fetch_add(100, Ordering::SeqCst);
        });
        started_rx.recv().unwrap();

        let start = Instant::now();
        assert!(!pool.shutdown(Duration::from_millis(50)));
        assert!(start.elapsed() < Duration::from_millis(250));

        // The running job completes, the queued one is dropped
        thread::sleep(Duration::from_millis(500));
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_abandoned_task_handle_reports_cancelled() {
        let mut pool = WorkerPool::new(1).unwrap();

        let (started_tx, started_rx) = mpsc::channel();
        pool.submit(move || {
            let _ = started_tx.send(());
            thread::sleep(Duration::from_millis(300));
        });

        let task = TaskState::new();
        let (tx, rx) = mpsc::channel::<CommandResult<String>>();
        pool.submit_task(task.clone(), move || {
            let _ = tx.send(Ok("ran".to_string()));
        });
        let mut handle = AsyncHandle::new(task, rx);
        started_rx.recv().unwrap();

        assert!(!pool.shutdown(Duration::from_millis(50)));

        assert!(handle.is_cancelled());
        assert!(handle.is_finished());
        assert!(!handle.cancel());
        assert_eq!(handle.try_result(), Some(false));
        assert_eq!(handle.join(), Err(CommandError::Cancelled));
    }

    #[test]
    fn test_resolved_handle() {
        let mut handle = AsyncHandle::resolved(Err(CommandError::PoolShutDown));
        assert!(handle.is_finished());
        assert_eq!(handle.try_result(), Some(false));
        assert!(!handle.cancel());
        assert_eq!(handle.join(), Err(CommandError::PoolShutDown));
    }

    #[test]
    fn test_cancel_before_start() {
        let state = TaskState::new();
        let (_tx, rx) = mpsc::channel();
        let handle = AsyncHandle::new(state.clone(), rx);

        assert!(handle.cancel());
        assert!(handle.is_cancelled());
        assert!(!state.try_start());
    }

    #[test]
    fn test_cannot_cancel_running_task() {
        let state = TaskState::new();
        let (_tx, rx) = mpsc::channel();
        let handle = AsyncHandle::new(state.clone(), rx);

        assert!(state.try_start());
        assert!(!handle.cancel());
        assert!(!handle.is_finished());
    }
}
