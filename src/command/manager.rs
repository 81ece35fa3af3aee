// CommandManager - executes commands and manages history, redo and queue

use crate::command::pool::{AsyncHandle, TaskState, WorkerPool};
use crate::command::trait_def::{Command, CommandError, CommandResult, SharedCommand};
use crate::config::EngineConfig;
use crate::logging::{ConsoleSink, LogSink};
use std::backtrace::Backtrace;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, mpsc};
use std::time::Duration;

/// Running totals kept by the manager
///
/// `failed` counts commands whose execute, undo or redo returned an error.
/// An empty history or redo stack is not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub executed: u64,
    pub undone: u64,
    pub redone: u64,
    pub failed: u64,
}

/// The three containers plus counters. Only ever touched under `Core::state`.
struct EngineState {
    /// Executed commands, oldest at the front, most recent at the back
    history: VecDeque<SharedCommand>,
    /// Undone commands, most recent at the back
    redo_stack: Vec<SharedCommand>,
    /// Commands waiting for `drain_queue`, FIFO
    pending: VecDeque<SharedCommand>,
    history_limit: usize,
    stats: EngineStats,
    /// Set by `shutdown`; nothing is recorded or queued afterwards
    closed: bool,
}

impl EngineState {
    fn new(history_limit: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(history_limit.min(1024)),
            redo_stack: Vec::new(),
            pending: VecDeque::new(),
            history_limit,
            stats: EngineStats::default(),
            closed: false,
        }
    }

    /// Push onto history, evicting the oldest entries beyond the limit
    fn push_history(&mut self, command: SharedCommand) {
        self.history.push_back(command);
        self.trim_history();
    }

    fn trim_history(&mut self) {
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
    }

    fn sizes(&self) -> String {
        format!(
            "history={}, redo={}, pending={}",
            self.history.len(),
            self.redo_stack.len(),
            self.pending.len()
        )
    }
}

/// State shared between the caller thread and pool workers
struct Core {
    state: Mutex<EngineState>,
    debug: AtomicBool,
    sink: Arc<dyn LogSink>,
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Lock a command and run `op` on it, converting panics into errors
///
/// Returns the description along with the outcome so callers can log it
/// even on failure.
fn run_guarded<F>(command: &SharedCommand, op: F) -> (String, CommandResult<()>)
where
    F: FnOnce(&mut dyn Command) -> CommandResult<()>,
{
    let mut guard = match command.lock() {
        Ok(guard) => guard,
        Err(_) => {
            return (
                "<poisoned command>".to_string(),
                Err(CommandError::Poisoned("command".into())),
            );
        }
    };
    let description = guard.description();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| op(&mut *guard)))
        .unwrap_or_else(|payload| {
            Err(CommandError::Internal(format!(
                "command panicked: {}",
                panic_message(payload)
            )))
        });
    (description, outcome)
}

impl Core {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        // Containers are only mutated by short non-panicking sections
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    fn debug_line(&self, op: &str, detail: &str, state: &EngineState) {
        if self.is_debug() {
            self.sink
                .write_line(&format!("[debug] {}: {} ({})", op, detail, state.sizes()));
        }
        tracing::debug!(
            op,
            detail,
            history = state.history.len(),
            redo = state.redo_stack.len(),
            pending = state.pending.len(),
            "command manager state"
        );
    }

    fn report_failure(&self, op: &str, description: &str, err: &CommandError) {
        self.sink
            .write_error(&format!("{} failed ({}): {}", op, description, err));

        if !err.is_refusal() {
            tracing::warn!(op, command = description, error = %err, "internal command error");
            if self.is_debug() {
                self.sink
                    .write_error(&format!("[debug] backtrace:\n{}", Backtrace::force_capture()));
            }
        }
    }

    fn execute(&self, command: SharedCommand) -> CommandResult<String> {
        {
            let state = self.lock_state();
            if state.closed {
                self.debug_line("execute", "refused, manager is shut down", &state);
                drop(state);
                self.sink.write_error("Execute failed: command manager is shut down");
                return Err(CommandError::ShutDown);
            }
            self.debug_line("execute", "attempting", &state);
        }

        // The command lock is released before taking the state lock
        let (description, outcome) = run_guarded(&command, |c| c.execute());

        let mut state = self.lock_state();
        match outcome {
            Ok(()) if state.closed => {
                // Finished on a detached worker after shutdown cleared the containers
                state.stats.executed += 1;
                self.debug_line("execute", "succeeded after shutdown, not recorded", &state);
                drop(state);
                self.sink.write_error(&format!(
                    "Executed after shutdown, not recorded: {}",
                    description
                ));
                Ok(description)
            }
            Ok(()) => {
                state.push_history(command);
                state.redo_stack.clear();
                state.stats.executed += 1;
                self.sink.write_line(&format!("Executed: {}", description));
                self.debug_line("execute", "succeeded", &state);
                Ok(description)
            }
            Err(err) => {
                state.stats.failed += 1;
                self.debug_line("execute", "failed, containers unchanged", &state);
                drop(state);
                self.report_failure("Execute", &description, &err);
                Err(err)
            }
        }
    }

    fn undo(&self) -> CommandResult<String> {
        let mut state = self.lock_state();
        self.debug_line("undo", "attempting", &state);

        let Some(command) = state.history.back().cloned() else {
            drop(state);
            self.sink.write_error("Nothing to undo");
            return Err(CommandError::NothingToUndo);
        };

        let (description, outcome) = run_guarded(&command, |c| {
            if !c.is_reversible() {
                return Err(CommandError::NotReversible(c.description()));
            }
            c.undo()
        });

        match outcome {
            Ok(()) => {
                state.history.pop_back();
                state.redo_stack.push(command);
                state.stats.undone += 1;
                self.sink.write_line(&format!("Undone: {}", description));
                self.debug_line("undo", "succeeded", &state);
                Ok(description)
            }
            Err(err) => {
                // Refused commands stay in history
                state.stats.failed += 1;
                self.debug_line("undo", "refused, history unchanged", &state);
                drop(state);
                self.report_failure("Undo", &description, &err);
                Err(err)
            }
        }
    }

    fn redo(&self) -> CommandResult<String> {
        let mut state = self.lock_state();
        self.debug_line("redo", "attempting", &state);

        let Some(command) = state.redo_stack.pop() else {
            drop(state);
            self.sink.write_error("Nothing to redo");
            return Err(CommandError::NothingToRedo);
        };

        let (description, outcome) = run_guarded(&command, |c| c.execute());

        match outcome {
            Ok(()) => {
                state.push_history(command);
                state.stats.redone += 1;
                self.sink.write_line(&format!("Redone: {}", description));
                self.debug_line("redo", "succeeded", &state);
                Ok(description)
            }
            Err(err) => {
                // Keep it for a later retry
                state.redo_stack.push(command);
                state.stats.failed += 1;
                self.debug_line("redo", "failed, command kept on redo stack", &state);
                drop(state);
                self.report_failure("Redo", &description, &err);
                Err(err)
            }
        }
    }
}

enum PoolSlot {
    NotStarted,
    Running(WorkerPool),
    ShutDown,
}

/// Manages command execution, undo/redo, queued work and async execution
///
/// The CommandManager maintains three containers:
/// - History: commands that have been executed and can be undone
/// - Redo stack: commands that have been undone and can be redone
/// - Pending queue: commands waiting for `drain_queue`
///
/// When a new command is executed successfully:
/// 1. Push it onto history
/// 2. Clear the redo stack (linear timeline, no branches)
/// 3. Evict the oldest history entry if over the limit
///
/// Every operation writes a status line to the configured `LogSink`.
/// Refusals return `false` (or the matching `CommandError` from the `try_`
/// variants) and never modify the containers.
///
/// # Concurrency
/// Containers live behind one mutex shared by the synchronous path and the
/// worker pool used by `execute_async`, so a successful async execution
/// pushes to history and clears the redo stack atomically. The pool is
/// started on first use.
pub struct CommandManager {
    core: Arc<Core>,
    pool: Mutex<PoolSlot>,
    workers: usize,
    shutdown_grace: Duration,
}

impl CommandManager {
    /// Create a CommandManager with default settings, logging to the console
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default(), Arc::new(ConsoleSink))
    }

    /// Create a CommandManager with a custom history limit
    pub fn with_capacity(history_limit: usize) -> Self {
        let config = EngineConfig {
            history_limit: history_limit.max(1),
            ..EngineConfig::default()
        };
        Self::with_config(config, Arc::new(ConsoleSink))
    }

    /// Create a CommandManager from a configuration and log sink
    ///
    /// Zero limits in the config are raised to 1.
    pub fn with_config(config: EngineConfig, sink: Arc<dyn LogSink>) -> Self {
        let core = Core {
            state: Mutex::new(EngineState::new(config.history_limit.max(1))),
            debug: AtomicBool::new(config.debug),
            sink,
        };
        Self {
            core: Arc::new(core),
            pool: Mutex::new(PoolSlot::NotStarted),
            workers: config.workers.max(1),
            shutdown_grace: config.shutdown_grace(),
        }
    }

    /// Execute a command and record it in history
    ///
    /// Returns false if no command was supplied, the command refused, or it
    /// failed internally. History and redo stack are only touched on success.
    pub fn execute(&self, command: impl Into<Option<SharedCommand>>) -> bool {
        self.try_execute(command).is_ok()
    }

    /// Like `execute`, returning the description or the reason for failure
    pub fn try_execute(&self, command: impl Into<Option<SharedCommand>>) -> CommandResult<String> {
        match command.into() {
            Some(command) => self.core.execute(command),
            None => {
                self.core.sink.write_error("Execute failed: no command supplied");
                Err(CommandError::MissingCommand)
            }
        }
    }

    /// Undo the most recent command
    ///
    /// An irreversible command refuses and stays in history.
    pub fn undo(&self) -> bool {
        self.try_undo().is_ok()
    }

    pub fn try_undo(&self) -> CommandResult<String> {
        self.core.undo()
    }

    /// Re-execute the most recently undone command
    ///
    /// If re-execution fails the command goes back onto the redo stack.
    pub fn redo(&self) -> bool {
        self.try_redo().is_ok()
    }

    pub fn try_redo(&self) -> CommandResult<String> {
        self.core.redo()
    }

    /// Append a command to the pending queue without running it
    pub fn enqueue(&self, command: impl Into<Option<SharedCommand>>) -> bool {
        let Some(command) = command.into() else {
            self.core.sink.write_error("Enqueue failed: no command supplied");
            return false;
        };

        let description = command
            .lock()
            .map(|c| c.description())
            .unwrap_or_else(|_| "<poisoned command>".to_string());

        let mut state = self.core.lock_state();
        if state.closed {
            drop(state);
            self.core
                .sink
                .write_error("Enqueue failed: command manager is shut down");
            return false;
        }
        state.pending.push_back(command);
        self.core.sink.write_line(&format!("Queued: {}", description));
        self.core.debug_line("enqueue", "queued", &state);
        true
    }

    /// Execute every queued command in FIFO order
    ///
    /// Failures do not stop the drain and earlier successes are kept.
    /// Returns the number of commands that succeeded.
    pub fn drain_queue(&self) -> usize {
        {
            let state = self.core.lock_state();
            self.core.debug_line("drain", "starting", &state);
        }
        let mut succeeded = 0;
        let mut attempted = 0;
        loop {
            let next = self.core.lock_state().pending.pop_front();
            let Some(command) = next else { break };
            attempted += 1;
            if self.core.execute(command).is_ok() {
                succeeded += 1;
            }
        }
        self.core.sink.write_line(&format!(
            "Queue drained: {}/{} succeeded",
            succeeded, attempted
        ));
        let state = self.core.lock_state();
        self.core.debug_line(
            "drain",
            &format!("finished, {} of {} succeeded", succeeded, attempted),
            &state,
        );
        succeeded
    }

    /// Execute commands in order, stopping at the first failure
    ///
    /// Returns the number of commands that succeeded before the stop.
    pub fn run_macro<I>(&self, commands: I) -> usize
    where
        I: IntoIterator<Item = SharedCommand>,
    {
        let commands: Vec<SharedCommand> = commands.into_iter().collect();
        let total = commands.len();
        let mut succeeded = 0;
        {
            let state = self.core.lock_state();
            self.core
                .debug_line("macro", &format!("starting, {} steps", total), &state);
        }

        for command in commands {
            if self.core.execute(command).is_err() {
                let stopped = format!("stopped at step {} of {}", succeeded + 1, total);
                self.core.sink.write_error(&format!("Macro {}", stopped));
                let state = self.core.lock_state();
                self.core.debug_line("macro", &stopped, &state);
                return succeeded;
            }
            succeeded += 1;
        }

        self.core
            .sink
            .write_line(&format!("Macro completed: {} commands", succeeded));
        let state = self.core.lock_state();
        self.core
            .debug_line("macro", &format!("completed {} steps", succeeded), &state);
        succeeded
    }

    /// Execute a command on the worker pool
    ///
    /// The returned handle must be waited on to observe the outcome. A task
    /// can be cancelled through the handle until a worker picks it up.
    pub fn execute_async(&self, command: impl Into<Option<SharedCommand>>) -> AsyncHandle {
        let Some(command) = command.into() else {
            self.core.sink.write_error("Async execute failed: no command supplied");
            return AsyncHandle::resolved(Err(CommandError::MissingCommand));
        };

        let supports_async = command
            .lock()
            .map(|c| c.supports_async())
            .map_err(|_| ());
        match supports_async {
            Ok(true) => {}
            Ok(false) => {
                let description = command
                    .lock()
                    .map(|c| c.description())
                    .unwrap_or_default();
                let err = CommandError::AsyncNotSupported(description.clone());
                self.core.report_failure("Async execute", &description, &err);
                return AsyncHandle::resolved(Err(err));
            }
            Err(_) => {
                let err = CommandError::Poisoned("command".into());
                self.core
                    .report_failure("Async execute", "<poisoned command>", &err);
                return AsyncHandle::resolved(Err(err));
            }
        }

        let mut slot = self.pool.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(*slot, PoolSlot::NotStarted) {
            match WorkerPool::new(self.workers) {
                Ok(pool) => {
                    tracing::debug!(workers = pool.size(), "started command worker pool");
                    *slot = PoolSlot::Running(pool);
                }
                Err(e) => {
                    let err = CommandError::Internal(format!("Failed to start worker pool: {}", e));
                    self.core.report_failure("Async execute", "worker pool", &err);
                    return AsyncHandle::resolved(Err(err));
                }
            }
        }

        let PoolSlot::Running(pool) = &*slot else {
            self.core
                .sink
                .write_error("Async execute failed: worker pool is shut down");
            return AsyncHandle::resolved(Err(CommandError::PoolShutDown));
        };

        let task = TaskState::new();
        let (tx, rx) = mpsc::channel();
        let core = Arc::clone(&self.core);
        let job_task = task.clone();

        let submitted = pool.submit_task(task.clone(), move || {
            if !job_task.try_start() {
                let _ = tx.send(Err(CommandError::Cancelled));
                return;
            }
            let outcome = core.execute(command);
            job_task.finish();
            let _ = tx.send(outcome);
        });

        if !submitted {
            self.core
                .sink
                .write_error("Async execute failed: worker pool is shut down");
            return AsyncHandle::resolved(Err(CommandError::PoolShutDown));
        }

        let state = self.core.lock_state();
        self.core.debug_line("execute_async", "submitted to worker pool", &state);
        AsyncHandle::new(task, rx)
    }

    /// Change the history bound, evicting the oldest entries if shrinking
    ///
    /// A limit of zero is refused.
    pub fn set_history_limit(&self, limit: usize) -> bool {
        if limit == 0 {
            self.core
                .sink
                .write_error("History limit must be at least 1");
            return false;
        }
        let mut state = self.core.lock_state();
        state.history_limit = limit;
        state.trim_history();
        self.core
            .sink
            .write_line(&format!("History limit set to {}", limit));
        self.core
            .debug_line("set_history_limit", &format!("limit is now {}", limit), &state);
        true
    }

    pub fn history_limit(&self) -> usize {
        self.core.lock_state().history_limit
    }

    pub fn set_debug(&self, enabled: bool) {
        self.core.debug.store(enabled, Ordering::Relaxed);
        self.core.sink.write_line(&format!(
            "Debug mode {}",
            if enabled { "enabled" } else { "disabled" }
        ));
    }

    pub fn is_debug(&self) -> bool {
        self.core.is_debug()
    }

    /// Number of commands that can be undone
    pub fn history_size(&self) -> usize {
        self.core.lock_state().history.len()
    }

    pub fn redo_count(&self) -> usize {
        self.core.lock_state().redo_stack.len()
    }

    pub fn pending_count(&self) -> usize {
        self.core.lock_state().pending.len()
    }

    pub fn has_undo(&self) -> bool {
        !self.core.lock_state().history.is_empty()
    }

    pub fn has_redo(&self) -> bool {
        !self.core.lock_state().redo_stack.is_empty()
    }

    /// Description of the command that would be undone
    pub fn undo_description(&self) -> Option<String> {
        let state = self.core.lock_state();
        state
            .history
            .back()
            .and_then(|c| c.lock().ok().map(|c| c.description()))
    }

    /// Description of the command that would be redone
    pub fn redo_description(&self) -> Option<String> {
        let state = self.core.lock_state();
        state
            .redo_stack
            .last()
            .and_then(|c| c.lock().ok().map(|c| c.description()))
    }

    /// History descriptions, oldest first
    pub fn history_descriptions(&self) -> Vec<String> {
        let state = self.core.lock_state();
        state
            .history
            .iter()
            .map(|c| {
                c.lock()
                    .map(|c| c.description())
                    .unwrap_or_else(|_| "<poisoned command>".to_string())
            })
            .collect()
    }

    pub fn stats(&self) -> EngineStats {
        self.core.lock_state().stats
    }

    /// Clear history, redo stack and pending queue
    pub fn clear(&self) {
        let mut state = self.core.lock_state();
        state.history.clear();
        state.redo_stack.clear();
        state.pending.clear();
    }

    /// Stop the worker pool and clear all containers
    ///
    /// In-flight async work gets the configured grace period; after that,
    /// queued tasks are dropped and their handles report cancellation.
    /// A command still running past the deadline completes without being
    /// recorded, and later `execute` or `enqueue` calls are refused.
    /// Returns false if the pool had to be abandoned.
    pub fn shutdown(&self) -> bool {
        let previous = {
            let mut slot = self.pool.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *slot, PoolSlot::ShutDown)
        };

        let clean = match previous {
            PoolSlot::ShutDown => return true,
            PoolSlot::NotStarted => true,
            PoolSlot::Running(mut pool) => pool.shutdown(self.shutdown_grace),
        };

        {
            let mut state = self.core.lock_state();
            state.closed = true;
            state.history.clear();
            state.redo_stack.clear();
            state.pending.clear();
            self.core.debug_line("shutdown", "containers cleared", &state);
        }
        if clean {
            self.core.sink.write_line("Command manager shut down");
        } else {
            self.core.sink.write_error(&format!(
                "Command manager shut down: async work still running after {:?} was abandoned",
                self.shutdown_grace
            ));
        }
        clean
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(
            *self.pool.lock().unwrap_or_else(|e| e.into_inner()),
            PoolSlot::ShutDown
        )
    }
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CommandManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
