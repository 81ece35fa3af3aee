// Command trait definition

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Result type for command operations
pub type CommandResult<T> = Result<T, CommandError>;

/// A command shared between the caller, the manager's containers and pool workers
pub type SharedCommand = Arc<Mutex<dyn Command>>;

/// Errors that can occur while executing, undoing or redoing commands
///
/// Most variants are domain refusals: expected conditions that are reported
/// with a reason and leave all state untouched. `Internal` and `Poisoned`
/// describe unexpected failures inside command code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("Command already executed")]
    AlreadyExecuted,

    #[error("Command has not been executed")]
    NotExecuted,

    #[error("Command cannot be undone: {0}")]
    NotReversible(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("No command supplied")]
    MissingCommand,

    #[error("Worker pool is shut down")]
    PoolShutDown,

    #[error("Command manager is shut down")]
    ShutDown,

    #[error("Task was cancelled before it started")]
    Cancelled,

    #[error("Command does not support async execution: {0}")]
    AsyncNotSupported(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Lock poisoned: {0}")]
    Poisoned(String),
}

impl CommandError {
    /// True for expected domain conditions, false for internal failures
    pub fn is_refusal(&self) -> bool {
        !matches!(self, CommandError::Internal(_) | CommandError::Poisoned(_))
    }
}

/// Bookkeeping shared by every concrete command
#[derive(Debug, Clone)]
pub struct CommandMeta {
    id: Uuid,
    created_at: DateTime<Utc>,
    executed: bool,
}

impl CommandMeta {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            executed: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Fails with `AlreadyExecuted` if the command is currently applied
    pub fn ensure_not_executed(&self) -> CommandResult<()> {
        if self.executed {
            Err(CommandError::AlreadyExecuted)
        } else {
            Ok(())
        }
    }

    /// Fails with `NotExecuted` if there is nothing to reverse
    pub fn ensure_executed(&self) -> CommandResult<()> {
        if self.executed {
            Ok(())
        } else {
            Err(CommandError::NotExecuted)
        }
    }

    pub fn mark_executed(&mut self) {
        self.executed = true;
    }

    pub fn mark_undone(&mut self) {
        self.executed = false;
    }
}

impl Default for CommandMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// A unit of work against one or more receivers
///
/// Commands capture whatever receiver state they overwrite so `undo` can put
/// it back exactly. Expected conditions (already executed, precondition not
/// met) are returned as refusals and must not mutate any receiver.
///
/// # Thread Safety
/// Commands must be Send as they may run on a worker of the manager's pool.
///
/// # Example
/// ```no_run
/// use command_engine::command::trait_def::{Command, CommandMeta, CommandResult};
///
/// struct Increment {
///     meta: CommandMeta,
///     counter: i32,
/// }
///
/// impl Command for Increment {
///     fn execute(&mut self) -> CommandResult<()> {
///         self.meta.ensure_not_executed()?;
///         self.counter += 1;
///         self.meta.mark_executed();
///         Ok(())
///     }
///
///     fn undo(&mut self) -> CommandResult<()> {
///         self.meta.ensure_executed()?;
///         self.counter -= 1;
///         self.meta.mark_undone();
///         Ok(())
///     }
///
///     fn description(&self) -> String {
///         "Increment".to_string()
///     }
///
///     fn meta(&self) -> &CommandMeta {
///         &self.meta
///     }
/// }
/// ```
pub trait Command: Send {
    /// Apply the command to its receivers
    ///
    /// Executing twice without an intervening undo returns `AlreadyExecuted`
    /// and leaves the receivers untouched.
    fn execute(&mut self) -> CommandResult<()>;

    /// Restore the receiver state captured by the last execute
    fn undo(&mut self) -> CommandResult<()>;

    /// Human-readable label for logs and history display
    fn description(&self) -> String;

    fn meta(&self) -> &CommandMeta;

    /// Whether `undo` can restore state. Irreversible commands refuse undo.
    fn is_reversible(&self) -> bool {
        true
    }

    /// Whether the command may be submitted to the worker pool
    fn supports_async(&self) -> bool {
        true
    }

    fn is_executed(&self) -> bool {
        self.meta().is_executed()
    }

    /// Creation time, used for audit ordering
    fn timestamp(&self) -> DateTime<Utc> {
        self.meta().created_at()
    }
}

/// Wrap a concrete command so it can be shared with the manager
pub fn share<C: Command + 'static>(command: C) -> SharedCommand {
    Arc::new(Mutex::new(command))
}
