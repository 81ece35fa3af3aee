// Command Pattern execution engine
//
// This module implements the Command Pattern with undo/redo, a pending queue,
// fail-fast macros and async execution on a small worker pool.
//
// Architecture:
// - Command trait: execute(), undo(), description(), is_reversible()
// - CommandManager: owns history, redo stack and pending queue
// - CommandFactory: maps symbolic keys ("north", "norte", "heal") to commands
// - Concrete commands: MoveCommand, AttackCommand, SaveCommand, etc.
//
// Receivers (hero, scoreboard, save store) live in `crate::receiver`; the
// manager only ever talks to them through commands.

pub mod commands;
pub mod factory;
pub mod manager;
pub mod pool;
pub mod trait_def;

pub use factory::{ActionKind, CommandFactory, CommandKind, FactoryError, MoveDirection};
pub use manager::{CommandManager, EngineStats};
pub use pool::{AsyncHandle, WorkerPool};
pub use trait_def::{Command, CommandError, CommandMeta, CommandResult, SharedCommand, share};
