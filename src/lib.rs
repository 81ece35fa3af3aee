// Command Engine - Library exports for tests, benchmarks and the demo binary

pub mod command;
pub mod config;
pub mod logging;
pub mod receiver;

// Re-export commonly used types for convenience
pub use command::{
    ActionKind, AsyncHandle, Command, CommandError, CommandFactory, CommandManager,
    CommandResult, MoveDirection, SharedCommand, share,
};
pub use config::{ConfigError, EngineConfig};
pub use logging::{ConsoleSink, LogSink, MemorySink, TracingSink};
pub use receiver::{Hero, MemoryStore, Position, Scoreboard, shared};
