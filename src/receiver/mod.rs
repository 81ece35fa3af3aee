// Receivers - domain objects that commands mutate
//
// The command manager never looks inside these; only concrete commands call
// their methods. They are shared as Arc<Mutex<_>> because commands may run on
// a worker of the manager's pool.

pub mod hero;
pub mod persistence;
pub mod scoreboard;

pub use hero::{Hero, Position};
pub use persistence::{GameSnapshot, JsonFileStore, MemoryStore, PersistError, SaveId, SaveStore};
pub use scoreboard::Scoreboard;

use std::sync::{Arc, Mutex};

pub type SharedHero = Arc<Mutex<Hero>>;
pub type SharedScoreboard = Arc<Mutex<Scoreboard>>;
pub type SharedStore = Arc<dyn SaveStore>;

/// Convenience for wrapping a receiver
pub fn shared<T>(value: T) -> Arc<Mutex<T>> {
    Arc::new(Mutex::new(value))
}
