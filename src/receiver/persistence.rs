// Save stores - receiver side of the irreversible save command
//
// The engine treats persistence as a black box: once a snapshot has been
// handed to a store it cannot be taken back.

use crate::receiver::hero::Hero;
use crate::receiver::scoreboard::Scoreboard;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

/// Identifier of a persisted snapshot
pub type SaveId = Uuid;

/// Persistence error types
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Everything a save captures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub hero: Hero,
    pub scoreboard: Scoreboard,
    pub saved_at: DateTime<Utc>,
}

impl GameSnapshot {
    pub fn capture(hero: &Hero, scoreboard: &Scoreboard) -> Self {
        Self {
            hero: hero.clone(),
            scoreboard: *scoreboard,
            saved_at: Utc::now(),
        }
    }
}

/// Destination for game snapshots
pub trait SaveStore: Send + Sync {
    fn persist(&self, snapshot: &GameSnapshot) -> Result<SaveId, PersistError>;
}

/// Keeps serialized snapshots in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    saves: Mutex<Vec<(SaveId, String)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.saves.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deserialize the most recent save
    pub fn latest(&self) -> Result<Option<GameSnapshot>, PersistError> {
        let saves = self.saves.lock().map_err(|_| PersistError::Poisoned)?;
        match saves.last() {
            Some((_, json)) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }
}

impl SaveStore for MemoryStore {
    fn persist(&self, snapshot: &GameSnapshot) -> Result<SaveId, PersistError> {
        let json = serde_json::to_string(snapshot)?;
        let id = Uuid::new_v4();
        self.saves
            .lock()
            .map_err(|_| PersistError::Poisoned)?
            .push((id, json));
        Ok(id)
    }
}

/// Writes each snapshot to `save-<id>.json` inside a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, id: SaveId) -> PathBuf {
        self.dir.join(format!("save-{}.json", id))
    }

    pub fn load(&self, id: SaveId) -> Result<GameSnapshot, PersistError> {
        let json = std::fs::read_to_string(self.path_for(id))?;
        Ok(serde_json::from_str(&json)?)
    }
}

impl SaveStore for JsonFileStore {
    fn persist(&self, snapshot: &GameSnapshot) -> Result<SaveId, PersistError> {
        std::fs::create_dir_all(&self.dir)?;
        let id = Uuid::new_v4();
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(self.path_for(id), json)?;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_keeps_latest() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert!(store.latest().unwrap().is_none());

        let mut hero = Hero::new("First");
        store
            .persist(&GameSnapshot::capture(&hero, &Scoreboard::default()))
            .unwrap();
        hero.move_by(3, 4);
        store
            .persist(&GameSnapshot::capture(&hero, &Scoreboard::default()))
            .unwrap();

        assert_eq!(store.len(), 2);
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.hero, hero);
    }

    #[test]
    fn test_json_file_store_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("saves"));

        let hero = Hero::new("Ayla");
        let mut board = Scoreboard::default();
        board.record_spell(25);
        let snapshot = GameSnapshot::capture(&hero, &board);

        let id = store.persist(&snapshot).unwrap();
        assert!(store.path_for(id).exists());
        assert_eq!(store.load(id).unwrap(), snapshot);
    }
}
