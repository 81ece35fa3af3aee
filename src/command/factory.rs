// CommandFactory - maps symbolic requests to commands bound to receivers
//
// Matching is case-insensitive and ignores surrounding whitespace. The full
// set of accepted keys:
//
//   north         north, n, up, norte, arriba
//   south         south, s, down, sur, abajo
//   east          east, e, right, este, derecha
//   west          west, w, left, oeste, izquierda
//   attack        attack, a, hit, atacar, ataque
//   magic         magic, m, spell, cast, magia, hechizo
//   heal          heal, h, curar, cura
//   restore-mana  restore-mana, restore_mana, mana, r, restaurar
//   save          save, guardar, persist

use crate::command::commands::{
    AttackCommand, HealCommand, MagicCommand, MoveCommand, RestoreManaCommand, SaveCommand,
};
use crate::command::trait_def::{SharedCommand, share};
use crate::receiver::{SharedHero, SharedScoreboard, SharedStore};
use std::fmt;
use std::str::FromStr;

/// Factory error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    #[error("Unrecognized command kind: '{0}'")]
    UnrecognizedKind(String),
}

const NORTH_KEYS: &[&str] = &["north", "n", "up", "norte", "arriba"];
const SOUTH_KEYS: &[&str] = &["south", "s", "down", "sur", "abajo"];
const EAST_KEYS: &[&str] = &["east", "e", "right", "este", "derecha"];
const WEST_KEYS: &[&str] = &["west", "w", "left", "oeste", "izquierda"];

const ATTACK_KEYS: &[&str] = &["attack", "a", "hit", "atacar", "ataque"];
const MAGIC_KEYS: &[&str] = &["magic", "m", "spell", "cast", "magia", "hechizo"];
const HEAL_KEYS: &[&str] = &["heal", "h", "curar", "cura"];
const RESTORE_MANA_KEYS: &[&str] = &["restore-mana", "restore_mana", "mana", "r", "restaurar"];
const SAVE_KEYS: &[&str] = &["save", "guardar", "persist"];

fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

fn lookup<T: Copy>(table: &[(&[&str], T)], input: &str) -> Option<T> {
    let key = normalize(input);
    table
        .iter()
        .find(|(keys, _)| keys.contains(&key.as_str()))
        .map(|(_, value)| *value)
}

/// Direction of a single movement step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoveDirection {
    North,
    South,
    East,
    West,
}

impl MoveDirection {
    pub const ALL: [MoveDirection; 4] = [
        MoveDirection::North,
        MoveDirection::South,
        MoveDirection::East,
        MoveDirection::West,
    ];

    /// Grid offset for one step (north is +y)
    pub fn delta(self) -> (i32, i32) {
        match self {
            MoveDirection::North => (0, 1),
            MoveDirection::South => (0, -1),
            MoveDirection::East => (1, 0),
            MoveDirection::West => (-1, 0),
        }
    }

    /// Every key that parses to this direction
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            MoveDirection::North => NORTH_KEYS,
            MoveDirection::South => SOUTH_KEYS,
            MoveDirection::East => EAST_KEYS,
            MoveDirection::West => WEST_KEYS,
        }
    }
}

impl fmt::Display for MoveDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveDirection::North => "North",
            MoveDirection::South => "South",
            MoveDirection::East => "East",
            MoveDirection::West => "West",
        };
        f.write_str(name)
    }
}

impl FromStr for MoveDirection {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let table = MoveDirection::ALL.map(|d| (d.keys(), d));
        lookup(&table, s).ok_or_else(|| FactoryError::UnrecognizedKind(s.to_string()))
    }
}

/// Non-movement actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Attack,
    Magic,
    Heal,
    RestoreMana,
    Save,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::Attack,
        ActionKind::Magic,
        ActionKind::Heal,
        ActionKind::RestoreMana,
        ActionKind::Save,
    ];

    pub fn keys(self) -> &'static [&'static str] {
        match self {
            ActionKind::Attack => ATTACK_KEYS,
            ActionKind::Magic => MAGIC_KEYS,
            ActionKind::Heal => HEAL_KEYS,
            ActionKind::RestoreMana => RESTORE_MANA_KEYS,
            ActionKind::Save => SAVE_KEYS,
        }
    }
}

impl FromStr for ActionKind {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let table = ActionKind::ALL.map(|a| (a.keys(), a));
        lookup(&table, s).ok_or_else(|| FactoryError::UnrecognizedKind(s.to_string()))
    }
}

/// Any request the factory understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Move(MoveDirection),
    Action(ActionKind),
}

impl FromStr for CommandKind {
    type Err = FactoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Movement keys take priority; the two tables share no keys.
        if let Ok(direction) = s.parse::<MoveDirection>() {
            return Ok(CommandKind::Move(direction));
        }
        s.parse::<ActionKind>()
            .map(CommandKind::Action)
            .map_err(|_| FactoryError::UnrecognizedKind(s.to_string()))
    }
}

/// Builds commands bound to a fixed set of receivers
///
/// Creating a command has no side effects beyond allocation; nothing runs
/// until the command is handed to a `CommandManager`.
#[derive(Clone)]
pub struct CommandFactory {
    hero: SharedHero,
    scoreboard: SharedScoreboard,
    store: SharedStore,
}

impl CommandFactory {
    pub fn new(hero: SharedHero, scoreboard: SharedScoreboard, store: SharedStore) -> Self {
        Self {
            hero,
            scoreboard,
            store,
        }
    }

    /// Parse a symbolic key and build the matching command
    ///
    /// # Errors
    /// Returns `FactoryError::UnrecognizedKind` for keys outside the tables above.
    pub fn create(&self, kind: &str) -> Result<SharedCommand, FactoryError> {
        let kind = kind.parse::<CommandKind>()?;
        Ok(self.build(kind))
    }

    pub fn build(&self, kind: CommandKind) -> SharedCommand {
        match kind {
            CommandKind::Move(direction) => self.create_move(direction),
            CommandKind::Action(action) => self.create_action(action),
        }
    }

    pub fn create_move(&self, direction: MoveDirection) -> SharedCommand {
        share(MoveCommand::new(
            self.hero.clone(),
            self.scoreboard.clone(),
            direction,
        ))
    }

    pub fn create_action(&self, action: ActionKind) -> SharedCommand {
        match action {
            ActionKind::Attack => share(AttackCommand::new(
                self.hero.clone(),
                self.scoreboard.clone(),
            )),
            ActionKind::Magic => share(MagicCommand::new(
                self.hero.clone(),
                self.scoreboard.clone(),
            )),
            ActionKind::Heal => share(HealCommand::new(
                self.hero.clone(),
                self.scoreboard.clone(),
            )),
            ActionKind::RestoreMana => share(RestoreManaCommand::new(self.hero.clone())),
            ActionKind::Save => share(SaveCommand::new(
                self.hero.clone(),
                self.scoreboard.clone(),
                self.store.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::{Hero, MemoryStore, Scoreboard, shared};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn factory() -> CommandFactory {
        CommandFactory::new(
            shared(Hero::default()),
            shared(Scoreboard::default()),
            Arc::new(MemoryStore::new()),
        )
    }

    #[test]
    fn test_direction_synonyms() {
        assert_eq!("north".parse::<MoveDirection>(), Ok(MoveDirection::North));
        assert_eq!("NORTE".parse::<MoveDirection>(), Ok(MoveDirection::North));
        assert_eq!("  Sur ".parse::<MoveDirection>(), Ok(MoveDirection::South));
        assert_eq!("derecha".parse::<MoveDirection>(), Ok(MoveDirection::East));
        assert_eq!("w".parse::<MoveDirection>(), Ok(MoveDirection::West));
    }

    #[test]
    fn test_action_synonyms() {
        assert_eq!("hechizo".parse::<ActionKind>(), Ok(ActionKind::Magic));
        assert_eq!("Restore-Mana".parse::<ActionKind>(), Ok(ActionKind::RestoreMana));
        assert_eq!("guardar".parse::<ActionKind>(), Ok(ActionKind::Save));
        assert_eq!("HIT".parse::<ActionKind>(), Ok(ActionKind::Attack));
    }

    #[test]
    fn test_every_key_parses_back_to_its_kind() {
        for direction in MoveDirection::ALL {
            for key in direction.keys() {
                assert_eq!(
                    key.parse::<CommandKind>(),
                    Ok(CommandKind::Move(direction))
                );
            }
        }
        for action in ActionKind::ALL {
            for key in action.keys() {
                assert_eq!(key.parse::<CommandKind>(), Ok(CommandKind::Action(action)));
            }
        }
    }

    #[test]
    fn test_key_tables_do_not_overlap() {
        let mut seen = HashSet::new();
        let all_keys = MoveDirection::ALL
            .iter()
            .flat_map(|d| d.keys())
            .chain(ActionKind::ALL.iter().flat_map(|a| a.keys()));
        for key in all_keys {
            assert!(seen.insert(*key), "duplicate key {}", key);
        }
    }

    #[test]
    fn test_unknown_key() {
        let result = factory().create("dance");
        let err = result.err().unwrap();
        assert_eq!(err, FactoryError::UnrecognizedKind("dance".into()));
        assert!(err.to_string().contains("Unrecognized command kind"));
    }

    #[test]
    fn test_create_binds_descriptions() {
        let factory = factory();
        let cmd = factory.create("norte").unwrap();
        assert_eq!(cmd.lock().unwrap().description(), "Move North");

        let save = factory.create("save").unwrap();
        assert!(!save.lock().unwrap().is_reversible());
    }
}
