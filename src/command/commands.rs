// Concrete command implementations

use crate::command::factory::MoveDirection;
use crate::command::trait_def::{Command, CommandError, CommandMeta, CommandResult};
use crate::receiver::{GameSnapshot, Position, SaveId, SharedHero, SharedScoreboard, SharedStore};
use std::sync::{Mutex, MutexGuard};

pub const ATTACK_STAMINA_COST: u32 = 10;
pub const ATTACK_COUNTER_DAMAGE: u32 = 5;
pub const ATTACK_POINTS: i64 = 10;
pub const MAGIC_MANA_COST: u32 = 20;
pub const MAGIC_POINTS: i64 = 25;
pub const HEAL_MANA_COST: u32 = 15;
pub const HEAL_AMOUNT: u32 = 30;
pub const MANA_RESTORE_AMOUNT: u32 = 25;

/// Lock a receiver, turning a poisoned mutex into a reportable error
fn lock<'a, T>(receiver: &'a Mutex<T>, name: &str) -> CommandResult<MutexGuard<'a, T>> {
    receiver
        .lock()
        .map_err(|_| CommandError::Poisoned(name.to_string()))
}

fn require_alive(alive: bool, name: &str) -> CommandResult<()> {
    if alive {
        Ok(())
    } else {
        Err(CommandError::PreconditionFailed(format!(
            "{} is incapacitated",
            name
        )))
    }
}

/// Command to move the hero one step
///
/// Stores the previous position and move counter to enable undo.
pub struct MoveCommand {
    meta: CommandMeta,
    hero: SharedHero,
    scoreboard: SharedScoreboard,
    direction: MoveDirection,
    previous: Option<(Position, u32)>,
}

impl MoveCommand {
    pub fn new(hero: SharedHero, scoreboard: SharedScoreboard, direction: MoveDirection) -> Self {
        Self {
            meta: CommandMeta::new(),
            hero,
            scoreboard,
            direction,
            previous: None,
        }
    }

    pub fn direction(&self) -> MoveDirection {
        self.direction
    }
}

impl Command for MoveCommand {
    fn execute(&mut self) -> CommandResult<()> {
        self.meta.ensure_not_executed()?;

        let mut hero = lock(&self.hero, "hero")?;
        let mut board = lock(&self.scoreboard, "scoreboard")?;
        require_alive(hero.is_alive(), hero.name())?;

        self.previous = Some((hero.position(), board.moves));

        let (dx, dy) = self.direction.delta();
        hero.move_by(dx, dy);
        board.record_move();

        self.meta.mark_executed();
        Ok(())
    }

    fn undo(&mut self) -> CommandResult<()> {
        self.meta.ensure_executed()?;
        let (position, moves) = self
            .previous
            .ok_or_else(|| CommandError::Internal("No previous position stored".into()))?;

        let mut hero = lock(&self.hero, "hero")?;
        let mut board = lock(&self.scoreboard, "scoreboard")?;
        hero.set_position(position);
        board.moves = moves;

        self.meta.mark_undone();
        Ok(())
    }

    fn description(&self) -> String {
        format!("Move {}", self.direction)
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }
}

#[derive(Debug, Clone, Copy)]
struct AttackSnapshot {
    stamina: u32,
    health: u32,
    attacks: u32,
    score: i64,
}

/// Command for a melee attack
///
/// Costs stamina, and the hero takes a counter-hit.
pub struct AttackCommand {
    meta: CommandMeta,
    hero: SharedHero,
    scoreboard: SharedScoreboard,
    previous: Option<AttackSnapshot>,
}

impl AttackCommand {
    pub fn new(hero: SharedHero, scoreboard: SharedScoreboard) -> Self {
        Self {
            meta: CommandMeta::new(),
            hero,
            scoreboard,
            previous: None,
        }
    }
}

impl Command for AttackCommand {
    fn execute(&mut self) -> CommandResult<()> {
        self.meta.ensure_not_executed()?;

        let mut hero = lock(&self.hero, "hero")?;
        let mut board = lock(&self.scoreboard, "scoreboard")?;
        require_alive(hero.is_alive(), hero.name())?;

        let snapshot = AttackSnapshot {
            stamina: hero.stamina(),
            health: hero.health(),
            attacks: board.attacks,
            score: board.score,
        };

        if !hero.consume_stamina(ATTACK_STAMINA_COST) {
            return Err(CommandError::PreconditionFailed(format!(
                "Not enough stamina to attack ({} < {})",
                snapshot.stamina, ATTACK_STAMINA_COST
            )));
        }
        hero.apply_damage(ATTACK_COUNTER_DAMAGE);
        board.record_attack(ATTACK_POINTS);

        self.previous = Some(snapshot);
        self.meta.mark_executed();
        Ok(())
    }

    fn undo(&mut self) -> CommandResult<()> {
        self.meta.ensure_executed()?;
        let snapshot = self
            .previous
            .ok_or_else(|| CommandError::Internal("No previous attack state stored".into()))?;

        let mut hero = lock(&self.hero, "hero")?;
        let mut board = lock(&self.scoreboard, "scoreboard")?;
        hero.set_stamina(snapshot.stamina);
        hero.set_health(snapshot.health);
        board.attacks = snapshot.attacks;
        board.score = snapshot.score;

        self.meta.mark_undone();
        Ok(())
    }

    fn description(&self) -> String {
        "Attack".to_string()
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }
}

#[derive(Debug, Clone, Copy)]
struct SpellSnapshot {
    mana: u32,
    spells: u32,
    score: i64,
}

/// Command to cast an offensive spell
pub struct MagicCommand {
    meta: CommandMeta,
    hero: SharedHero,
    scoreboard: SharedScoreboard,
    previous: Option<SpellSnapshot>,
}

impl MagicCommand {
    pub fn new(hero: SharedHero, scoreboard: SharedScoreboard) -> Self {
        Self {
            meta: CommandMeta::new(),
            hero,
            scoreboard,
            previous: None,
        }
    }
}

impl Command for MagicCommand {
    fn execute(&mut self) -> CommandResult<()> {
        self.meta.ensure_not_executed()?;

        let mut hero = lock(&self.hero, "hero")?;
        let mut board = lock(&self.scoreboard, "scoreboard")?;
        require_alive(hero.is_alive(), hero.name())?;

        let snapshot = SpellSnapshot {
            mana: hero.mana(),
            spells: board.spells,
            score: board.score,
        };

        if !hero.consume_mana(MAGIC_MANA_COST) {
            return Err(CommandError::PreconditionFailed(format!(
                "Not enough mana to cast ({} < {})",
                snapshot.mana, MAGIC_MANA_COST
            )));
        }
        board.record_spell(MAGIC_POINTS);

        self.previous = Some(snapshot);
        self.meta.mark_executed();
        Ok(())
    }

    fn undo(&mut self) -> CommandResult<()> {
        self.meta.ensure_executed()?;
        let snapshot = self
            .previous
            .ok_or_else(|| CommandError::Internal("No previous spell state stored".into()))?;

        let mut hero = lock(&self.hero, "hero")?;
        let mut board = lock(&self.scoreboard, "scoreboard")?;
        hero.set_mana(snapshot.mana);
        board.spells = snapshot.spells;
        board.score = snapshot.score;

        self.meta.mark_undone();
        Ok(())
    }

    fn description(&self) -> String {
        "Cast Magic".to_string()
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }
}

#[derive(Debug, Clone, Copy)]
struct HealSnapshot {
    health: u32,
    mana: u32,
    heals: u32,
}

/// Command to heal the hero at the cost of mana
pub struct HealCommand {
    meta: CommandMeta,
    hero: SharedHero,
    scoreboard: SharedScoreboard,
    previous: Option<HealSnapshot>,
}

impl HealCommand {
    pub fn new(hero: SharedHero, scoreboard: SharedScoreboard) -> Self {
        Self {
            meta: CommandMeta::new(),
            hero,
            scoreboard,
            previous: None,
        }
    }
}

impl Command for HealCommand {
    fn execute(&mut self) -> CommandResult<()> {
        self.meta.ensure_not_executed()?;

        let mut hero = lock(&self.hero, "hero")?;
        let mut board = lock(&self.scoreboard, "scoreboard")?;
        require_alive(hero.is_alive(), hero.name())?;

        if hero.health() >= hero.max_health() {
            return Err(CommandError::PreconditionFailed(
                "Health is already full".into(),
            ));
        }

        let snapshot = HealSnapshot {
            health: hero.health(),
            mana: hero.mana(),
            heals: board.heals,
        };

        if !hero.consume_mana(HEAL_MANA_COST) {
            return Err(CommandError::PreconditionFailed(format!(
                "Not enough mana to heal ({} < {})",
                snapshot.mana, HEAL_MANA_COST
            )));
        }
        hero.restore_health(HEAL_AMOUNT);
        board.record_heal();

        self.previous = Some(snapshot);
        self.meta.mark_executed();
        Ok(())
    }

    fn undo(&mut self) -> CommandResult<()> {
        self.meta.ensure_executed()?;
        let snapshot = self
            .previous
            .ok_or_else(|| CommandError::Internal("No previous heal state stored".into()))?;

        let mut hero = lock(&self.hero, "hero")?;
        let mut board = lock(&self.scoreboard, "scoreboard")?;
        hero.set_health(snapshot.health);
        hero.set_mana(snapshot.mana);
        board.heals = snapshot.heals;

        self.meta.mark_undone();
        Ok(())
    }

    fn description(&self) -> String {
        "Heal".to_string()
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }
}

/// Command to refill part of the mana pool
pub struct RestoreManaCommand {
    meta: CommandMeta,
    hero: SharedHero,
    old_mana: Option<u32>,
}

impl RestoreManaCommand {
    pub fn new(hero: SharedHero) -> Self {
        Self {
            meta: CommandMeta::new(),
            hero,
            old_mana: None,
        }
    }
}

impl Command for RestoreManaCommand {
    fn execute(&mut self) -> CommandResult<()> {
        self.meta.ensure_not_executed()?;

        let mut hero = lock(&self.hero, "hero")?;
        require_alive(hero.is_alive(), hero.name())?;

        if hero.mana() >= hero.max_mana() {
            return Err(CommandError::PreconditionFailed("Mana is already full".into()));
        }

        self.old_mana = Some(hero.mana());
        hero.restore_mana(MANA_RESTORE_AMOUNT);

        self.meta.mark_executed();
        Ok(())
    }

    fn undo(&mut self) -> CommandResult<()> {
        self.meta.ensure_executed()?;
        let old_mana = self
            .old_mana
            .ok_or_else(|| CommandError::Internal("No previous mana stored".into()))?;

        lock(&self.hero, "hero")?.set_mana(old_mana);

        self.meta.mark_undone();
        Ok(())
    }

    fn description(&self) -> String {
        "Restore Mana".to_string()
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }
}

/// Command to persist a snapshot of the game
///
/// Saving cannot be taken back, so this command is irreversible: undo always
/// refuses and the manager leaves it in history.
pub struct SaveCommand {
    meta: CommandMeta,
    hero: SharedHero,
    scoreboard: SharedScoreboard,
    store: SharedStore,
    save_id: Option<SaveId>,
}

impl SaveCommand {
    pub fn new(hero: SharedHero, scoreboard: SharedScoreboard, store: SharedStore) -> Self {
        Self {
            meta: CommandMeta::new(),
            hero,
            scoreboard,
            store,
            save_id: None,
        }
    }

    /// Identifier returned by the store, once executed
    pub fn save_id(&self) -> Option<SaveId> {
        self.save_id
    }
}

impl Command for SaveCommand {
    fn execute(&mut self) -> CommandResult<()> {
        self.meta.ensure_not_executed()?;

        let hero = lock(&self.hero, "hero")?;
        let mut board = lock(&self.scoreboard, "scoreboard")?;

        let snapshot = GameSnapshot::capture(&hero, &board);
        let id = self
            .store
            .persist(&snapshot)
            .map_err(|e| CommandError::Internal(format!("Save failed: {}", e)))?;
        board.record_save();

        self.save_id = Some(id);
        self.meta.mark_executed();
        Ok(())
    }

    fn undo(&mut self) -> CommandResult<()> {
        Err(CommandError::NotReversible(format!(
            "{} has already been persisted",
            self.description()
        )))
    }

    fn description(&self) -> String {
        "Save Game".to_string()
    }

    fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    fn is_reversible(&self) -> bool {
        false
    }
}
