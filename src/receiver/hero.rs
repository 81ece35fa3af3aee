// Hero - the mutable actor that movement and action commands operate on

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_HEALTH: u32 = 100;
pub const DEFAULT_MAX_MANA: u32 = 100;
pub const DEFAULT_MAX_STAMINA: u32 = 100;

/// Grid position of the hero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

/// Actor with a position and three resource pools
///
/// Commands only reach the hero through these methods and capture the
/// previous field values themselves for undo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hero {
    name: String,
    position: Position,
    health: u32,
    max_health: u32,
    mana: u32,
    max_mana: u32,
    stamina: u32,
    max_stamina: u32,
}

impl Hero {
    /// Create a hero at the origin with full pools
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: Position::default(),
            health: DEFAULT_MAX_HEALTH,
            max_health: DEFAULT_MAX_HEALTH,
            mana: DEFAULT_MAX_MANA,
            max_mana: DEFAULT_MAX_MANA,
            stamina: DEFAULT_MAX_STAMINA,
            max_stamina: DEFAULT_MAX_STAMINA,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn max_health(&self) -> u32 {
        self.max_health
    }

    pub fn mana(&self) -> u32 {
        self.mana
    }

    pub fn max_mana(&self) -> u32 {
        self.max_mana
    }

    pub fn stamina(&self) -> u32 {
        self.stamina
    }

    pub fn max_stamina(&self) -> u32 {
        self.max_stamina
    }

    /// A hero with no health left is incapacitated
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn move_by(&mut self, dx: i32, dy: i32) {
        self.position = self.position.offset(dx, dy);
    }

    /// Reduce health, saturating at zero
    pub fn apply_damage(&mut self, amount: u32) {
        self.health = self.health.saturating_sub(amount);
    }

    /// Increase health up to the maximum
    pub fn restore_health(&mut self, amount: u32) {
        self.health = self.health.saturating_add(amount).min(self.max_health);
    }

    /// Spend mana. Returns false without mutating if the pool is too low.
    pub fn consume_mana(&mut self, amount: u32) -> bool {
        if self.mana < amount {
            return false;
        }
        self.mana -= amount;
        true
    }

    /// Spend stamina. Returns false without mutating if the pool is too low.
    pub fn consume_stamina(&mut self, amount: u32) -> bool {
        if self.stamina < amount {
            return false;
        }
        self.stamina -= amount;
        true
    }

    pub fn restore_mana(&mut self, amount: u32) {
        self.mana = self.mana.saturating_add(amount).min(self.max_mana);
    }

    // Direct setters used by undo to put captured values back

    pub fn set_position(&mut self, position: Position) {
        self.position = position;
    }

    pub fn set_health(&mut self, health: u32) {
        self.health = health.min(self.max_health);
    }

    pub fn set_mana(&mut self, mana: u32) {
        self.mana = mana.min(self.max_mana);
    }

    pub fn set_stamina(&mut self, stamina: u32) {
        self.stamina = stamina.min(self.max_stamina);
    }
}

impl Default for Hero {
    fn default() -> Self {
        Self::new("Hero")
    }
}
