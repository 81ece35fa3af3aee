// Scoreboard - running counters mutated by action commands

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scoreboard {
    pub score: i64,
    pub moves: u32,
    pub attacks: u32,
    pub spells: u32,
    pub heals: u32,
    pub saves: u32,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_move(&mut self) {
        self.moves = self.moves.saturating_add(1);
    }

    pub fn record_attack(&mut self, points: i64) {
        self.attacks = self.attacks.saturating_add(1);
        self.score = self.score.saturating_add(points);
    }

    pub fn record_spell(&mut self, points: i64) {
        self.spells = self.spells.saturating_add(1);
        self.score = self.score.saturating_add(points);
    }

    pub fn record_heal(&mut self) {
        self.heals = self.heals.saturating_add(1);
    }

    pub fn record_save(&mut self) {
        self.saves = self.saves.saturating_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut board = Scoreboard::new();
        board.record_move();
        board.record_attack(10);
        board.record_spell(25);
        board.record_heal();

        assert_eq!(board.moves, 1);
        assert_eq!(board.attacks, 1);
        assert_eq!(board.spells, 1);
        assert_eq!(board.heals, 1);
        assert_eq!(board.score, 35);
    }
}
