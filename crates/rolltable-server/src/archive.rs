use std::collections::VecDeque;

use rolltable_core::roll::Roll;

/// Default maximum number of rolls kept before oldest are evicted.
const DEFAULT_MAX_ARCHIVED_ROLLS: usize = 10_000;

/// Aggregate statistics about the roll archive.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RollArchiveStats {
    pub total_stored: usize,
    pub total_concealed: usize,
}

/// In-memory, bounded archive of every roll the server has executed.
/// Backs the roll permalink endpoint, so entries outlive their room.
pub struct RollArchive {
    rolls: VecDeque<Roll>,
    max_rolls: usize,
}

impl Default for RollArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl RollArchive {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_ARCHIVED_ROLLS)
    }

    pub fn with_capacity(max_rolls: usize) -> Self {
        Self {
            rolls: VecDeque::new(),
            max_rolls,
        }
    }

    /// Archive a roll. Evicts the oldest roll if at capacity.
    pub fn insert(&mut self, roll: Roll) {
        self.rolls.push_back(roll);
        while self.rolls.len() > self.max_rolls {
            self.rolls.pop_front();
        }
    }

    pub fn get(&self, roll_id: &str) -> Option<&Roll> {
        self.rolls.iter().find(|r| r.roll_id == roll_id)
    }

    /// Mirror a reveal that happened in the room copy, so the permalink
    /// starts serving the roll. Returns true if the archived entry changed.
    pub fn reveal(&mut self, roll_id: &str, revealed_by: &str) -> bool {
        match self.rolls.iter_mut().find(|r| r.roll_id == roll_id) {
            Some(roll) => roll.reveal(revealed_by),
            None => false,
        }
    }

    pub fn stats(&self) -> RollArchiveStats {
        RollArchiveStats {
            total_stored: self.rolls.len(),
            total_concealed: self.rolls.iter().filter(|r| r.is_concealed()).count(),
        }
    }
}
