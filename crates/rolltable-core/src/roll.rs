use serde::{Deserialize, Serialize};

use uuid::Uuid;

use crate::dice::{Advantage, DiceFormula, RollOutcome};

/// One recorded dice roll. Immutable after creation except for the one-shot
/// `revealed_by` assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    pub roll_id: String,
    pub player_name: String,
    pub formula: String,
    pub individual_results: Vec<i32>,
    pub modifier: i32,
    pub total: i32,
    #[serde(default)]
    pub advantage: Advantage,
    /// Both rolled values when advantage/disadvantage was applied.
    #[serde(default)]
    pub advantage_rolls: Option<(i32, i32)>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub revealed_by: Option<String>,
    /// Pass/fail against the room's DC at roll time, when one was set.
    #[serde(default)]
    pub dc_pass: Option<bool>,
    /// Epoch millis; history display sorts on this, descending.
    pub timestamp_ms: u64,
}

/// Generate a roll id: epoch millis plus a random suffix.
pub fn generate_roll_id() -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("{}-{}", crate::time::timestamp_millis(), &uuid[..8])
}

impl Roll {
    /// Build a roll record from an executed formula outcome, evaluating the
    /// room's DC if one is set.
    pub fn from_outcome(
        player_name: String,
        formula: &DiceFormula,
        advantage: Advantage,
        outcome: RollOutcome,
        hidden: bool,
        dc: Option<i32>,
    ) -> Self {
        Self {
            roll_id: generate_roll_id(),
            player_name,
            formula: formula.to_string(),
            total: outcome.total,
            individual_results: outcome.individual_results,
            modifier: outcome.modifier,
            advantage,
            advantage_rolls: outcome.advantage_rolls,
            hidden,
            revealed_by: None,
            dc_pass: dc.map(|dc| outcome.total >= dc),
            timestamp_ms: crate::time::timestamp_millis(),
        }
    }

    /// Whether this roll's details are still withheld from non-DM players.
    pub fn is_concealed(&self) -> bool {
        self.hidden && self.revealed_by.is_none()
    }

    /// A copy safe to send to non-DM players while the roll is concealed:
    /// only the roller, the die size, and the timestamp survive.
    pub fn redacted(&self) -> Self {
        let sides = DiceFormula::parse(&self.formula)
            .map(|f| f.sides)
            .unwrap_or(0);
        Self {
            roll_id: self.roll_id.clone(),
            player_name: self.player_name.clone(),
            formula: format!("hidden d{sides}"),
            individual_results: Vec::new(),
            modifier: 0,
            total: 0,
            advantage: Advantage::None,
            advantage_rolls: None,
            hidden: true,
            revealed_by: None,
            dc_pass: None,
            timestamp_ms: self.timestamp_ms,
        }
    }

    /// One-shot reveal. Returns true if this call performed the transition;
    /// repeated calls are no-ops and the first attribution stands.
    pub fn reveal(&mut self, revealed_by: &str) -> bool {
        if !self.hidden || self.revealed_by.is_some() {
            return false;
        }
        self.revealed_by = Some(revealed_by.to_string());
        true
    }
}
