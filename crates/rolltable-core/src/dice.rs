use serde::{Deserialize, Serialize};

use rand::Rng;

use crate::error::Error;

/// Limits on formula components, matching the UI's dice picker range.
pub const MAX_DICE_COUNT: i32 = 100;
pub const MAX_DICE_SIDES: i32 = 1000;
pub const MAX_MODIFIER: i32 = 1000;

/// Roll-twice-take-best/worst mechanic. Applies to single-die formulas only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Advantage {
    #[default]
    None,
    Advantage,
    Disadvantage,
}

/// A parsed dice formula: `NdS`, `NdS+K`, or `NdS-K`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiceFormula {
    pub count: i32,
    pub sides: i32,
    pub modifier: i32,
}

impl DiceFormula {
    /// Parse a formula string such as "3d6+2" or "1d20-3".
    pub fn parse(input: &str) -> Result<Self, Error> {
        let s = input.trim();
        let (count_str, rest) = s
            .split_once(['d', 'D'])
            .ok_or_else(|| Error::validation(format!("Invalid dice formula: {input}")))?;

        let (sides_str, modifier) = if let Some(pos) = rest.find(['+', '-']) {
            let (sides, modifier_str) = rest.split_at(pos);
            let modifier: i32 = modifier_str
                .parse()
                .map_err(|_| Error::validation(format!("Invalid modifier in formula: {input}")))?;
            (sides, modifier)
        } else {
            (rest, 0)
        };

        let count: i32 = count_str
            .parse()
            .map_err(|_| Error::validation(format!("Invalid dice count in formula: {input}")))?;
        let sides: i32 = sides_str
            .parse()
            .map_err(|_| Error::validation(format!("Invalid dice sides in formula: {input}")))?;

        if !(1..=MAX_DICE_COUNT).contains(&count) {
            return Err(Error::validation(format!(
                "Dice count must be 1-{MAX_DICE_COUNT}"
            )));
        }
        if !(2..=MAX_DICE_SIDES).contains(&sides) {
            return Err(Error::validation(format!(
                "Dice sides must be 2-{MAX_DICE_SIDES}"
            )));
        }
        if modifier.abs() > MAX_MODIFIER {
            return Err(Error::validation(format!(
                "Modifier must be within ±{MAX_MODIFIER}"
            )));
        }

        Ok(Self {
            count,
            sides,
            modifier,
        })
    }
}

impl std::fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        if self.modifier > 0 {
            write!(f, "+{}", self.modifier)?;
        } else if self.modifier < 0 {
            write!(f, "{}", self.modifier)?;
        }
        Ok(())
    }
}

/// Source of die faces. The server uses the thread RNG; tests inject
/// scripted sequences.
pub trait DiceRoller {
    /// Roll one die, returning a face in 1..=sides.
    fn roll(&self, sides: i32) -> i32;
}

/// Thread-RNG backed roller used in production.
#[derive(Debug, Default)]
pub struct ThreadRngRoller;

impl DiceRoller for ThreadRngRoller {
    fn roll(&self, sides: i32) -> i32 {
        rand::rng().random_range(1..=sides)
    }
}

/// The raw outcome of executing a formula, before it becomes a Roll record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollOutcome {
    pub individual_results: Vec<i32>,
    pub modifier: i32,
    pub total: i32,
    /// Both rolled values when advantage/disadvantage was applied.
    pub advantage_rolls: Option<(i32, i32)>,
}

/// Execute a formula server-side. Advantage and disadvantage roll the single
/// die twice and keep max/min; `individual_results` then holds only the
/// selected value.
pub fn execute(
    formula: &DiceFormula,
    advantage: Advantage,
    roller: &dyn DiceRoller,
) -> Result<RollOutcome, Error> {
    if advantage != Advantage::None {
        if formula.count != 1 {
            return Err(Error::validation(
                "Advantage applies only to single-die rolls",
            ));
        }
        let first = roller.roll(formula.sides);
        let second = roller.roll(formula.sides);
        let selected = match advantage {
            Advantage::Advantage => first.max(second),
            Advantage::Disadvantage => first.min(second),
            Advantage::None => unreachable!(),
        };
        return Ok(RollOutcome {
            individual_results: vec![selected],
            modifier: formula.modifier,
            total: selected + formula.modifier,
            advantage_rolls: Some((first, second)),
        });
    }

    let results: Vec<i32> = (0..formula.count)
        .map(|_| roller.roll(formula.sides))
        .collect();
    let total: i32 = results.iter().sum::<i32>() + formula.modifier;
    Ok(RollOutcome {
        individual_results: results,
        modifier: formula.modifier,
        total,
        advantage_rolls: None,
    })
}
