use once_cell::sync::Lazy;
use rand::random_range;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::roll::RollOutcome;

static DICE_FORMULA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)d(\d+)([+-]\d+)?$").expect("dice pattern is valid"));

/// Upper bound on dice per formula so a typo cannot ask for millions of
/// rolls.
const MAX_DICE: i64 = 100;
const MAX_SIDES: i64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum DiceError {
    #[error("invalid dice formula \"{0}\"")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollOutput {
    pub total: i64,
    pub rolls: Vec<i64>,
}

/// Rolls a `NdM[+K|-K]` formula. A bare integer is a constant with no
/// rolls. Anything else is a `DiceError::Parse` the caller must surface to
/// the user instead of crashing the roll pipeline.
pub fn roll_formula(formula: &str) -> Result<RollOutput, DiceError> {
    let formula = formula.trim();

    if let Some(caps) = DICE_FORMULA.captures(formula) {
        let parse_err = || DiceError::Parse(formula.to_string());

        let count: i64 = caps[1].parse().map_err(|_| parse_err())?;
        let sides: i64 = caps[2].parse().map_err(|_| parse_err())?;
        let modifier: i64 = caps
            .get(3)
            .map(|m| m.as_str().parse())
            .transpose()
            .map_err(|_| parse_err())?
            .unwrap_or(0);

        if count < 1 || count > MAX_DICE || sides < 1 || sides > MAX_SIDES {
            return Err(parse_err());
        }

        let rolls: Vec<i64> = (0..count).map(|_| random_range(1..=sides)).collect();
        let total = rolls.iter().sum::<i64>() + modifier;
        return Ok(RollOutput { total, rolls });
    }

    if let Ok(constant) = formula.parse::<i64>() {
        return Ok(RollOutput {
            total: constant,
            rolls: Vec::new(),
        });
    }

    Err(DiceError::Parse(formula.to_string()))
}

/// Classifies a d100 result against a skill value.
///
/// The fumble band (96-100) wins even when the roll would also sit under
/// the skill value (skill 99, roll 97 is a fumble). Deliberate policy,
/// pinned by test.
pub fn classify_percentile(result: i64, skill: i32) -> RollOutcome {
    let skill = i64::from(skill);

    if result == 1 {
        return RollOutcome::CriticalSuccess;
    }
    if (96..=100).contains(&result) {
        return RollOutcome::Fumble;
    }

    if result <= skill / 5 {
        RollOutcome::ExtremeSuccess
    } else if result <= skill / 2 {
        RollOutcome::HardSuccess
    } else if result <= skill {
        RollOutcome::Success
    } else {
        RollOutcome::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_die_totals_stay_in_range() {
        for _ in 0..200 {
            let out = roll_formula("3d6+2").unwrap();
            assert!((5..=20).contains(&out.total), "total {}", out.total);
            assert_eq!(out.rolls.len(), 3);
            assert!(out.rolls.iter().all(|r| (1..=6).contains(r)));
        }
    }

    #[test]
    fn percentile_totals_stay_in_range() {
        for _ in 0..200 {
            let out = roll_formula("1d100").unwrap();
            assert!((1..=100).contains(&out.total));
        }
    }

    #[test]
    fn negative_modifier_applies() {
        for _ in 0..50 {
            let out = roll_formula("2d4-1").unwrap();
            assert!((1..=7).contains(&out.total));
        }
    }

    #[test]
    fn bare_integer_is_a_constant() {
        let out = roll_formula("7").unwrap();
        assert_eq!(out.total, 7);
        assert!(out.rolls.is_empty());

        let out = roll_formula("-3").unwrap();
        assert_eq!(out.total, -3);
    }

    #[test]
    fn malformed_formulas_fail_to_parse() {
        for bad in ["not-a-formula", "d6", "2d", "2x6", "", "1d6+", "1.5d6"] {
            assert!(
                matches!(roll_formula(bad), Err(DiceError::Parse(_))),
                "expected parse failure for {bad:?}"
            );
        }
    }

    #[test]
    fn absurd_dice_counts_are_rejected() {
        assert!(roll_formula("101d6").is_err());
        assert!(roll_formula("0d6").is_err());
        assert!(roll_formula("1d0").is_err());
    }

    #[test]
    fn outcome_table() {
        assert_eq!(classify_percentile(1, 50), RollOutcome::CriticalSuccess);
        assert_eq!(classify_percentile(10, 50), RollOutcome::ExtremeSuccess);
        assert_eq!(classify_percentile(25, 50), RollOutcome::HardSuccess);
        assert_eq!(classify_percentile(50, 50), RollOutcome::Success);
        assert_eq!(classify_percentile(51, 50), RollOutcome::Failure);
        assert_eq!(classify_percentile(96, 50), RollOutcome::Fumble);
    }

    #[test]
    fn fumble_wins_over_high_skill() {
        // Roll 97 is under a skill of 99, but the fumble band overrides.
        assert_eq!(classify_percentile(97, 99), RollOutcome::Fumble);
        assert_eq!(classify_percentile(100, 99), RollOutcome::Fumble);
    }
}
