use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Moderate,
    Severe,
    Critical,
}

/// One automatic condition badge. The malus is descriptive metadata shown
/// on the sheet; it is never folded into roll math automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    pub name: &'static str,
    pub severity: Severity,
    pub roll_malus: i32,
    pub effect: &'static str,
}

const DEAD: StatusCondition = StatusCondition {
    name: "Dead",
    severity: Severity::Critical,
    roll_malus: -100,
    effect: "The investigator has died",
};
const DYING: StatusCondition = StatusCondition {
    name: "Dying",
    severity: Severity::Critical,
    roll_malus: -50,
    effect: "Unconscious and bleeding out; first aid required",
};
const MAJOR_WOUND: StatusCondition = StatusCondition {
    name: "Major Wound",
    severity: Severity::Severe,
    roll_malus: -20,
    effect: "-20% to all rolls",
};
const MINOR_WOUND: StatusCondition = StatusCondition {
    name: "Minor Wound",
    severity: Severity::Moderate,
    roll_malus: -10,
    effect: "-10% to physical rolls",
};
const PERMANENT_MADNESS: StatusCondition = StatusCondition {
    name: "Permanent Madness",
    severity: Severity::Critical,
    roll_malus: -100,
    effect: "The investigator is lost to madness",
};
const MAJOR_MADNESS: StatusCondition = StatusCondition {
    name: "Major Madness",
    severity: Severity::Severe,
    roll_malus: -30,
    effect: "-30% to social rolls",
};
const MENTAL_INSTABILITY: StatusCondition = StatusCondition {
    name: "Mental Instability",
    severity: Severity::Moderate,
    roll_malus: -15,
    effect: "-15% to Psychology and Persuade",
};
const CRITICAL_STATE: StatusCondition = StatusCondition {
    name: "Critical State",
    severity: Severity::Critical,
    roll_malus: -40,
    effect: "-40% to all rolls",
};

fn ratio(current: i32, max: i32) -> f64 {
    if max <= 0 {
        return 0.0;
    }
    f64::from(current) / f64::from(max)
}

/// Computes the automatic condition badges for the given gauges. HP and
/// Sanity ladders are evaluated independently, first match wins within
/// each; the combined Critical State stacks on top when both ratios sit
/// below 0.3. Deterministic, side-effect free; persisting the result as
/// debuff rows is the mutator's job.
pub fn derive_status(hp: i32, max_hp: i32, sanity: i32, max_sanity: i32) -> Vec<StatusCondition> {
    let mut conditions = Vec::new();

    let hp_ratio = ratio(hp, max_hp);
    if hp <= 0 {
        conditions.push(DEAD);
    } else if hp <= 2 {
        conditions.push(DYING);
    } else if hp_ratio < 0.5 {
        conditions.push(MAJOR_WOUND);
    } else if hp_ratio < 0.75 {
        conditions.push(MINOR_WOUND);
    }

    let sanity_ratio = ratio(sanity, max_sanity);
    if sanity <= 0 {
        conditions.push(PERMANENT_MADNESS);
    } else if sanity_ratio < 0.2 {
        conditions.push(MAJOR_MADNESS);
    } else if sanity_ratio < 0.5 {
        conditions.push(MENTAL_INSTABILITY);
    }

    if hp_ratio < 0.3 && sanity_ratio < 0.3 {
        conditions.push(CRITICAL_STATE);
    }

    conditions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(conditions: &[StatusCondition]) -> Vec<&'static str> {
        conditions.iter().map(|c| c.name).collect()
    }

    #[test]
    fn healthy_character_has_no_conditions() {
        assert!(derive_status(8, 10, 40, 50).is_empty());
    }

    #[test]
    fn dying_wins_over_major_wound() {
        // hp 1/10 also satisfies the major-wound ratio; only the most
        // severe HP condition may apply.
        assert_eq!(names(&derive_status(1, 10, 50, 50)), vec!["Dying"]);
    }

    #[test]
    fn dead_at_zero_hp() {
        assert_eq!(names(&derive_status(0, 10, 50, 50)), vec!["Dead"]);
    }

    #[test]
    fn wound_ladder_thresholds() {
        assert_eq!(names(&derive_status(4, 10, 50, 50)), vec!["Major Wound"]);
        assert_eq!(names(&derive_status(7, 10, 50, 50)), vec!["Minor Wound"]);
        assert!(derive_status(8, 10, 50, 50).is_empty());
    }

    #[test]
    fn sanity_ladder_thresholds() {
        assert_eq!(
            names(&derive_status(10, 10, 0, 50)),
            vec!["Permanent Madness"]
        );
        assert_eq!(names(&derive_status(10, 10, 9, 50)), vec!["Major Madness"]);
        assert_eq!(
            names(&derive_status(10, 10, 20, 50)),
            vec!["Mental Instability"]
        );
        assert!(derive_status(10, 10, 25, 50).is_empty());
    }

    #[test]
    fn critical_state_fires_when_both_ratios_below_threshold() {
        let conditions = derive_status(0, 10, 0, 10);
        let got = names(&conditions);
        assert!(got.contains(&"Dead"));
        assert!(got.contains(&"Permanent Madness"));
        assert!(got.contains(&"Critical State"));
        assert_eq!(conditions.len(), 3);
    }

    #[test]
    fn critical_state_requires_both_gauges_low() {
        let got = names(&derive_status(2, 10, 40, 50));
        assert!(got.contains(&"Dying"));
        assert!(!got.contains(&"Critical State"));
    }

    #[test]
    fn zero_max_gauges_count_as_depleted() {
        let got = names(&derive_status(0, 0, 0, 0));
        assert!(got.contains(&"Dead"));
        assert!(got.contains(&"Permanent Madness"));
        assert!(got.contains(&"Critical State"));
    }
}
