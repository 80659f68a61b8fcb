use std::collections::BTreeMap;

use serde_json::json;

use crate::alert::TierMode;
use crate::logging::{log, obj, v_num, Domain, Level};
use crate::model::Scenario;

/// Which pair of figures a line's variance compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarianceBasis {
    /// Recorded actual spend against the baseline budget.
    ActualVsBudget,
    /// Scenario-adjusted amount against the baseline budget.
    AdjustedVsBudget,
}

/// Grouping attribute for grouped totals and chart projections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Department,
    Category,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub tier_mode: TierMode,
    /// Threshold applied to lines that carry no threshold of their own.
    pub default_threshold_pct: f64,
    pub variance_basis: VarianceBasis,
    pub group_by: GroupBy,
    /// Scale applied to `baseline × (1 + driver/100)` per scenario.
    pub multipliers: BTreeMap<Scenario, f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tier_mode: TierMode::ThreeTier,
            default_threshold_pct: 5.0,
            variance_basis: VarianceBasis::ActualVsBudget,
            group_by: GroupBy::Department,
            multipliers: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let cfg = Self {
            tier_mode: match std::env::var("ALERT_TIERS").as_deref() {
                Ok("4") => TierMode::FourTier,
                Ok("3") => TierMode::ThreeTier,
                _ => defaults.tier_mode,
            },
            default_threshold_pct: std::env::var("DEFAULT_THRESHOLD_PCT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_threshold_pct),
            variance_basis: match std::env::var("VARIANCE_BASIS").as_deref() {
                Ok("adjusted") => VarianceBasis::AdjustedVsBudget,
                Ok("actual") => VarianceBasis::ActualVsBudget,
                _ => defaults.variance_basis,
            },
            group_by: match std::env::var("GROUP_BY").as_deref() {
                Ok("category") => GroupBy::Category,
                Ok("department") => GroupBy::Department,
                _ => defaults.group_by,
            },
            multipliers: std::env::var("SCENARIO_MULTIPLIERS")
                .map(|v| parse_multipliers(&v))
                .unwrap_or_default(),
        };
        log(
            Level::Debug,
            Domain::System,
            "config_loaded",
            obj(&[
                ("four_tier", json!(cfg.tier_mode == TierMode::FourTier)),
                ("default_threshold_pct", v_num(cfg.default_threshold_pct)),
                ("multipliers", json!(cfg.multipliers.len())),
            ]),
        );
        cfg
    }

    pub fn with_multiplier(mut self, scenario: Scenario, multiplier: f64) -> Self {
        self.multipliers.insert(scenario, multiplier);
        self
    }

    pub fn with_tier_mode(mut self, mode: TierMode) -> Self {
        self.tier_mode = mode;
        self
    }

    pub fn with_variance_basis(mut self, basis: VarianceBasis) -> Self {
        self.variance_basis = basis;
        self
    }

    /// Configured multiplier, 1.0 when the scenario has none.
    pub fn multiplier(&self, scenario: Scenario) -> f64 {
        self.multipliers.get(&scenario).copied().unwrap_or(1.0)
    }
}

/// Parses `best_case:1.4,worst_case:0.8`. Malformed pairs are skipped.
pub fn parse_multipliers(raw: &str) -> BTreeMap<Scenario, f64> {
    raw.split(',')
        .filter_map(|pair| {
            let (name, value) = pair.split_once(':')?;
            let scenario = name.parse::<Scenario>().ok()?;
            let mult = value.trim().parse::<f64>().ok().filter(|m| m.is_finite())?;
            Some((scenario, mult))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipliers_parse_and_skip_garbage() {
        let m = parse_multipliers("best_case:1.4, worst_case:0.8,bogus:2,aggressive:x");
        assert_eq!(m.len(), 2);
        assert_eq!(m[&Scenario::BestCase], 1.4);
        assert_eq!(m[&Scenario::WorstCase], 0.8);
    }

    #[test]
    fn missing_multiplier_defaults_to_one() {
        let cfg = Config::default().with_multiplier(Scenario::BestCase, 1.4);
        assert_eq!(cfg.multiplier(Scenario::BestCase), 1.4);
        assert_eq!(cfg.multiplier(Scenario::Baseline), 1.0);
    }
}
