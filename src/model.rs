//! Line items, scenarios and per-scenario values.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Closed set of what-if configurations a page can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    Baseline,
    BestCase,
    WorstCase,
    Optimistic,
    Conservative,
    Aggressive,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::Baseline,
        Scenario::BestCase,
        Scenario::WorstCase,
        Scenario::Optimistic,
        Scenario::Conservative,
        Scenario::Aggressive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Baseline => "baseline",
            Scenario::BestCase => "best_case",
            Scenario::WorstCase => "worst_case",
            Scenario::Optimistic => "optimistic",
            Scenario::Conservative => "conservative",
            Scenario::Aggressive => "aggressive",
        }
    }

    /// Display label used in table headers and chart legends.
    pub fn label(&self) -> &'static str {
        match self {
            Scenario::Baseline => "Baseline",
            Scenario::BestCase => "Best Case",
            Scenario::WorstCase => "Worst Case",
            Scenario::Optimistic => "Optimistic",
            Scenario::Conservative => "Conservative",
            Scenario::Aggressive => "Aggressive",
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Scenario {
    type Err = PlanError;

    /// Accepts the snake_case id or the display label, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        Scenario::ALL
            .iter()
            .copied()
            .find(|sc| sc.as_str() == norm)
            .ok_or_else(|| PlanError::UnknownScenario(s.to_string()))
    }
}

/// Values one line item carries under one scenario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioValue {
    /// Percentage driver (growth rate, cost change) feeding `suggested`.
    #[serde(default)]
    pub driver_pct: f64,
    /// System-suggested amount.
    #[serde(default)]
    pub suggested: f64,
    /// User override; seeded from `suggested` whenever the driver changes.
    #[serde(default)]
    pub adjusted: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub insight: String,
}

/// Zero-valued record returned for a scenario a line item does not carry.
pub static FALLBACK_VALUE: ScenarioValue = ScenarioValue {
    driver_pct: 0.0,
    suggested: 0.0,
    adjusted: 0.0,
    tag: None,
    justification: String::new(),
    insight: String::new(),
};

impl ScenarioValue {
    pub fn new(driver_pct: f64, suggested: f64) -> Self {
        Self {
            driver_pct,
            suggested,
            adjusted: suggested,
            ..Default::default()
        }
    }

    pub fn with_insight(mut self, insight: &str) -> Self {
        self.insight = insight.to_string();
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }
}

/// One row of a financial table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub department: String,
    pub category: String,
    /// Budgeted amount; also the weight for driver averages.
    pub baseline: f64,
    #[serde(default)]
    pub actual: f64,
    /// Alert threshold in percent.
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub scenarios: BTreeMap<Scenario, ScenarioValue>,
}

impl LineItem {
    pub fn new(department: &str, category: &str, baseline: f64) -> Self {
        Self {
            department: department.to_string(),
            category: category.to_string(),
            baseline,
            actual: 0.0,
            threshold: 0.0,
            scenarios: BTreeMap::new(),
        }
    }

    pub fn with_actual(mut self, actual: f64) -> Self {
        self.actual = actual;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_scenario(mut self, scenario: Scenario, value: ScenarioValue) -> Self {
        self.scenarios.insert(scenario, value);
        self
    }

    /// Value under `scenario`, or the zero fallback when absent.
    pub fn value(&self, scenario: Scenario) -> &ScenarioValue {
        self.scenarios.get(&scenario).unwrap_or(&FALLBACK_VALUE)
    }

    /// Natural key used to match imported rows.
    pub fn key(&self) -> (&str, &str) {
        (self.department.as_str(), self.category.as_str())
    }
}

/// Free-text narrative per scenario.
pub type Assumptions = BTreeMap<Scenario, String>;

/// Permissive numeric parse for form input: anything unparseable or
/// non-finite becomes `0`. Thousands separators and a trailing `%` are allowed.
pub fn coerce_number(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .trim_end_matches('%')
        .chars()
        .filter(|c| *c != ',' && *c != '_')
        .collect();
    match cleaned.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}
