//! Working copy of a page's line items, active scenario and assumptions.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{PlanError, PlanResult};
use crate::logging::{
    log, log_edit, log_version_restored, obj, v_num, v_str, Domain, Level, ProfileScope,
};
use crate::model::{coerce_number, Assumptions, LineItem, Scenario, ScenarioValue};
use crate::totals::{LineReport, Totals, TotalsCalculator};
use crate::version::{VersionHistory, VersionSnapshot};

/// Editable attribute of a line item or of one of its scenario values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Department,
    Category,
    Baseline,
    Actual,
    Threshold,
    DriverPct,
    Suggested,
    Adjusted,
    Tag,
    Justification,
    Insight,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Department => "department",
            Field::Category => "category",
            Field::Baseline => "baseline",
            Field::Actual => "actual",
            Field::Threshold => "threshold",
            Field::DriverPct => "driver_pct",
            Field::Suggested => "suggested",
            Field::Adjusted => "adjusted",
            Field::Tag => "tag",
            Field::Justification => "justification",
            Field::Insight => "insight",
        }
    }

    /// Whether the field lives on the per-scenario record.
    pub fn is_scenario_field(&self) -> bool {
        matches!(
            self,
            Field::DriverPct
                | Field::Suggested
                | Field::Adjusted
                | Field::Tag
                | Field::Justification
                | Field::Insight
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Field::Baseline
                | Field::Actual
                | Field::Threshold
                | Field::DriverPct
                | Field::Suggested
                | Field::Adjusted
        )
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.trim().to_lowercase().as_str() {
            "department" | "dept" => Field::Department,
            "category" | "expense" => Field::Category,
            "baseline" | "budget" | "budgeted" => Field::Baseline,
            "actual" => Field::Actual,
            "threshold" => Field::Threshold,
            "driver_pct" | "driver" | "growth_rate" => Field::DriverPct,
            "suggested" | "ai" | "ai_value" => Field::Suggested,
            "adjusted" | "user" | "override" => Field::Adjusted,
            "tag" => Field::Tag,
            "justification" => Field::Justification,
            "insight" => Field::Insight,
            _ => return Err(PlanError::UnknownField(s.to_string())),
        };
        Ok(field)
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioStore {
    items: Vec<LineItem>,
    scenarios: Vec<Scenario>,
    active: Scenario,
    assumptions: Assumptions,
    dirty: bool,
    config: Config,
    calculator: TotalsCalculator,
}

impl ScenarioStore {
    /// Builds a store owning `seed`. The first declared scenario starts
    /// active; an empty declaration falls back to `[Baseline]`.
    pub fn new(seed: Vec<LineItem>, scenarios: &[Scenario], config: Config) -> Self {
        let mut declared: Vec<Scenario> = Vec::with_capacity(scenarios.len());
        for sc in scenarios {
            if !declared.contains(sc) {
                declared.push(*sc);
            }
        }
        if declared.is_empty() {
            declared.push(Scenario::Baseline);
        }
        let calculator = TotalsCalculator::from_config(&config);
        log(
            Level::Debug,
            Domain::Store,
            "store_init",
            obj(&[
                ("lines", json!(seed.len())),
                (
                    "scenarios",
                    json!(declared.iter().map(|s| s.as_str()).collect::<Vec<_>>()),
                ),
            ]),
        );
        Self {
            items: seed,
            active: declared[0],
            scenarios: declared,
            assumptions: Assumptions::new(),
            dirty: false,
            config,
            calculator,
        }
    }

    pub fn with_assumptions(mut self, assumptions: Assumptions) -> Self {
        self.assumptions = assumptions;
        self
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<LineItem> {
        &mut self.items
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn calculator(&self) -> &TotalsCalculator {
        &self.calculator
    }

    pub fn active(&self) -> Scenario {
        self.active
    }

    pub fn is_declared(&self, scenario: Scenario) -> bool {
        self.scenarios.contains(&scenario)
    }

    fn ensure_declared(&self, scenario: Scenario) -> PlanResult<()> {
        if self.is_declared(scenario) {
            Ok(())
        } else {
            Err(PlanError::UndeclaredScenario(scenario.as_str().to_string()))
        }
    }

    pub fn set_active(&mut self, scenario: Scenario) -> PlanResult<()> {
        self.ensure_declared(scenario)?;
        self.active = scenario;
        log(
            Level::Debug,
            Domain::Store,
            "scenario_switch",
            obj(&[("scenario", v_str(scenario.as_str()))]),
        );
        Ok(())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn touch(&mut self) {
        self.dirty = true;
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    pub fn assumption(&self, scenario: Scenario) -> &str {
        self.assumptions.get(&scenario).map(String::as_str).unwrap_or("")
    }

    pub fn set_assumption(&mut self, scenario: Scenario, text: &str) -> PlanResult<()> {
        self.ensure_declared(scenario)?;
        self.assumptions.insert(scenario, text.to_string());
        self.dirty = true;
        Ok(())
    }

    /// Value of line `index` under `scenario`, zero fallback when absent.
    pub fn scenario_value(&self, index: usize, scenario: Scenario) -> PlanResult<&ScenarioValue> {
        Ok(self.line(index)?.value(scenario))
    }

    pub fn line(&self, index: usize) -> PlanResult<&LineItem> {
        let len = self.items.len();
        self.items.get(index).ok_or(PlanError::InvalidLine { index, len })
    }

    /// Index of the first line matching the natural key.
    pub fn find_line(&self, department: &str, category: &str) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.key() == (department, category))
    }

    pub fn add_line(&mut self, item: LineItem) -> usize {
        self.items.push(item);
        self.dirty = true;
        self.items.len() - 1
    }

    pub fn remove_line(&mut self, index: usize) -> PlanResult<LineItem> {
        self.line(index)?;
        self.dirty = true;
        Ok(self.items.remove(index))
    }

    /// Applies one form edit. `sub_key` selects the scenario for
    /// scenario-level fields and defaults to the active one. Numeric input
    /// that does not parse is stored as `0`.
    pub fn update(
        &mut self,
        index: usize,
        field: &str,
        value: &str,
        sub_key: Option<Scenario>,
    ) -> PlanResult<()> {
        let field: Field = field.parse()?;
        let scenario = sub_key.unwrap_or(self.active);
        if field.is_scenario_field() {
            self.ensure_declared(scenario)?;
        }
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(PlanError::InvalidLine { index, len })?;

        let number = if field.is_numeric() { coerce_number(value) } else { 0.0 };
        match field {
            Field::Department => item.department = value.to_string(),
            Field::Category => item.category = value.to_string(),
            Field::Actual => item.actual = number,
            Field::Threshold => item.threshold = number,
            Field::Baseline => {
                item.baseline = number;
                let declared = &self.scenarios;
                let config = &self.config;
                for (sc, sv) in item.scenarios.iter_mut() {
                    if declared.contains(sc) {
                        reseed(sv, number, config.multiplier(*sc));
                    }
                }
            }
            Field::DriverPct => {
                let baseline = item.baseline;
                let sv = item.scenarios.entry(scenario).or_default();
                sv.driver_pct = number;
                reseed(sv, baseline, self.config.multiplier(scenario));
            }
            Field::Suggested => item.scenarios.entry(scenario).or_default().suggested = number,
            Field::Adjusted => item.scenarios.entry(scenario).or_default().adjusted = number,
            Field::Tag => {
                let tag = value.trim();
                item.scenarios.entry(scenario).or_default().tag =
                    if tag.is_empty() { None } else { Some(tag.to_string()) };
            }
            Field::Justification => {
                item.scenarios.entry(scenario).or_default().justification = value.to_string()
            }
            Field::Insight => item.scenarios.entry(scenario).or_default().insight = value.to_string(),
        }

        self.dirty = true;
        log_edit(index, field.as_str(), scenario.as_str(), edit_value(field, value, number));
        Ok(())
    }

    /// Totals for the active scenario, recomputed from current state.
    pub fn totals(&self) -> Totals {
        self.totals_for(self.active)
    }

    pub fn totals_for(&self, scenario: Scenario) -> Totals {
        let _scope =
            ProfileScope::with_context("totals", &[("scenario", v_str(scenario.as_str()))]);
        let totals = self.calculator.compute(&self.items, scenario);
        log(
            Level::Trace,
            Domain::Totals,
            "totals_computed",
            obj(&[
                ("scenario", v_str(scenario.as_str())),
                ("lines", json!(totals.line_count)),
                ("flagged", json!(totals.tiers.flagged())),
            ]),
        );
        totals
    }

    pub fn line_reports(&self) -> Vec<LineReport> {
        self.calculator.line_reports(&self.items, self.active)
    }

    /// Snapshots the store into `history` and clears the unsaved flag.
    pub fn save_version<'h>(
        &mut self,
        history: &'h mut VersionHistory,
        period: &str,
    ) -> &'h VersionSnapshot {
        let snapshot = history.save(
            period,
            &self.items,
            &self.assumptions,
            &self.scenarios,
            &self.calculator,
        );
        self.dirty = false;
        snapshot
    }

    /// Replaces line items and assumptions with copies from `snapshot`.
    /// The unsaved flag is left for the caller to reset.
    pub fn restore(&mut self, snapshot: &VersionSnapshot) {
        self.items = snapshot.line_items.clone();
        self.assumptions = snapshot.assumptions.clone();
        log_version_restored(snapshot.id, &snapshot.fingerprint);
    }
}

/// Logged value of an edit: the stored number for numeric fields, the raw
/// text otherwise.
fn edit_value(field: Field, raw: &str, number: f64) -> Value {
    if field.is_numeric() {
        v_num(number)
    } else {
        v_str(raw)
    }
}

/// `suggested = baseline × (1 + driver/100) × multiplier`, then seed the
/// override from it.
pub(crate) fn reseed(sv: &mut ScenarioValue, baseline: f64, multiplier: f64) {
    sv.suggested = baseline * (1.0 + sv.driver_pct / 100.0) * multiplier;
    sv.adjusted = sv.suggested;
}
