//! Pure aggregation of line items for one scenario.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::alert::{AlertClassifier, AlertTier};
use crate::config::{Config, GroupBy, VarianceBasis};
use crate::model::{LineItem, Scenario};

/// `(actual - budgeted) / budgeted * 100`, or 0 when nothing was budgeted.
pub fn variance_pct(budgeted: f64, actual: f64) -> f64 {
    if budgeted == 0.0 {
        return 0.0;
    }
    (actual - budgeted) / budgeted * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupTotals {
    pub budgeted: f64,
    pub actual: f64,
    pub suggested: f64,
    pub adjusted: f64,
    pub lines: usize,
}

impl GroupTotals {
    pub fn variance_pct(&self, basis: VarianceBasis) -> f64 {
        let compared = match basis {
            VarianceBasis::ActualVsBudget => self.actual,
            VarianceBasis::AdjustedVsBudget => self.adjusted,
        };
        variance_pct(self.budgeted, compared)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierCounts {
    pub none: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
}

impl TierCounts {
    pub fn record(&mut self, tier: AlertTier) {
        match tier {
            AlertTier::None => self.none += 1,
            AlertTier::Low => self.low += 1,
            AlertTier::Medium => self.medium += 1,
            AlertTier::High => self.high += 1,
        }
    }

    pub fn get(&self, tier: AlertTier) -> usize {
        match tier {
            AlertTier::None => self.none,
            AlertTier::Low => self.low,
            AlertTier::Medium => self.medium,
            AlertTier::High => self.high,
        }
    }

    /// Lines at LOW or above.
    pub fn flagged(&self) -> usize {
        self.low + self.medium + self.high
    }
}

/// Aggregate metrics for one scenario. `Totals::default()` is the all-zero
/// value returned for empty input and for missing snapshot entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub line_count: usize,
    pub budgeted: f64,
    pub actual: f64,
    pub suggested: f64,
    pub adjusted: f64,
    /// Compared figure (per variance basis) minus budgeted.
    pub variance: f64,
    pub variance_pct: f64,
    /// Driver percentage weighted by baseline.
    pub weighted_driver: f64,
    pub by_department: BTreeMap<String, GroupTotals>,
    pub by_category: BTreeMap<String, GroupTotals>,
    pub tiers: TierCounts,
}

impl Totals {
    pub fn groups(&self, by: GroupBy) -> &BTreeMap<String, GroupTotals> {
        match by {
            GroupBy::Department => &self.by_department,
            GroupBy::Category => &self.by_category,
        }
    }
}

/// Per-line variance and tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineReport {
    pub index: usize,
    pub department: String,
    pub category: String,
    pub budgeted: f64,
    pub compared: f64,
    pub variance: f64,
    pub variance_pct: f64,
    pub threshold: f64,
    pub tier: AlertTier,
}

#[derive(Debug, Clone, Copy)]
pub struct TotalsCalculator {
    classifier: AlertClassifier,
    basis: VarianceBasis,
    default_threshold: f64,
}

impl TotalsCalculator {
    pub fn new(classifier: AlertClassifier, basis: VarianceBasis, default_threshold: f64) -> Self {
        Self {
            classifier,
            basis,
            default_threshold,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            AlertClassifier::new(cfg.tier_mode),
            cfg.variance_basis,
            cfg.default_threshold_pct,
        )
    }

    pub fn basis(&self) -> VarianceBasis {
        self.basis
    }

    /// Threshold applied to `item`: its own when positive, else the default.
    pub fn threshold_for(&self, item: &LineItem) -> f64 {
        if item.threshold > 0.0 {
            item.threshold
        } else {
            self.default_threshold
        }
    }

    fn compared(&self, item: &LineItem, scenario: Scenario) -> f64 {
        match self.basis {
            VarianceBasis::ActualVsBudget => item.actual,
            VarianceBasis::AdjustedVsBudget => item.value(scenario).adjusted,
        }
    }

    pub fn analyze_line(&self, index: usize, item: &LineItem, scenario: Scenario) -> LineReport {
        let compared = self.compared(item, scenario);
        let pct = variance_pct(item.baseline, compared);
        let threshold = self.threshold_for(item);
        LineReport {
            index,
            department: item.department.clone(),
            category: item.category.clone(),
            budgeted: item.baseline,
            compared,
            variance: compared - item.baseline,
            variance_pct: pct,
            threshold,
            tier: self.classifier.classify(pct, threshold),
        }
    }

    pub fn line_reports(&self, items: &[LineItem], scenario: Scenario) -> Vec<LineReport> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.analyze_line(i, item, scenario))
            .collect()
    }

    pub fn compute(&self, items: &[LineItem], scenario: Scenario) -> Totals {
        let mut totals = Totals::default();
        let mut compared_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut weighted_sum = 0.0;
        // Shared driver across all lines, if any; keeps the uniform case exact.
        let mut uniform_driver: Option<f64> = None;
        let mut uniform = true;

        for (i, item) in items.iter().enumerate() {
            let value = item.value(scenario);
            totals.line_count += 1;
            totals.budgeted += item.baseline;
            totals.actual += item.actual;
            totals.suggested += value.suggested;
            totals.adjusted += value.adjusted;
            compared_sum += self.compared(item, scenario);

            weight_sum += item.baseline;
            weighted_sum += value.driver_pct * item.baseline;
            match uniform_driver {
                None => uniform_driver = Some(value.driver_pct),
                Some(d) if d != value.driver_pct => uniform = false,
                Some(_) => {}
            }

            for group in [
                totals.by_department.entry(item.department.clone()).or_default(),
                totals.by_category.entry(item.category.clone()).or_default(),
            ] {
                group.budgeted += item.baseline;
                group.actual += item.actual;
                group.suggested += value.suggested;
                group.adjusted += value.adjusted;
                group.lines += 1;
            }

            totals.tiers.record(self.analyze_line(i, item, scenario).tier);
        }

        totals.variance = compared_sum - totals.budgeted;
        totals.variance_pct = variance_pct(totals.budgeted, compared_sum);
        totals.weighted_driver = if weight_sum == 0.0 {
            0.0
        } else if let (true, Some(d)) = (uniform, uniform_driver) {
            d
        } else {
            weighted_sum / weight_sum
        };
        totals
    }
}

impl Default for TotalsCalculator {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
