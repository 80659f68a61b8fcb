//! `{labels, datasets}` projections for the charting collaborator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::alert::{AlertTier, TierMode};
use crate::config::GroupBy;
use crate::model::{LineItem, Scenario};
use crate::totals::{GroupTotals, Totals};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Budgeted,
    Actual,
    Suggested,
    Adjusted,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Budgeted => "Budgeted",
            Metric::Actual => "Actual",
            Metric::Suggested => "Suggested",
            Metric::Adjusted => "Adjusted",
        }
    }

    fn of_group(&self, g: &GroupTotals) -> f64 {
        match self {
            Metric::Budgeted => g.budgeted,
            Metric::Actual => g.actual,
            Metric::Suggested => g.suggested,
            Metric::Adjusted => g.adjusted,
        }
    }

    fn of_totals(&self, t: &Totals) -> f64 {
        match self {
            Metric::Budgeted => t.budgeted,
            Metric::Actual => t.actual,
            Metric::Suggested => t.suggested,
            Metric::Adjusted => t.adjusted,
        }
    }
}

/// One label per group, one dataset per metric.
pub fn grouped(totals: &Totals, by: GroupBy, metrics: &[Metric]) -> ChartData {
    let groups = totals.groups(by);
    ChartData {
        labels: groups.keys().cloned().collect(),
        datasets: metrics
            .iter()
            .map(|m| Dataset {
                label: m.label().to_string(),
                data: groups.values().map(|g| m.of_group(g)).collect(),
            })
            .collect(),
    }
}

/// One label per scenario (in `order`), one dataset per metric. Scenarios
/// without totals chart as zero.
pub fn scenario_comparison(
    totals: &BTreeMap<Scenario, Totals>,
    order: &[Scenario],
    metrics: &[Metric],
) -> ChartData {
    let zero = Totals::default();
    ChartData {
        labels: order.iter().map(|s| s.label().to_string()).collect(),
        datasets: metrics
            .iter()
            .map(|m| Dataset {
                label: m.label().to_string(),
                data: order
                    .iter()
                    .map(|s| m.of_totals(totals.get(s).unwrap_or(&zero)))
                    .collect(),
            })
            .collect(),
    }
}

/// One label per line item; a baseline dataset followed by the adjusted
/// value under each scenario.
pub fn line_series(items: &[LineItem], scenarios: &[Scenario]) -> ChartData {
    let mut datasets = vec![Dataset {
        label: "Baseline budget".to_string(),
        data: items.iter().map(|i| i.baseline).collect(),
    }];
    datasets.extend(scenarios.iter().map(|s| Dataset {
        label: s.label().to_string(),
        data: items.iter().map(|i| i.value(*s).adjusted).collect(),
    }));
    ChartData {
        labels: items
            .iter()
            .map(|i| format!("{} / {}", i.department, i.category))
            .collect(),
        datasets,
    }
}

/// Line counts per alert tier, most severe first.
pub fn tier_breakdown(totals: &Totals, mode: TierMode) -> ChartData {
    let tiers: &[AlertTier] = match mode {
        TierMode::ThreeTier => &[AlertTier::High, AlertTier::Low, AlertTier::None],
        TierMode::FourTier => &[AlertTier::High, AlertTier::Medium, AlertTier::Low, AlertTier::None],
    };
    ChartData {
        labels: tiers.iter().map(|t| t.as_str().to_string()).collect(),
        datasets: vec![Dataset {
            label: "Lines".to_string(),
            data: tiers.iter().map(|t| totals.tiers.get(*t) as f64).collect(),
        }],
    }
}
