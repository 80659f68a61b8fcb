//! Mock department budget used by the budgeting pages.
//!
//! Returned by value: every store gets its own copy.

use crate::model::{Assumptions, LineItem, Scenario, ScenarioValue};

pub const BUDGET_SCENARIOS: [Scenario; 3] =
    [Scenario::Baseline, Scenario::BestCase, Scenario::WorstCase];

type SeedRow = (&'static str, &'static str, f64, f64, f64, [f64; 3], &'static str);

// department, category, baseline, actual, threshold %, drivers per scenario, insight
const DEPARTMENT_ROWS: [SeedRow; 6] = [
    ("IT", "Software", 80_000.0, 82_000.0, 5.0, [3.0, 1.0, 8.0], "License true-up expected in Q4"),
    ("IT", "Hardware", 45_000.0, 39_500.0, 10.0, [0.0, -5.0, 6.0], "Laptop refresh deferred"),
    ("Marketing", "Digital Ads", 60_000.0, 71_000.0, 8.0, [12.0, 8.0, 20.0], "Campaign spend front-loaded"),
    ("Marketing", "Events", 25_000.0, 24_000.0, 10.0, [2.0, 0.0, 5.0], "Trade show costs stable"),
    ("Operations", "Facilities", 120_000.0, 121_500.0, 3.0, [1.5, 0.5, 4.0], "Lease escalator at 1.5%"),
    ("HR", "Training", 15_000.0, 9_000.0, 15.0, [5.0, 0.0, 10.0], "Training backlog building"),
];

pub fn department_budget() -> Vec<LineItem> {
    DEPARTMENT_ROWS
        .iter()
        .map(|(department, category, baseline, actual, threshold, drivers, insight)| {
            let mut item = LineItem::new(department, category, *baseline)
                .with_actual(*actual)
                .with_threshold(*threshold);
            for (scenario, driver) in BUDGET_SCENARIOS.iter().zip(drivers) {
                let suggested = baseline * (1.0 + driver / 100.0);
                item = item.with_scenario(
                    *scenario,
                    ScenarioValue::new(*driver, suggested).with_insight(insight),
                );
            }
            item
        })
        .collect()
}

pub fn department_assumptions() -> Assumptions {
    let mut a = Assumptions::new();
    a.insert(Scenario::Baseline, "Headcount flat, inflation at 3%".to_string());
    a.insert(Scenario::BestCase, "Vendor consolidation lands in Q2".to_string());
    a.insert(Scenario::WorstCase, "Price increases across SaaS vendors".to_string());
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_line_covers_every_scenario() {
        for item in department_budget() {
            for sc in BUDGET_SCENARIOS {
                assert!(item.scenarios.contains_key(&sc), "{} missing {:?}", item.category, sc);
            }
        }
    }

    #[test]
    fn natural_keys_are_unique() {
        let items = department_budget();
        let mut keys: Vec<_> = items.iter().map(|i| i.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), items.len());
    }
}
