//! Append-only history of saved planning states.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PlanError, PlanResult};
use crate::logging::{log_version_saved, ProfileScope};
use crate::model::{Assumptions, LineItem, Scenario};
use crate::totals::{Totals, TotalsCalculator};

/// Immutable copy of the store at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub id: u64,
    pub period: String,
    pub saved_at: DateTime<Utc>,
    pub line_items: Vec<LineItem>,
    /// Totals for every scenario declared at save time.
    pub totals: BTreeMap<Scenario, Totals>,
    pub assumptions: Assumptions,
    /// SHA-256 over line items and assumptions.
    pub fingerprint: String,
}

impl VersionSnapshot {
    /// Saved totals for `scenario`, all-zero when none were recorded.
    pub fn totals_for(&self, scenario: Scenario) -> Totals {
        self.totals.get(&scenario).cloned().unwrap_or_default()
    }
}

/// Copies handed back by [`VersionHistory::restore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Restored {
    pub line_items: Vec<LineItem>,
    pub assumptions: Assumptions,
}

/// Hex SHA-256 of the serialized state.
pub fn fingerprint(items: &[LineItem], assumptions: &Assumptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(items).unwrap_or_default());
    hasher.update(serde_json::to_vec(assumptions).unwrap_or_default());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Default)]
pub struct VersionHistory {
    entries: Vec<VersionSnapshot>,
    next_id: u64,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(
        &mut self,
        period: &str,
        items: &[LineItem],
        assumptions: &Assumptions,
        scenarios: &[Scenario],
        calculator: &TotalsCalculator,
    ) -> &VersionSnapshot {
        let _scope = ProfileScope::new("version_save");
        let totals = scenarios
            .iter()
            .map(|sc| (*sc, calculator.compute(items, *sc)))
            .collect();
        self.next_id += 1;
        let snapshot = VersionSnapshot {
            id: self.next_id,
            period: period.to_string(),
            saved_at: Utc::now(),
            line_items: items.to_vec(),
            totals,
            assumptions: assumptions.clone(),
            fingerprint: fingerprint(items, assumptions),
        };
        log_version_saved(snapshot.id, period, items.len(), &snapshot.fingerprint);
        self.entries.push(snapshot);
        &self.entries[self.entries.len() - 1]
    }

    /// Deep copies of a snapshot's items and assumptions. History is unchanged.
    pub fn restore(&self, id: u64) -> PlanResult<Restored> {
        let snapshot = self.get(id).ok_or(PlanError::UnknownVersion(id))?;
        Ok(Restored {
            line_items: snapshot.line_items.clone(),
            assumptions: snapshot.assumptions.clone(),
        })
    }

    pub fn get(&self, id: u64) -> Option<&VersionSnapshot> {
        self.entries.iter().find(|s| s.id == id)
    }

    pub fn latest(&self) -> Option<&VersionSnapshot> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionSnapshot> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScenarioValue;

    fn items() -> Vec<LineItem> {
        vec![LineItem::new("Sales", "Commissions", 10_000.0)
            .with_actual(9_000.0)
            .with_scenario(Scenario::Baseline, ScenarioValue::new(5.0, 10_500.0))]
    }

    #[test]
    fn save_records_totals_for_every_scenario() {
        let mut history = VersionHistory::new();
        let snap = history.save(
            "2026-Q3",
            &items(),
            &Assumptions::new(),
            &[Scenario::Baseline, Scenario::WorstCase],
            &TotalsCalculator::default(),
        );
        assert_eq!(snap.id, 1);
        assert_eq!(snap.totals.len(), 2);
        assert_eq!(snap.totals_for(Scenario::Baseline).adjusted, 10_500.0);
        assert_eq!(snap.totals_for(Scenario::WorstCase).adjusted, 0.0);
        assert_eq!(snap.totals_for(Scenario::Aggressive), Totals::default());
    }

    #[test]
    fn ids_are_sequential_and_history_append_only() {
        let mut history = VersionHistory::new();
        let calc = TotalsCalculator::default();
        let a = Assumptions::new();
        history.save("p1", &items(), &a, &[Scenario::Baseline], &calc);
        history.save("p2", &[], &a, &[Scenario::Baseline], &calc);
        assert_eq!(history.len(), 2);
        assert_eq!(history.latest().map(|s| s.id), Some(2));
        assert_eq!(history.get(1).map(|s| s.period.as_str()), Some("p1"));

        let restored = history.restore(1).unwrap();
        assert_eq!(restored.line_items, items());
        assert_eq!(history.len(), 2);
        assert_eq!(history.restore(7), Err(PlanError::UnknownVersion(7)));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = Assumptions::new();
        let f1 = fingerprint(&items(), &a);
        assert_eq!(f1, fingerprint(&items(), &a));
        assert_eq!(f1.len(), 64);

        let mut changed = items();
        changed[0].actual += 1.0;
        assert_ne!(f1, fingerprint(&changed, &a));
    }
}
