//! Scenario planning core for FP&A dashboards: line items with per-scenario
//! values, pure totals, variance alert tiers, and a restorable version log.

pub mod alert;
pub mod chart;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod seed;
pub mod store;
pub mod tabular;
pub mod totals;
pub mod version;

pub use alert::{AlertClassifier, AlertTier, TierMode};
pub use config::{Config, GroupBy, VarianceBasis};
pub use error::{PlanError, PlanResult};
pub use model::{Assumptions, LineItem, Scenario, ScenarioValue};
pub use store::{Field, ScenarioStore};
pub use totals::{variance_pct, LineReport, Totals, TotalsCalculator};
pub use version::{VersionHistory, VersionSnapshot};
