//! Variance alert tiers.
//!
//! Rules are ordered, first match wins, all comparisons strict:
//! 1. `|v| > threshold` is HIGH (four-tier: HIGH above `2×threshold`, else MEDIUM)
//! 2. `|v| > threshold/2` is LOW
//! 3. otherwise NONE

use serde::{Deserialize, Serialize};

/// Severity tier, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTier {
    None,
    Low,
    Medium,
    High,
}

impl AlertTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertTier::None => "none",
            AlertTier::Low => "low",
            AlertTier::Medium => "medium",
            AlertTier::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierMode {
    /// HIGH / LOW / NONE
    ThreeTier,
    /// HIGH / MEDIUM / LOW / NONE
    FourTier,
}

#[derive(Debug, Clone, Copy)]
pub struct AlertClassifier {
    mode: TierMode,
}

impl AlertClassifier {
    pub fn new(mode: TierMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TierMode {
        self.mode
    }

    pub fn classify(&self, variance_pct: f64, threshold: f64) -> AlertTier {
        let magnitude = variance_pct.abs();
        if magnitude > threshold {
            match self.mode {
                TierMode::ThreeTier => AlertTier::High,
                TierMode::FourTier if magnitude > 2.0 * threshold => AlertTier::High,
                TierMode::FourTier => AlertTier::Medium,
            }
        } else if magnitude > threshold / 2.0 {
            AlertTier::Low
        } else {
            AlertTier::None
        }
    }
}

impl Default for AlertClassifier {
    fn default() -> Self {
        Self::new(TierMode::ThreeTier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_tier_boundaries_are_strict() {
        let c = AlertClassifier::new(TierMode::ThreeTier);
        assert_eq!(c.classify(2.5, 5.0), AlertTier::None);
        assert_eq!(c.classify(2.51, 5.0), AlertTier::Low);
        assert_eq!(c.classify(5.0, 5.0), AlertTier::Low);
        assert_eq!(c.classify(5.01, 5.0), AlertTier::High);
        assert_eq!(c.classify(50.0, 5.0), AlertTier::High);
    }

    #[test]
    fn four_tier_splits_high_band() {
        let c = AlertClassifier::new(TierMode::FourTier);
        assert_eq!(c.classify(4.0, 5.0), AlertTier::Low);
        assert_eq!(c.classify(7.0, 5.0), AlertTier::Medium);
        assert_eq!(c.classify(10.0, 5.0), AlertTier::Medium);
        assert_eq!(c.classify(10.5, 5.0), AlertTier::High);
    }

    #[test]
    fn negative_variance_uses_magnitude() {
        let c = AlertClassifier::default();
        assert_eq!(c.classify(-6.0, 5.0), AlertTier::High);
        assert_eq!(c.classify(-3.0, 5.0), AlertTier::Low);
    }

    #[test]
    fn zero_threshold_flags_any_variance() {
        let c = AlertClassifier::default();
        assert_eq!(c.classify(0.0, 0.0), AlertTier::None);
        assert_eq!(c.classify(0.1, 0.0), AlertTier::High);
    }

    #[test]
    fn tiers_are_ordered_by_severity() {
        assert!(AlertTier::None < AlertTier::Low);
        assert!(AlertTier::Low < AlertTier::Medium);
        assert!(AlertTier::Medium < AlertTier::High);
    }
}
