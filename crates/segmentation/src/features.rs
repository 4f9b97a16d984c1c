//! Feature derivation: counter cleaning and the weighted usage score.

use retention_core::config::ScoringConfig;
use retention_core::types::{CustomerRecord, DerivedFeatures, UsageCounters};

/// Fixed scale (six decimal places) the usage score is rounded to before
/// classification, so a weighted sum that is exactly 75 compares as 75.
pub const USAGE_SCORE_SCALE: f64 = 1e6;

/// Why a usage counter was replaced with zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repair {
    Missing,
    Negative,
    NonFinite,
}

/// Per-counter record of what the clamp step changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClampReport {
    pub calls_made: Option<Repair>,
    pub sms_sent: Option<Repair>,
    pub data_used: Option<Repair>,
}

impl ClampReport {
    pub fn repaired_count(&self) -> u64 {
        [self.calls_made, self.sms_sent, self.data_used]
            .iter()
            .filter(|r| r.is_some())
            .count() as u64
    }

    pub fn is_clean(&self) -> bool {
        self.repaired_count() == 0
    }
}

/// Computes `usage_score` from a customer's usage counters.
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    weights: ScoringConfig,
}

impl FeatureDeriver {
    pub fn new(weights: &ScoringConfig) -> Self {
        Self {
            weights: weights.clone(),
        }
    }

    /// Clamp every counter to `>= 0`; null and non-finite values become 0.
    pub fn clamp(record: &CustomerRecord) -> (UsageCounters, ClampReport) {
        let (calls_made, calls_repair) = clamp_count(record.calls_made);
        let (sms_sent, sms_repair) = clamp_count(record.sms_sent);
        let (data_used, data_repair) = clamp_volume(record.data_used);

        (
            UsageCounters {
                calls_made,
                sms_sent,
                data_used,
            },
            ClampReport {
                calls_made: calls_repair,
                sms_sent: sms_repair,
                data_used: data_repair,
            },
        )
    }

    /// Weighted sum of the cleaned counters, rounded to [`USAGE_SCORE_SCALE`].
    pub fn usage_score(&self, usage: &UsageCounters) -> f64 {
        let raw = self.weights.calls_weight * usage.calls_made as f64
            + self.weights.sms_weight * usage.sms_sent as f64
            + self.weights.data_weight * usage.data_used;
        (raw * USAGE_SCORE_SCALE).round() / USAGE_SCORE_SCALE
    }

    /// Clamp, then score.
    pub fn derive(&self, record: &CustomerRecord) -> (DerivedFeatures, ClampReport) {
        let (usage, report) = Self::clamp(record);
        let usage_score = self.usage_score(&usage);
        (DerivedFeatures { usage, usage_score }, report)
    }
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

fn clamp_count(value: Option<i64>) -> (i64, Option<Repair>) {
    match value {
        None => (0, Some(Repair::Missing)),
        Some(v) if v < 0 => (0, Some(Repair::Negative)),
        Some(v) => (v, None),
    }
}

fn clamp_volume(value: Option<f64>) -> (f64, Option<Repair>) {
    match value {
        None => (0.0, Some(Repair::Missing)),
        Some(v) if !v.is_finite() => (0.0, Some(Repair::NonFinite)),
        Some(v) if v < 0.0 => (0.0, Some(Repair::Negative)),
        // -0.0 is normalized so output bytes do not depend on the sign bit
        Some(v) if v == 0.0 => (0.0, None),
        Some(v) => (v, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retention_core::types::Churn;

    fn record(calls: Option<i64>, sms: Option<i64>, data: Option<f64>) -> CustomerRecord {
        CustomerRecord {
            customer_id: "c-1".to_string(),
            telecom_partner: "Airtel".to_string(),
            gender: "F".to_string(),
            age: 34,
            state: "Karnataka".to_string(),
            city: "Bangalore".to_string(),
            pincode: "560001".to_string(),
            date_of_registration: None,
            tenure_months: 12,
            num_dependents: 1,
            estimated_salary: Some(40_000.0),
            calls_made: calls,
            sms_sent: sms,
            data_used: data,
            churn: Churn::Active,
        }
    }

    #[test]
    fn test_weighted_usage_score() {
        let deriver = FeatureDeriver::default();
        let (features, report) = deriver.derive(&record(Some(100), Some(50), Some(10.0)));
        assert!((features.usage_score - 36.5).abs() < 1e-9);
        assert!(report.is_clean());
    }

    #[test]
    fn test_negative_counters_clamped_before_scoring() {
        let deriver = FeatureDeriver::default();
        let (features, report) = deriver.derive(&record(Some(-20), Some(40), Some(-3.5)));
        assert_eq!(features.usage.calls_made, 0);
        assert_eq!(features.usage.sms_sent, 40);
        assert_eq!(features.usage.data_used, 0.0);
        assert!((features.usage_score - 4.0).abs() < 1e-9);
        assert_eq!(report.calls_made, Some(Repair::Negative));
        assert_eq!(report.data_used, Some(Repair::Negative));
        assert_eq!(report.repaired_count(), 2);
    }

    #[test]
    fn test_missing_counters_score_as_zero() {
        let deriver = FeatureDeriver::default();
        let (features, report) = deriver.derive(&record(None, None, None));
        assert_eq!(features.usage_score, 0.0);
        assert_eq!(report.repaired_count(), 3);
        assert_eq!(report.sms_sent, Some(Repair::Missing));
    }

    #[test]
    fn test_non_finite_data_zeroed() {
        let (usage, report) = FeatureDeriver::clamp(&record(Some(1), Some(1), Some(f64::NAN)));
        assert_eq!(usage.data_used, 0.0);
        assert_eq!(report.data_used, Some(Repair::NonFinite));

        let (usage, _) = FeatureDeriver::clamp(&record(Some(1), Some(1), Some(f64::INFINITY)));
        assert_eq!(usage.data_used, 0.0);
    }

    #[test]
    fn test_negative_zero_normalized() {
        let (usage, report) = FeatureDeriver::clamp(&record(Some(0), Some(0), Some(-0.0)));
        assert!(usage.data_used.is_sign_positive());
        assert!(report.is_clean());
    }

    #[test]
    fn test_score_lands_exactly_on_thresholds() {
        let deriver = FeatureDeriver::default();
        let (features, _) = deriver.derive(&record(Some(0), Some(9), Some(114.0)));
        assert_eq!(features.usage_score, 75.0);

        let (features, _) = deriver.derive(&record(Some(0), Some(1), Some(46.0)));
        assert_eq!(features.usage_score, 30.0);
    }

    #[test]
    fn test_custom_weights() {
        let deriver = FeatureDeriver::new(&ScoringConfig {
            calls_weight: 1.0,
            sms_weight: 0.0,
            data_weight: 2.0,
        });
        let (features, _) = deriver.derive(&record(Some(10), Some(999), Some(5.0)));
        assert!((features.usage_score - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_never_negative() {
        let deriver = FeatureDeriver::default();
        for (calls, sms, data) in [
            (Some(i64::MIN), Some(-1), Some(f64::NEG_INFINITY)),
            (Some(-5), None, Some(-0.01)),
            (None, Some(-100), Some(f64::MIN)),
        ] {
            let (features, _) = deriver.derive(&record(calls, sms, data));
            assert!(features.usage_score >= 0.0);
        }
    }
}
