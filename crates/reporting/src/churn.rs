//! Churn rate breakdowns over the analytical table.

use retention_core::types::AnalyticalRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnRate {
    pub group: String,
    pub customers: u64,
    pub churned: u64,
    pub churn_rate: f64,
}

impl ChurnRate {
    fn from_counts(group: String, customers: u64, churned: u64) -> Self {
        Self {
            group,
            customers,
            churned,
            churn_rate: if customers > 0 {
                churned as f64 / customers as f64
            } else {
                0.0
            },
        }
    }
}

/// Tenure ranges used by the tenure breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenureBucket {
    UnderSixMonths,
    SixToElevenMonths,
    OneToTwoYears,
    TwoToFourYears,
    FourYearsPlus,
}

impl TenureBucket {
    pub fn from_months(months: u32) -> Self {
        match months {
            0..=5 => TenureBucket::UnderSixMonths,
            6..=11 => TenureBucket::SixToElevenMonths,
            12..=23 => TenureBucket::OneToTwoYears,
            24..=47 => TenureBucket::TwoToFourYears,
            _ => TenureBucket::FourYearsPlus,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TenureBucket::UnderSixMonths => "0-5",
            TenureBucket::SixToElevenMonths => "6-11",
            TenureBucket::OneToTwoYears => "12-23",
            TenureBucket::TwoToFourYears => "24-47",
            TenureBucket::FourYearsPlus => "48+",
        }
    }
}

pub struct ChurnAnalyzer<'a> {
    records: &'a [AnalyticalRecord],
}

impl<'a> ChurnAnalyzer<'a> {
    pub fn new(records: &'a [AnalyticalRecord]) -> Self {
        Self { records }
    }

    pub fn overall(&self) -> ChurnRate {
        let churned = self.records.iter().filter(|r| r.churn.is_churned()).count();
        ChurnRate::from_counts("all".to_string(), self.records.len() as u64, churned as u64)
    }

    pub fn by_customer_segment(&self) -> Vec<ChurnRate> {
        self.grouped(|r| r.customer_segment, |k| k.to_string())
    }

    pub fn by_state(&self) -> Vec<ChurnRate> {
        self.grouped(|r| r.state.clone(), |k| k.clone())
    }

    pub fn by_city(&self) -> Vec<ChurnRate> {
        self.grouped(|r| (r.state.clone(), r.city.clone()), |(s, c)| format!("{c}, {s}"))
    }

    pub fn by_revenue_segment(&self) -> Vec<ChurnRate> {
        self.grouped(|r| r.revenue_segment, |k| k.to_string())
    }

    pub fn by_usage_category(&self) -> Vec<ChurnRate> {
        self.grouped(|r| r.usage_category, |k| k.to_string())
    }

    pub fn by_tenure_bucket(&self) -> Vec<ChurnRate> {
        self.grouped(
            |r| TenureBucket::from_months(r.tenure_months),
            |k| k.label().to_string(),
        )
    }

    /// One row per observed key, ordered by key.
    fn grouped<K, F, L>(&self, key: F, label: L) -> Vec<ChurnRate>
    where
        K: Ord,
        F: Fn(&AnalyticalRecord) -> K,
        L: Fn(&K) -> String,
    {
        let mut groups: BTreeMap<K, (u64, u64)> = BTreeMap::new();
        for record in self.records {
            let entry = groups.entry(key(record)).or_default();
            entry.0 += 1;
            if record.churn.is_churned() {
                entry.1 += 1;
            }
        }
        groups
            .iter()
            .map(|(k, (customers, churned))| ChurnRate::from_counts(label(k), *customers, *churned))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::analytical;
    use retention_core::types::{Churn, CustomerSegment};

    #[test]
    fn test_overall_rate() {
        let records = vec![
            analytical("a", Churn::Churned, 3, 60_000.0, "Delhi"),
            analytical("b", Churn::Active, 12, 30_000.0, "Delhi"),
            analytical("c", Churn::Active, 40, 10_000.0, "Goa"),
            analytical("d", Churn::Churned, 50, 25_000.0, "Goa"),
        ];
        let overall = ChurnAnalyzer::new(&records).overall();
        assert_eq!(overall.customers, 4);
        assert_eq!(overall.churned, 2);
        assert!((overall.churn_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_input_has_zero_rate() {
        let overall = ChurnAnalyzer::new(&[]).overall();
        assert_eq!(overall.customers, 0);
        assert_eq!(overall.churn_rate, 0.0);
        assert!(ChurnAnalyzer::new(&[]).by_state().is_empty());
    }

    #[test]
    fn test_by_state_sorted_by_name() {
        let records = vec![
            analytical("a", Churn::Churned, 3, 60_000.0, "Kerala"),
            analytical("b", Churn::Active, 12, 30_000.0, "Assam"),
            analytical("c", Churn::Active, 40, 10_000.0, "Kerala"),
        ];
        let rates = ChurnAnalyzer::new(&records).by_state();
        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].group, "Assam");
        assert_eq!(rates[0].churn_rate, 0.0);
        assert_eq!(rates[1].group, "Kerala");
        assert!((rates[1].churn_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_by_customer_segment_labels() {
        let records = vec![
            analytical("a", Churn::Churned, 3, 60_000.0, "Delhi"),
            analytical("b", Churn::Active, 2, 30_000.0, "Delhi"),
        ];
        let rates = ChurnAnalyzer::new(&records).by_customer_segment();
        assert_eq!(rates[0].group, CustomerSegment::Churned.to_string());
        assert_eq!(rates[0].churn_rate, 1.0);
        assert_eq!(rates[1].group, "New Customer");
    }

    #[test]
    fn test_tenure_buckets() {
        assert_eq!(TenureBucket::from_months(0), TenureBucket::UnderSixMonths);
        assert_eq!(TenureBucket::from_months(5), TenureBucket::UnderSixMonths);
        assert_eq!(TenureBucket::from_months(6), TenureBucket::SixToElevenMonths);
        assert_eq!(TenureBucket::from_months(23), TenureBucket::OneToTwoYears);
        assert_eq!(TenureBucket::from_months(24), TenureBucket::TwoToFourYears);
        assert_eq!(TenureBucket::from_months(48), TenureBucket::FourYearsPlus);

        let records = vec![
            analytical("a", Churn::Churned, 50, 60_000.0, "Delhi"),
            analytical("b", Churn::Active, 2, 30_000.0, "Delhi"),
        ];
        let rates = ChurnAnalyzer::new(&records).by_tenure_bucket();
        let labels: Vec<_> = rates.iter().map(|r| r.group.as_str()).collect();
        assert_eq!(labels, vec!["0-5", "48+"]);
    }
}
