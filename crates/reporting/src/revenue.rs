//! Revenue exposure: income lost to churn and the at-risk, high-value list.

use retention_core::types::{AnalyticalRecord, CustomerSegment, RevenueSegment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRevenueLoss {
    pub revenue_segment: RevenueSegment,
    pub churned_customers: u64,
    pub revenue_lost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevenueLoss {
    pub churned_customers: u64,
    /// Sum of `estimated_salary` over churned customers.
    pub total_revenue_lost: f64,
    pub by_revenue_segment: Vec<SegmentRevenueLoss>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtRiskCustomer {
    pub customer_id: String,
    pub estimated_salary: f64,
    pub usage_score: f64,
    pub usage_category: String,
    pub tenure_months: u32,
    pub state: String,
    pub city: String,
}

pub fn revenue_lost_to_churn(records: &[AnalyticalRecord]) -> RevenueLoss {
    let churned: Vec<&AnalyticalRecord> = records.iter().filter(|r| r.churn.is_churned()).collect();

    let by_revenue_segment = RevenueSegment::ALL
        .iter()
        .map(|segment| {
            let in_segment = churned.iter().filter(|r| r.revenue_segment == *segment);
            SegmentRevenueLoss {
                revenue_segment: *segment,
                churned_customers: in_segment.clone().count() as u64,
                revenue_lost: in_segment.map(|r| r.estimated_salary).sum(),
            }
        })
        .collect();

    RevenueLoss {
        churned_customers: churned.len() as u64,
        total_revenue_lost: churned.iter().map(|r| r.estimated_salary).sum(),
        by_revenue_segment,
    }
}

/// At Risk customers in the High Income tier, highest salary first.
/// Ties are broken by `customer_id` so the list is stable across runs.
pub fn top_at_risk_high_value(records: &[AnalyticalRecord], limit: usize) -> Vec<AtRiskCustomer> {
    let mut candidates: Vec<&AnalyticalRecord> = records
        .iter()
        .filter(|r| {
            r.customer_segment == CustomerSegment::AtRisk
                && r.revenue_segment == RevenueSegment::HighIncome
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.estimated_salary
            .total_cmp(&a.estimated_salary)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });

    candidates
        .into_iter()
        .take(limit)
        .map(|r| AtRiskCustomer {
            customer_id: r.customer_id.clone(),
            estimated_salary: r.estimated_salary,
            usage_score: r.usage_score,
            usage_category: r.usage_category.to_string(),
            tenure_months: r.tenure_months,
            state: r.state.clone(),
            city: r.city.clone(),
        })
        .collect()
}
