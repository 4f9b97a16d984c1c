//! Retention dashboard: every report bundled into one overview.

use chrono::{DateTime, Utc};
use retention_core::types::AnalyticalRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::churn::{ChurnAnalyzer, ChurnRate};
use crate::revenue::{revenue_lost_to_churn, top_at_risk_high_value, AtRiskCustomer, RevenueLoss};

pub const DEFAULT_TOP_AT_RISK: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardOverview {
    pub total_customers: u64,
    pub overall: ChurnRate,
    pub by_customer_segment: Vec<ChurnRate>,
    pub by_state: Vec<ChurnRate>,
    pub by_city: Vec<ChurnRate>,
    pub by_revenue_segment: Vec<ChurnRate>,
    pub by_usage_category: Vec<ChurnRate>,
    pub by_tenure: Vec<ChurnRate>,
    pub revenue_loss: RevenueLoss,
    pub top_at_risk_high_value: Vec<AtRiskCustomer>,
    pub generated_at: DateTime<Utc>,
}

pub struct RetentionDashboard<'a> {
    records: &'a [AnalyticalRecord],
    top_at_risk: usize,
}

impl<'a> RetentionDashboard<'a> {
    pub fn new(records: &'a [AnalyticalRecord]) -> Self {
        Self {
            records,
            top_at_risk: DEFAULT_TOP_AT_RISK,
        }
    }

    pub fn with_top_at_risk(mut self, limit: usize) -> Self {
        self.top_at_risk = limit;
        self
    }

    pub fn get_overview(&self) -> DashboardOverview {
        let churn = ChurnAnalyzer::new(self.records);
        debug!(records = self.records.len(), "Building retention dashboard");

        DashboardOverview {
            total_customers: self.records.len() as u64,
            overall: churn.overall(),
            by_customer_segment: churn.by_customer_segment(),
            by_state: churn.by_state(),
            by_city: churn.by_city(),
            by_revenue_segment: churn.by_revenue_segment(),
            by_usage_category: churn.by_usage_category(),
            by_tenure: churn.by_tenure_bucket(),
            revenue_loss: revenue_lost_to_churn(self.records),
            top_at_risk_high_value: top_at_risk_high_value(self.records, self.top_at_risk),
            generated_at: Utc::now(),
        }
    }
}
