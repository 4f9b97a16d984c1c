//! Retention reporting: churn breakdowns, revenue lost to churn, and the
//! at-risk high-value customer list over the analytical table.

pub mod churn;
pub mod dashboard;
pub mod revenue;

pub use churn::{ChurnAnalyzer, ChurnRate, TenureBucket};
pub use dashboard::{DashboardOverview, RetentionDashboard, DEFAULT_TOP_AT_RISK};
pub use revenue::{revenue_lost_to_churn, top_at_risk_high_value, AtRiskCustomer, RevenueLoss};
