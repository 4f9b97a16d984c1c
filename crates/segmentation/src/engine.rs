//! Segmentation engine: revenue tier, usage tier and lifecycle segment.

use retention_core::config::{InvalidSalaryPolicy, SegmentationConfig};
use retention_core::types::{
    Churn, CustomerRecord, CustomerSegment, DerivedFeatures, RevenueSegment, Segments,
    UsageCategory,
};
use retention_core::{RetentionError, RetentionResult};
use tracing::debug;

use crate::bands::BandSet;

/// Output of [`SegmentationEngine::classify`] for one customer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub segments: Segments,
    /// Salary the revenue segment was computed from.
    pub estimated_salary: f64,
    /// Set when the invalid-salary policy substituted 0.
    pub salary_repaired: bool,
}

#[derive(Debug, Clone)]
pub struct SegmentationEngine {
    revenue: BandSet<RevenueSegment>,
    usage: BandSet<UsageCategory>,
    new_customer_tenure_months: u32,
    at_risk_usage_score: f64,
    invalid_salary: InvalidSalaryPolicy,
}

impl SegmentationEngine {
    pub fn new(config: &SegmentationConfig) -> Self {
        Self {
            revenue: BandSet::three_tier(
                config.revenue_low_threshold,
                config.revenue_high_threshold,
                RevenueSegment::ALL,
            ),
            usage: BandSet::three_tier(
                config.usage_low_threshold,
                config.usage_high_threshold,
                UsageCategory::ALL,
            ),
            new_customer_tenure_months: config.new_customer_tenure_months,
            at_risk_usage_score: config.at_risk_usage_score,
            invalid_salary: config.invalid_salary,
        }
    }

    /// Revenue tier for a salary. Missing, negative and non-finite salaries
    /// go through the configured policy.
    pub fn revenue_segment(
        &self,
        customer_id: &str,
        salary: Option<f64>,
    ) -> RetentionResult<(RevenueSegment, f64, bool)> {
        let invalid = match salary {
            None => Some("estimated_salary is missing".to_string()),
            Some(s) if !s.is_finite() => Some(format!("estimated_salary is not finite ({s})")),
            Some(s) if s < 0.0 => Some(format!("estimated_salary is negative ({s})")),
            Some(_) => None,
        };

        if let Some(detail) = invalid {
            return match self.invalid_salary {
                InvalidSalaryPolicy::Reject => Err(RetentionError::Unclassifiable {
                    customer_id: customer_id.to_string(),
                    stage: "revenue_segment",
                    detail,
                }),
                InvalidSalaryPolicy::LowIncome => {
                    debug!(customer_id, %detail, "Invalid salary routed to Low Income");
                    Ok((RevenueSegment::LowIncome, 0.0, true))
                }
            };
        }

        let salary = salary.unwrap_or_default();
        let segment = self
            .revenue
            .classify(salary)
            .ok_or_else(|| RetentionError::Unclassifiable {
                customer_id: customer_id.to_string(),
                stage: "revenue_segment",
                detail: format!("estimated_salary {salary} matches no band"),
            })?;
        Ok((segment, salary, false))
    }

    pub fn usage_category(&self, customer_id: &str, score: f64) -> RetentionResult<UsageCategory> {
        self.usage
            .classify(score)
            .ok_or_else(|| RetentionError::Unclassifiable {
                customer_id: customer_id.to_string(),
                stage: "usage_category",
                detail: format!("usage_score {score} matches no band"),
            })
    }

    /// Lifecycle segment. Rules are evaluated in priority order and the first
    /// match wins: churn, then tenure, then usage.
    pub fn customer_segment(&self, churn: Churn, tenure_months: u32, score: f64) -> CustomerSegment {
        if churn.is_churned() {
            CustomerSegment::Churned
        } else if tenure_months < self.new_customer_tenure_months {
            CustomerSegment::New
        } else if score < self.at_risk_usage_score {
            CustomerSegment::AtRisk
        } else {
            CustomerSegment::Loyal
        }
    }

    pub fn classify(
        &self,
        record: &CustomerRecord,
        features: &DerivedFeatures,
    ) -> RetentionResult<Classification> {
        let (revenue_segment, estimated_salary, salary_repaired) =
            self.revenue_segment(&record.customer_id, record.estimated_salary)?;
        let usage_category = self.usage_category(&record.customer_id, features.usage_score)?;
        let customer_segment =
            self.customer_segment(record.churn, record.tenure_months, features.usage_score);

        Ok(Classification {
            segments: Segments {
                revenue_segment,
                usage_category,
                customer_segment,
            },
            estimated_salary,
            salary_repaired,
        })
    }
}

impl Default for SegmentationEngine {
    fn default() -> Self {
        Self::new(&SegmentationConfig::default())
    }
}
