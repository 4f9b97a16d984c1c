use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{RetentionError, RetentionResult};

/// Churn outcome as recorded at ingestion. Serialized as `0` / `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Churn {
    Active,
    Churned,
}

impl Churn {
    pub fn is_churned(self) -> bool {
        matches!(self, Churn::Churned)
    }
}

impl TryFrom<u8> for Churn {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Churn::Active),
            1 => Ok(Churn::Churned),
            other => Err(format!("churn must be 0 or 1, got {other}")),
        }
    }
}

impl From<Churn> for u8 {
    fn from(churn: Churn) -> Self {
        match churn {
            Churn::Active => 0,
            Churn::Churned => 1,
        }
    }
}

/// One raw customer row as delivered by the bulk loader.
///
/// Usage counters and salary are optional because the source extract carries
/// nulls; the feature deriver decides what a null means.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_id: String,
    #[serde(default)]
    pub telecom_partner: String,
    #[serde(default)]
    pub gender: String,
    pub age: u32,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub city: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub pincode: String,
    #[serde(default)]
    pub date_of_registration: Option<NaiveDate>,
    pub tenure_months: u32,
    #[serde(default)]
    pub num_dependents: u32,
    #[serde(default)]
    pub estimated_salary: Option<f64>,
    #[serde(default)]
    pub calls_made: Option<i64>,
    #[serde(default)]
    pub sms_sent: Option<i64>,
    #[serde(default)]
    pub data_used: Option<f64>,
    pub churn: Churn,
}

impl CustomerRecord {
    /// Identity checks that serde cannot express.
    pub fn validate(&self) -> RetentionResult<()> {
        if self.customer_id.trim().is_empty() {
            return Err(RetentionError::Validation {
                customer_id: self.customer_id.clone(),
                message: "customer_id must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// New version of this record carrying the cleaned usage counters.
    pub fn with_usage(&self, usage: &UsageCounters) -> CustomerRecord {
        CustomerRecord {
            calls_made: Some(usage.calls_made),
            sms_sent: Some(usage.sms_sent),
            data_used: Some(usage.data_used),
            ..self.clone()
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Text(s)) => s,
        Some(Raw::Int(n)) => n.to_string(),
        Some(Raw::Float(f)) => f.to_string(),
        None => String::new(),
    })
}

/// Usage counters after the clamp step: every value is finite and `>= 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub calls_made: i64,
    pub sms_sent: i64,
    pub data_used: f64,
}

/// Engineered features for one customer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    pub usage: UsageCounters,
    pub usage_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RevenueSegment {
    #[serde(rename = "Low Income")]
    LowIncome,
    #[serde(rename = "Middle Income")]
    MiddleIncome,
    #[serde(rename = "High Income")]
    HighIncome,
}

impl RevenueSegment {
    pub const ALL: [RevenueSegment; 3] = [
        RevenueSegment::LowIncome,
        RevenueSegment::MiddleIncome,
        RevenueSegment::HighIncome,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RevenueSegment::LowIncome => "Low Income",
            RevenueSegment::MiddleIncome => "Middle Income",
            RevenueSegment::HighIncome => "High Income",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UsageCategory {
    Low,
    Medium,
    High,
}

impl UsageCategory {
    pub const ALL: [UsageCategory; 3] =
        [UsageCategory::Low, UsageCategory::Medium, UsageCategory::High];

    pub fn as_str(self) -> &'static str {
        match self {
            UsageCategory::Low => "Low",
            UsageCategory::Medium => "Medium",
            UsageCategory::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CustomerSegment {
    #[serde(rename = "Churned Customer")]
    Churned,
    #[serde(rename = "New Customer")]
    New,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Loyal Customer")]
    Loyal,
}

impl CustomerSegment {
    pub const ALL: [CustomerSegment; 4] = [
        CustomerSegment::Churned,
        CustomerSegment::New,
        CustomerSegment::AtRisk,
        CustomerSegment::Loyal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CustomerSegment::Churned => "Churned Customer",
            CustomerSegment::New => "New Customer",
            CustomerSegment::AtRisk => "At Risk",
            CustomerSegment::Loyal => "Loyal Customer",
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        })*
    };
}

display_as_str!(RevenueSegment, UsageCategory, CustomerSegment);

/// The three labels assigned by the segmentation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segments {
    pub revenue_segment: RevenueSegment,
    pub usage_category: UsageCategory,
    pub customer_segment: CustomerSegment,
}

/// Row of the `customer_segmentation` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationRow {
    pub customer_id: String,
    pub churn: Churn,
    pub tenure_months: u32,
    pub revenue_segment: RevenueSegment,
    pub usage_score: f64,
    pub usage_category: UsageCategory,
    pub customer_segment: CustomerSegment,
}

/// Row of the denormalized `customer_analytics` table read by reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticalRecord {
    pub customer_id: String,
    pub customer_segment: CustomerSegment,
    pub usage_score: f64,
    pub usage_category: UsageCategory,
    pub revenue_segment: RevenueSegment,
    pub tenure_months: u32,
    pub gender: String,
    pub age: u32,
    pub state: String,
    pub city: String,
    pub estimated_salary: f64,
    pub churn: Churn,
    pub calls_made: i64,
    pub sms_sent: i64,
    pub data_used: f64,
}
