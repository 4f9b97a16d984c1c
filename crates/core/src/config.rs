use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{RetentionError, RetentionResult};

/// Weight of `calls_made` in the usage score.
pub const DEFAULT_CALLS_WEIGHT: f64 = 0.25;
/// Weight of `sms_sent` in the usage score.
pub const DEFAULT_SMS_WEIGHT: f64 = 0.10;
/// Weight of `data_used` in the usage score.
pub const DEFAULT_DATA_WEIGHT: f64 = 0.65;

/// Salary below which a customer is Low Income.
pub const DEFAULT_REVENUE_LOW_THRESHOLD: f64 = 20_000.0;
/// Salary above which a customer is High Income.
pub const DEFAULT_REVENUE_HIGH_THRESHOLD: f64 = 50_000.0;
/// Usage score below which usage is Low.
pub const DEFAULT_USAGE_LOW_THRESHOLD: f64 = 30.0;
/// Usage score above which usage is High.
pub const DEFAULT_USAGE_HIGH_THRESHOLD: f64 = 75.0;
/// Tenure (months) below which an active customer is New.
pub const DEFAULT_NEW_CUSTOMER_TENURE_MONTHS: u32 = 6;
/// Usage score below which an established active customer is At Risk.
pub const DEFAULT_AT_RISK_USAGE_SCORE: f64 = 30.0;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `RETENTION__`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_calls_weight")]
    pub calls_weight: f64,
    #[serde(default = "default_sms_weight")]
    pub sms_weight: f64,
    #[serde(default = "default_data_weight")]
    pub data_weight: f64,
}

/// What to do with a salary that falls in no revenue band
/// (missing, negative or non-finite).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidSalaryPolicy {
    /// Fail the batch with an unclassifiable-record error.
    #[default]
    Reject,
    /// Treat the salary as 0 and route the customer to Low Income.
    LowIncome,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentationConfig {
    #[serde(default = "default_revenue_low_threshold")]
    pub revenue_low_threshold: f64,
    #[serde(default = "default_revenue_high_threshold")]
    pub revenue_high_threshold: f64,
    #[serde(default = "default_usage_low_threshold")]
    pub usage_low_threshold: f64,
    #[serde(default = "default_usage_high_threshold")]
    pub usage_high_threshold: f64,
    #[serde(default = "default_new_customer_tenure_months")]
    pub new_customer_tenure_months: u32,
    #[serde(default = "default_at_risk_usage_score")]
    pub at_risk_usage_score: f64,
    #[serde(default)]
    pub invalid_salary: InvalidSalaryPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Records per shard handed to one blocking worker.
    #[serde(default = "default_shard_size")]
    pub shard_size: usize,
    #[serde(default = "default_run_label")]
    pub run_label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickHouseConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_clickhouse_url")]
    pub url: String,
    #[serde(default = "default_clickhouse_db")]
    pub database: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

// Default functions
fn default_calls_weight() -> f64 {
    DEFAULT_CALLS_WEIGHT
}
fn default_sms_weight() -> f64 {
    DEFAULT_SMS_WEIGHT
}
fn default_data_weight() -> f64 {
    DEFAULT_DATA_WEIGHT
}
fn default_revenue_low_threshold() -> f64 {
    DEFAULT_REVENUE_LOW_THRESHOLD
}
fn default_revenue_high_threshold() -> f64 {
    DEFAULT_REVENUE_HIGH_THRESHOLD
}
fn default_usage_low_threshold() -> f64 {
    DEFAULT_USAGE_LOW_THRESHOLD
}
fn default_usage_high_threshold() -> f64 {
    DEFAULT_USAGE_HIGH_THRESHOLD
}
fn default_new_customer_tenure_months() -> u32 {
    DEFAULT_NEW_CUSTOMER_TENURE_MONTHS
}
fn default_at_risk_usage_score() -> f64 {
    DEFAULT_AT_RISK_USAGE_SCORE
}
fn default_shard_size() -> usize {
    10_000
}
fn default_run_label() -> String {
    "telecom-retention".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}
fn default_clickhouse_url() -> String {
    "http://localhost:8123".to_string()
}
fn default_clickhouse_db() -> String {
    "telecom_retention".to_string()
}
fn default_batch_size() -> usize {
    10_000
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            calls_weight: default_calls_weight(),
            sms_weight: default_sms_weight(),
            data_weight: default_data_weight(),
        }
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            revenue_low_threshold: default_revenue_low_threshold(),
            revenue_high_threshold: default_revenue_high_threshold(),
            usage_low_threshold: default_usage_low_threshold(),
            usage_high_threshold: default_usage_high_threshold(),
            new_customer_tenure_months: default_new_customer_tenure_months(),
            at_risk_usage_score: default_at_risk_usage_score(),
            invalid_salary: InvalidSalaryPolicy::default(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shard_size: default_shard_size(),
            run_label: default_run_label(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_clickhouse_url(),
            database: default_clickhouse_db(),
            batch_size: default_batch_size(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables (`RETENTION__SCORING__DATA_WEIGHT=0.7`), then validate.
    pub fn load(path: Option<&Path>) -> RetentionResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("RETENTION")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        info!(
            file = ?path,
            shard_size = config.pipeline.shard_size,
            invalid_salary = ?config.segmentation.invalid_salary,
            clickhouse = config.clickhouse.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn validate(&self) -> RetentionResult<()> {
        let weights = [
            ("scoring.calls_weight", self.scoring.calls_weight),
            ("scoring.sms_weight", self.scoring.sms_weight),
            ("scoring.data_weight", self.scoring.data_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RetentionError::Config(format!(
                    "{name} must be finite and non-negative, got {weight}"
                )));
            }
        }

        let seg = &self.segmentation;
        check_band(
            "segmentation.revenue",
            seg.revenue_low_threshold,
            seg.revenue_high_threshold,
        )?;
        check_band(
            "segmentation.usage",
            seg.usage_low_threshold,
            seg.usage_high_threshold,
        )?;
        if !seg.at_risk_usage_score.is_finite() {
            return Err(RetentionError::Config(
                "segmentation.at_risk_usage_score must be finite".to_string(),
            ));
        }

        if self.pipeline.shard_size == 0 {
            return Err(RetentionError::Config(
                "pipeline.shard_size must be greater than zero".to_string(),
            ));
        }
        if self.clickhouse.enabled && self.clickhouse.batch_size == 0 {
            return Err(RetentionError::Config(
                "clickhouse.batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_band(name: &str, low: f64, high: f64) -> RetentionResult<()> {
    if !low.is_finite() || !high.is_finite() || low > high {
        return Err(RetentionError::Config(format!(
            "{name} thresholds must be finite with low <= high, got [{low}, {high}]"
        )));
    }
    Ok(())
}
