//! Derivation pipeline: clamp → score → segment → join, evaluated per record
//! and materialized as one batch.

use chrono::{DateTime, Utc};
use retention_core::config::AppConfig;
use retention_core::types::{AnalyticalRecord, CustomerRecord, CustomerSegment, SegmentationRow};
use retention_core::{RetentionError, RetentionResult};
use retention_segmentation::{ClampReport, FeatureDeriver, SegmentationEngine};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::builder::AnalyticalRecordBuilder;
use crate::store::InMemoryStore;

/// Everything derived for a single customer.
#[derive(Debug, Clone)]
pub struct RecordDerivation {
    /// New version of the raw record with clamped counters. Every other
    /// field, salary included, is carried over unchanged.
    pub cleaned: CustomerRecord,
    pub segmentation: SegmentationRow,
    pub clamp: ClampReport,
    /// Salary the invalid-salary policy substituted, if any.
    pub repaired_salary: Option<f64>,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub records: usize,
    pub records_clamped: u64,
    pub counters_clamped: u64,
    pub salaries_repaired: u64,
    pub segment_counts: BTreeMap<CustomerSegment, usize>,
}

/// Fully derived output of a run, not yet visible to readers.
#[derive(Debug, Clone)]
pub struct DerivationBatch {
    pub summary: RunSummary,
    pub cleaned: Vec<CustomerRecord>,
    pub segmentation: Vec<SegmentationRow>,
    pub analytics: Vec<AnalyticalRecord>,
}

pub struct Pipeline {
    deriver: FeatureDeriver,
    engine: SegmentationEngine,
    shard_size: usize,
    label: String,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            deriver: FeatureDeriver::new(&config.scoring),
            engine: SegmentationEngine::new(&config.segmentation),
            shard_size: config.pipeline.shard_size.max(1),
            label: config.pipeline.run_label.clone(),
        }
    }

    /// Derive one customer. Pure: depends only on the record and configuration.
    pub fn derive_record(&self, record: &CustomerRecord) -> RetentionResult<RecordDerivation> {
        let (features, clamp) = self.deriver.derive(record);
        let classification = self.engine.classify(record, &features)?;

        let cleaned = record.with_usage(&features.usage);

        let segmentation = SegmentationRow {
            customer_id: record.customer_id.clone(),
            churn: record.churn,
            tenure_months: record.tenure_months,
            revenue_segment: classification.segments.revenue_segment,
            usage_score: features.usage_score,
            usage_category: classification.segments.usage_category,
            customer_segment: classification.segments.customer_segment,
        };

        Ok(RecordDerivation {
            cleaned,
            segmentation,
            clamp,
            repaired_salary: classification
                .salary_repaired
                .then_some(classification.estimated_salary),
        })
    }

    fn derive_shard(&self, records: &[CustomerRecord]) -> RetentionResult<Vec<RecordDerivation>> {
        records.iter().map(|r| self.derive_record(r)).collect()
    }

    /// Derive a whole batch on the current thread.
    pub fn derive(&self, records: &[CustomerRecord]) -> RetentionResult<DerivationBatch> {
        let started_at = Utc::now();
        let derivations = self.derive_shard(records)?;
        self.assemble(started_at, records.len(), derivations)
    }

    /// Derive a batch with shards spread over the blocking thread pool.
    /// Output order matches input order.
    pub async fn derive_sharded(
        self: &Arc<Self>,
        records: Vec<CustomerRecord>,
    ) -> RetentionResult<DerivationBatch> {
        let started_at = Utc::now();
        let total = records.len();

        let handles: Vec<_> = records
            .chunks(self.shard_size)
            .map(|chunk| {
                let shard = chunk.to_vec();
                let pipeline = Arc::clone(self);
                tokio::task::spawn_blocking(move || pipeline.derive_shard(&shard))
            })
            .collect();
        debug!(shards = handles.len(), records = total, "Derivation shards spawned");

        let mut derivations = Vec::with_capacity(total);
        for handle in handles {
            let shard = handle
                .await
                .map_err(|e| RetentionError::Internal(anyhow::anyhow!("shard task failed: {e}")))??;
            derivations.extend(shard);
        }

        self.assemble(started_at, total, derivations)
    }

    fn assemble(
        &self,
        started_at: DateTime<Utc>,
        expected: usize,
        derivations: Vec<RecordDerivation>,
    ) -> RetentionResult<DerivationBatch> {
        AnalyticalRecordBuilder::check_row_counts(expected, derivations.len())?;

        let mut records_clamped = 0u64;
        let mut counters_clamped = 0u64;
        let mut salaries_repaired = 0u64;
        let mut segment_counts: BTreeMap<CustomerSegment, usize> = BTreeMap::new();
        let mut repaired_salaries: HashMap<String, f64> = HashMap::new();
        let mut cleaned = Vec::with_capacity(derivations.len());
        let mut segmentation = Vec::with_capacity(derivations.len());

        for d in derivations {
            if !d.clamp.is_clean() {
                records_clamped += 1;
                counters_clamped += d.clamp.repaired_count();
                debug!(customer_id = %d.cleaned.customer_id, clamp = ?d.clamp, "Usage counters clamped");
            }
            if let Some(salary) = d.repaired_salary {
                salaries_repaired += 1;
                warn!(customer_id = %d.cleaned.customer_id, "Invalid estimated_salary routed to Low Income");
                repaired_salaries.insert(d.cleaned.customer_id.clone(), salary);
            }
            *segment_counts.entry(d.segmentation.customer_segment).or_default() += 1;
            cleaned.push(d.cleaned);
            segmentation.push(d.segmentation);
        }

        let analytics = AnalyticalRecordBuilder::build_with_repairs(
            &cleaned,
            &segmentation,
            &repaired_salaries,
        )?;

        metrics::counter!("pipeline.counters_clamped").increment(counters_clamped);
        metrics::counter!("pipeline.salary_repaired").increment(salaries_repaired);

        Ok(DerivationBatch {
            summary: RunSummary {
                run_id: Uuid::new_v4(),
                label: self.label.clone(),
                started_at,
                finished_at: Utc::now(),
                records: analytics.len(),
                records_clamped,
                counters_clamped,
                salaries_repaired,
                segment_counts,
            },
            cleaned,
            segmentation,
            analytics,
        })
    }

    /// Read every raw record from the store, derive, and commit atomically.
    /// On error nothing is committed and the previous derived state stays visible.
    pub async fn run(self: &Arc<Self>, store: &InMemoryStore) -> RetentionResult<RunSummary> {
        let records = store.raw_records();
        info!(records = records.len(), label = %self.label, "Pipeline run started");

        let result = match self.derive_sharded(records).await {
            Ok(batch) => store.commit(batch),
            Err(e) => Err(e),
        };

        match result {
            Ok(summary) => {
                metrics::counter!("pipeline.runs_committed").increment(1);
                info!(
                    run_id = %summary.run_id,
                    records = summary.records,
                    records_clamped = summary.records_clamped,
                    salaries_repaired = summary.salaries_repaired,
                    "Pipeline run committed"
                );
                Ok(summary)
            }
            Err(e) => {
                metrics::counter!("pipeline.runs_failed").increment(1);
                error!(error = %e, stage = e.stage(), "Pipeline run aborted, nothing committed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retention_core::config::InvalidSalaryPolicy;
    use retention_core::types::{Churn, RevenueSegment, UsageCategory};

    fn record(id: &str, churn: Churn, tenure: u32, salary: Option<f64>) -> CustomerRecord {
        CustomerRecord {
            customer_id: id.to_string(),
            telecom_partner: "Airtel".to_string(),
            gender: "M".to_string(),
            age: 37,
            state: "Delhi".to_string(),
            city: "New Delhi".to_string(),
            pincode: "110001".to_string(),
            date_of_registration: None,
            tenure_months: tenure,
            num_dependents: 1,
            estimated_salary: salary,
            calls_made: Some(100),
            sms_sent: Some(50),
            data_used: Some(10.0),
            churn,
        }
    }

    #[test]
    fn test_derive_record_scenario() {
        let pipeline = Pipeline::new(&AppConfig::default());
        let d = pipeline
            .derive_record(&record("c-1", Churn::Active, 2, Some(30_000.0)))
            .unwrap();
        assert!((d.segmentation.usage_score - 36.5).abs() < 1e-9);
        assert_eq!(d.segmentation.usage_category, UsageCategory::Medium);
        assert_eq!(d.segmentation.customer_segment, CustomerSegment::New);
        assert_eq!(d.segmentation.revenue_segment, RevenueSegment::MiddleIncome);
    }

    #[test]
    fn test_cleaned_version_carries_clamped_counters() {
        let pipeline = Pipeline::new(&AppConfig::default());
        let mut raw = record("c-1", Churn::Active, 12, Some(30_000.0));
        raw.calls_made = Some(-7);
        raw.data_used = None;
        let d = pipeline.derive_record(&raw).unwrap();
        assert_eq!(d.cleaned.calls_made, Some(0));
        assert_eq!(d.cleaned.data_used, Some(0.0));
        assert_eq!(raw.calls_made, Some(-7));
        assert_eq!(d.clamp.repaired_count(), 2);
    }

    #[test]
    fn test_batch_counts_and_summary() {
        let pipeline = Pipeline::new(&AppConfig::default());
        let records = vec![
            record("a", Churn::Churned, 3, Some(90_000.0)),
            record("b", Churn::Active, 2, Some(10_000.0)),
            record("c", Churn::Active, 24, Some(55_000.0)),
        ];
        let batch = pipeline.derive(&records).unwrap();
        assert_eq!(batch.analytics.len(), records.len());
        assert_eq!(batch.segmentation.len(), records.len());
        assert_eq!(batch.summary.records, 3);
        assert_eq!(batch.summary.segment_counts[&CustomerSegment::Churned], 1);
        assert_eq!(batch.summary.segment_counts[&CustomerSegment::New], 1);
        assert_eq!(batch.summary.segment_counts[&CustomerSegment::Loyal], 1);
    }

    #[test]
    fn test_unclassifiable_record_fails_batch() {
        let pipeline = Pipeline::new(&AppConfig::default());
        let records = vec![
            record("a", Churn::Active, 12, Some(25_000.0)),
            record("bad", Churn::Active, 12, Some(-50.0)),
        ];
        match pipeline.derive(&records) {
            Err(RetentionError::Unclassifiable { customer_id, stage, .. }) => {
                assert_eq!(customer_id, "bad");
                assert_eq!(stage, "revenue_segment");
            }
            other => panic!("expected unclassifiable error, got {other:?}"),
        }
    }

    #[test]
    fn test_low_income_policy_repairs_only_the_analytical_salary() {
        let mut config = AppConfig::default();
        config.segmentation.invalid_salary = InvalidSalaryPolicy::LowIncome;
        let pipeline = Pipeline::new(&config);
        let batch = pipeline
            .derive(&[record("a", Churn::Active, 12, None)])
            .unwrap();
        assert_eq!(batch.summary.salaries_repaired, 1);
        assert_eq!(batch.cleaned[0].estimated_salary, None);
        assert_eq!(batch.analytics[0].revenue_segment, RevenueSegment::LowIncome);
        assert_eq!(batch.analytics[0].estimated_salary, 0.0);
    }

    #[test]
    fn test_usage_score_on_upper_threshold_is_medium() {
        let pipeline = Pipeline::new(&AppConfig::default());
        let mut raw = record("c-1", Churn::Active, 24, Some(30_000.0));
        raw.calls_made = Some(0);
        raw.sms_sent = Some(9);
        raw.data_used = Some(114.0);
        let d = pipeline.derive_record(&raw).unwrap();
        assert_eq!(d.segmentation.usage_score, 75.0);
        assert_eq!(d.segmentation.usage_category, UsageCategory::Medium);
    }

    #[tokio::test]
    async fn test_sharded_matches_sequential() {
        let mut config = AppConfig::default();
        config.pipeline.shard_size = 3;
        let pipeline = Arc::new(Pipeline::new(&config));
        let records: Vec<_> = (0..20)
            .map(|i| {
                let mut r = record(
                    &format!("c-{i:02}"),
                    if i % 4 == 0 { Churn::Churned } else { Churn::Active },
                    i,
                    Some(5_000.0 * i as f64),
                );
                r.data_used = Some(i as f64 * 7.5);
                r
            })
            .collect();

        let sequential = pipeline.derive(&records).unwrap();
        let sharded = pipeline.derive_sharded(records).await.unwrap();
        assert_eq!(sequential.analytics, sharded.analytics);
        assert_eq!(sequential.segmentation, sharded.segmentation);
    }

    #[tokio::test]
    async fn test_sharded_error_propagates() {
        let mut config = AppConfig::default();
        config.pipeline.shard_size = 1;
        let pipeline = Arc::new(Pipeline::new(&config));
        let records = vec![
            record("a", Churn::Active, 12, Some(25_000.0)),
            record("b", Churn::Active, 12, Some(f64::NAN)),
        ];
        assert!(pipeline.derive_sharded(records).await.is_err());
    }
}
