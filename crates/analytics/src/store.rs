//! In-memory record store. Raw records are keyed by `customer_id`; derived
//! tables are published together in a single swap.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use retention_core::types::{AnalyticalRecord, CustomerRecord, SegmentationRow};
use retention_core::{RetentionError, RetentionResult};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::builder::AnalyticalRecordBuilder;
use crate::pipeline::{DerivationBatch, RunSummary};

/// Derived tables from one committed run.
#[derive(Debug, Clone)]
pub struct DerivedSnapshot {
    pub run_id: Uuid,
    pub committed_at: DateTime<Utc>,
    pub segmentation: Vec<SegmentationRow>,
    pub analytics: Vec<AnalyticalRecord>,
}

#[derive(Default)]
struct StoreState {
    raw: BTreeMap<String, CustomerRecord>,
    derived: Option<Arc<DerivedSnapshot>>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk load raw records. All-or-nothing: a duplicate `customer_id`,
    /// within the batch or against stored records, rejects the whole load.
    pub fn load(&self, records: Vec<CustomerRecord>) -> RetentionResult<usize> {
        let mut state = self.state.write();
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if state.raw.contains_key(&record.customer_id)
                || !seen.insert(record.customer_id.as_str())
            {
                return Err(RetentionError::Store(format!(
                    "duplicate customer_id {}",
                    record.customer_id
                )));
            }
        }

        let count = records.len();
        for record in records {
            state.raw.insert(record.customer_id.clone(), record);
        }
        Ok(count)
    }

    /// Raw records ordered by `customer_id`.
    pub fn raw_records(&self) -> Vec<CustomerRecord> {
        self.state.read().raw.values().cloned().collect()
    }

    pub fn raw_count(&self) -> usize {
        self.state.read().raw.len()
    }

    pub fn get(&self, customer_id: &str) -> Option<CustomerRecord> {
        self.state.read().raw.get(customer_id).cloned()
    }

    /// Latest committed derived tables, if any run has committed.
    pub fn snapshot(&self) -> Option<Arc<DerivedSnapshot>> {
        self.state.read().derived.clone()
    }

    /// Publish a derivation batch. Cleaned record versions and both derived
    /// tables become visible together; on any integrity error the store is
    /// left untouched.
    pub fn commit(&self, batch: DerivationBatch) -> RetentionResult<RunSummary> {
        let mut state = self.state.write();

        AnalyticalRecordBuilder::check_row_counts(state.raw.len(), batch.analytics.len())?;
        AnalyticalRecordBuilder::check_row_counts(state.raw.len(), batch.cleaned.len())?;
        for record in &batch.cleaned {
            if !state.raw.contains_key(&record.customer_id) {
                return Err(RetentionError::Integrity(format!(
                    "derived record {} has no raw record in the store",
                    record.customer_id
                )));
            }
        }

        let DerivationBatch {
            summary,
            cleaned,
            segmentation,
            analytics,
        } = batch;

        for record in cleaned {
            state.raw.insert(record.customer_id.clone(), record);
        }
        state.derived = Some(Arc::new(DerivedSnapshot {
            run_id: summary.run_id,
            committed_at: Utc::now(),
            segmentation,
            analytics,
        }));

        info!(run_id = %summary.run_id, records = summary.records, "Derived tables published");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use retention_core::config::{AppConfig, InvalidSalaryPolicy};
    use retention_core::types::Churn;

    fn record(id: &str, salary: f64) -> CustomerRecord {
        CustomerRecord {
            customer_id: id.to_string(),
            telecom_partner: "Vodafone".to_string(),
            gender: "F".to_string(),
            age: 45,
            state: "Gujarat".to_string(),
            city: "Surat".to_string(),
            pincode: "395003".to_string(),
            date_of_registration: None,
            tenure_months: 30,
            num_dependents: 3,
            estimated_salary: Some(salary),
            calls_made: Some(-10),
            sms_sent: Some(12),
            data_used: Some(80.0),
            churn: Churn::Active,
        }
    }

    #[test]
    fn test_duplicate_ids_rejected_atomically() {
        let store = InMemoryStore::new();
        store.load(vec![record("a", 1.0)]).unwrap();
        let err = store.load(vec![record("b", 1.0), record("a", 2.0)]);
        assert!(matches!(err, Err(RetentionError::Store(_))));
        assert_eq!(store.raw_count(), 1);
        assert!(store.get("b").is_none());

        assert!(store
            .load(vec![record("c", 1.0), record("c", 1.0)])
            .is_err());
    }

    #[test]
    fn test_commit_publishes_cleaned_versions() {
        let store = InMemoryStore::new();
        store.load(vec![record("b", 30_000.0), record("a", 60_000.0)]).unwrap();
        assert!(store.snapshot().is_none());

        let pipeline = Pipeline::new(&AppConfig::default());
        let batch = pipeline.derive(&store.raw_records()).unwrap();
        store.commit(batch).unwrap();

        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.analytics.len(), 2);
        assert_eq!(snapshot.analytics[0].customer_id, "a");
        assert_eq!(store.get("a").unwrap().calls_made, Some(0));
    }

    #[test]
    fn test_low_income_commit_keeps_raw_salary() {
        let store = InMemoryStore::new();
        store.load(vec![record("a", -50.0), record("b", 30_000.0)]).unwrap();

        let mut config = AppConfig::default();
        config.segmentation.invalid_salary = InvalidSalaryPolicy::LowIncome;
        let batch = Pipeline::new(&config).derive(&store.raw_records()).unwrap();
        store.commit(batch).unwrap();

        let raw = store.get("a").unwrap();
        assert_eq!(raw.estimated_salary, Some(-50.0));
        assert_eq!(raw.calls_made, Some(0));
        assert_eq!(store.snapshot().unwrap().analytics[0].estimated_salary, 0.0);

        let strict = Pipeline::new(&AppConfig::default());
        assert!(matches!(
            strict.derive(&store.raw_records()),
            Err(RetentionError::Unclassifiable { .. })
        ));
    }

    #[test]
    fn test_commit_with_wrong_row_count_leaves_store_untouched() {
        let store = InMemoryStore::new();
        store.load(vec![record("a", 30_000.0), record("b", 30_000.0)]).unwrap();

        let pipeline = Pipeline::new(&AppConfig::default());
        let batch = pipeline.derive(&[record("a", 30_000.0)]).unwrap();
        assert!(matches!(
            store.commit(batch),
            Err(RetentionError::Integrity(_))
        ));
        assert!(store.snapshot().is_none());
        assert_eq!(store.get("a").unwrap().calls_made, Some(-10));
    }

    #[test]
    fn test_commit_rejects_unknown_customer() {
        let store = InMemoryStore::new();
        store.load(vec![record("a", 30_000.0)]).unwrap();

        let pipeline = Pipeline::new(&AppConfig::default());
        let batch = pipeline.derive(&[record("x", 30_000.0)]).unwrap();
        assert!(store.commit(batch).is_err());
        assert!(store.snapshot().is_none());
    }
}
