//! Analytical record builder: joins cleaned customer records with their
//! segmentation rows into the denormalized reporting table.

use retention_core::types::{AnalyticalRecord, CustomerRecord, SegmentationRow};
use retention_core::{RetentionError, RetentionResult};
use std::collections::HashMap;

pub struct AnalyticalRecordBuilder;

impl AnalyticalRecordBuilder {
    /// Inner join on `customer_id`, preserving the order of `records`.
    ///
    /// Every record must have exactly one segmentation row and every row must
    /// belong to a record. Records must already carry cleaned counters and a
    /// classifiable salary.
    pub fn build(
        records: &[CustomerRecord],
        segmentation: &[SegmentationRow],
    ) -> RetentionResult<Vec<AnalyticalRecord>> {
        Self::build_with_repairs(records, segmentation, &HashMap::new())
    }

    /// Like [`build`](Self::build), but salaries the segmentation engine
    /// substituted are taken from `repaired_salaries` instead of the record.
    /// The record itself keeps its raw salary.
    pub fn build_with_repairs(
        records: &[CustomerRecord],
        segmentation: &[SegmentationRow],
        repaired_salaries: &HashMap<String, f64>,
    ) -> RetentionResult<Vec<AnalyticalRecord>> {
        let mut by_id: HashMap<&str, &SegmentationRow> = HashMap::with_capacity(segmentation.len());
        for row in segmentation {
            if by_id.insert(row.customer_id.as_str(), row).is_some() {
                return Err(RetentionError::Integrity(format!(
                    "duplicate segmentation row for customer {}",
                    row.customer_id
                )));
            }
        }

        let mut analytics = Vec::with_capacity(records.len());
        for record in records {
            let row = by_id.remove(record.customer_id.as_str()).ok_or_else(|| {
                RetentionError::OrphanedRecord {
                    customer_id: record.customer_id.clone(),
                }
            })?;
            let salary = repaired_salaries
                .get(&record.customer_id)
                .copied()
                .or(record.estimated_salary);
            analytics.push(join_one(record, row, salary)?);
        }

        if let Some(extra) = by_id.keys().min() {
            return Err(RetentionError::Integrity(format!(
                "{} segmentation row(s) without a customer record, first: {}",
                by_id.len(),
                extra
            )));
        }

        Self::check_row_counts(records.len(), analytics.len())?;
        Ok(analytics)
    }

    pub fn check_row_counts(raw: usize, analytical: usize) -> RetentionResult<()> {
        if raw != analytical {
            return Err(RetentionError::Integrity(format!(
                "row count mismatch: {raw} customer records, {analytical} analytical records"
            )));
        }
        Ok(())
    }
}

fn join_one(
    record: &CustomerRecord,
    row: &SegmentationRow,
    salary: Option<f64>,
) -> RetentionResult<AnalyticalRecord> {
    let uncleaned = |field: &str| {
        RetentionError::Integrity(format!(
            "customer {} reached the join with an uncleaned {field}",
            record.customer_id
        ))
    };

    let estimated_salary = salary
        .filter(|s| s.is_finite() && *s >= 0.0)
        .ok_or_else(|| uncleaned("estimated_salary"))?;
    let calls_made = record
        .calls_made
        .filter(|v| *v >= 0)
        .ok_or_else(|| uncleaned("calls_made"))?;
    let sms_sent = record
        .sms_sent
        .filter(|v| *v >= 0)
        .ok_or_else(|| uncleaned("sms_sent"))?;
    let data_used = record
        .data_used
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| uncleaned("data_used"))?;

    if row.churn != record.churn || row.tenure_months != record.tenure_months {
        return Err(RetentionError::Integrity(format!(
            "segmentation row for customer {} disagrees with the customer record",
            record.customer_id
        )));
    }

    Ok(AnalyticalRecord {
        customer_id: record.customer_id.clone(),
        customer_segment: row.customer_segment,
        usage_score: row.usage_score,
        usage_category: row.usage_category,
        revenue_segment: row.revenue_segment,
        tenure_months: record.tenure_months,
        gender: record.gender.clone(),
        age: record.age,
        state: record.state.clone(),
        city: record.city.clone(),
        estimated_salary,
        churn: record.churn,
        calls_made,
        sms_sent,
        data_used,
    })
}
