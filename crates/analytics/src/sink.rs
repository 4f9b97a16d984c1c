//! ClickHouse sink for the derived tables.
//!
//! Rows are loaded into `<table>_staging`, then swapped in with
//! `EXCHANGE TABLES`, so readers of the live table never see a partial load.

use retention_core::config::ClickHouseConfig;
use retention_core::{RetentionError, RetentionResult};
use serde::Serialize;
use tracing::{debug, error, info};

use crate::export::{ANALYTICS_TABLE, SEGMENTATION_TABLE};
use crate::store::DerivedSnapshot;

const SEGMENTATION_COLUMNS: &str = "
    customer_id String,
    churn UInt8,
    tenure_months UInt32,
    revenue_segment LowCardinality(String),
    usage_score Float64,
    usage_category LowCardinality(String),
    customer_segment LowCardinality(String)";

const ANALYTICS_COLUMNS: &str = "
    customer_id String,
    customer_segment LowCardinality(String),
    usage_score Float64,
    usage_category LowCardinality(String),
    revenue_segment LowCardinality(String),
    tenure_months UInt32,
    gender String,
    age UInt32,
    state String,
    city String,
    estimated_salary Float64,
    churn UInt8,
    calls_made Int64,
    sms_sent Int64,
    data_used Float64";

pub struct ClickHouseSink {
    client: clickhouse::Client,
    batch_size: usize,
}

impl ClickHouseSink {
    pub async fn new(config: &ClickHouseConfig) -> RetentionResult<Self> {
        let client = clickhouse::Client::default()
            .with_url(&config.url)
            .with_database(&config.database);

        let sink = Self {
            client,
            batch_size: config.batch_size.max(1),
        };
        sink.ensure_schema().await?;
        Ok(sink)
    }

    async fn execute(&self, sql: &str) -> RetentionResult<()> {
        self.client
            .query(sql)
            .execute()
            .await
            .map_err(|e| RetentionError::Analytics(e.to_string()))
    }

    async fn ensure_schema(&self) -> RetentionResult<()> {
        for (table, columns) in [
            (SEGMENTATION_TABLE, SEGMENTATION_COLUMNS),
            (ANALYTICS_TABLE, ANALYTICS_COLUMNS),
        ] {
            self.execute(&create_table_sql(table, columns)).await?;
            self.execute(&create_table_sql(&staging_name(table), columns))
                .await?;
        }
        info!("ClickHouse schema verified");
        Ok(())
    }

    /// Replace both live tables with the snapshot's rows.
    pub async fn publish(&self, snapshot: &DerivedSnapshot) -> RetentionResult<()> {
        self.stage(SEGMENTATION_TABLE, &snapshot.segmentation).await?;
        self.stage(ANALYTICS_TABLE, &snapshot.analytics).await?;

        for table in [SEGMENTATION_TABLE, ANALYTICS_TABLE] {
            self.execute(&format!(
                "EXCHANGE TABLES {} AND {}",
                staging_name(table),
                table
            ))
            .await?;
        }

        info!(run_id = %snapshot.run_id, rows = snapshot.analytics.len(), "Derived tables published to ClickHouse");
        Ok(())
    }

    async fn stage<T: Serialize>(&self, table: &str, rows: &[T]) -> RetentionResult<()> {
        let staging = staging_name(table);
        self.execute(&format!("TRUNCATE TABLE IF EXISTS {staging}"))
            .await?;

        for chunk in rows.chunks(self.batch_size) {
            let count = chunk.len();
            debug!(table = %staging, count, "Flushing batch to ClickHouse");

            let insert_sql = format!(
                "INSERT INTO {staging} FORMAT JSONEachRow\n{}",
                render_rows(chunk)?.join("\n")
            );
            match self.execute(&insert_sql).await {
                Ok(()) => metrics::counter!("sink.rows_written").increment(count as u64),
                Err(e) => {
                    metrics::counter!("sink.flush_errors").increment(1);
                    error!(error = %e, table = %staging, count, "Failed to flush batch");
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

fn staging_name(table: &str) -> String {
    format!("{table}_staging")
}

fn create_table_sql(table: &str, columns: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} ({columns}\n) ENGINE = MergeTree()\nORDER BY customer_id"
    )
}

/// One JSON object per row. `?` is a bind placeholder in the query template,
/// so it is written as a JSON unicode escape.
fn render_rows<T: Serialize>(rows: &[T]) -> RetentionResult<Vec<String>> {
    rows.iter()
        .map(|row| -> RetentionResult<String> {
            Ok(serde_json::to_string(row)?.replace('?', "\\u003f"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use retention_core::types::{Churn, CustomerSegment, RevenueSegment, SegmentationRow, UsageCategory};

    #[test]
    fn test_create_table_sql() {
        let sql = create_table_sql(SEGMENTATION_TABLE, SEGMENTATION_COLUMNS);
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS customer_segmentation ("));
        assert!(sql.contains("customer_segment LowCardinality(String)"));
        assert!(sql.ends_with("ORDER BY customer_id"));
        assert_eq!(staging_name(ANALYTICS_TABLE), "customer_analytics_staging");
    }

    #[test]
    fn test_rendered_rows_escape_placeholders() {
        let rows = vec![SegmentationRow {
            customer_id: "who?".to_string(),
            churn: Churn::Active,
            tenure_months: 7,
            revenue_segment: RevenueSegment::LowIncome,
            usage_score: 12.5,
            usage_category: UsageCategory::Low,
            customer_segment: CustomerSegment::AtRisk,
        }];
        let rendered = render_rows(&rows).unwrap();
        assert!(!rendered[0].contains('?'));

        let parsed: SegmentationRow = serde_json::from_str(&rendered[0]).unwrap();
        assert_eq!(parsed.customer_id, "who?");
    }
}
