use thiserror::Error;

pub type RetentionResult<T> = Result<T, RetentionError>;

#[derive(Error, Debug)]
pub enum RetentionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingestion error at line {line}: {message}")]
    Ingest { line: usize, message: String },

    #[error("Validation error for customer {customer_id}: {message}")]
    Validation {
        customer_id: String,
        message: String,
    },

    #[error("Unclassifiable record {customer_id} at stage {stage}: {detail}")]
    Unclassifiable {
        customer_id: String,
        stage: &'static str,
        detail: String,
    },

    #[error("Orphaned record {customer_id}: no segmentation output")]
    OrphanedRecord { customer_id: String },

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Record store error: {0}")]
    Store(String),

    #[error("ClickHouse analytics error: {0}")]
    Analytics(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for RetentionError {
    fn from(err: config::ConfigError) -> Self {
        RetentionError::Config(err.to_string())
    }
}

impl RetentionError {
    /// Pipeline stage the error belongs to, used as a structured log field.
    pub fn stage(&self) -> &'static str {
        match self {
            RetentionError::Config(_) => "config",
            RetentionError::Ingest { .. } | RetentionError::Validation { .. } => "ingest",
            RetentionError::Unclassifiable { stage, .. } => *stage,
            RetentionError::OrphanedRecord { .. } | RetentionError::Integrity(_) => "join",
            RetentionError::Store(_) => "commit",
            RetentionError::Analytics(_) => "sink",
            RetentionError::Serialization(_) | RetentionError::Io(_) => "export",
            RetentionError::Internal(_) => "internal",
        }
    }
}
