use thiserror::Error;
use uuid::Uuid;

pub type ConsolidationResult<T> = Result<T, ConsolidationError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConsolidationError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("failed to load conversations: {0}")]
    Load(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("conversation {0} not found")]
    NotFound(Uuid),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
}

impl From<tokio_postgres::Error> for ConsolidationError {
    fn from(e: tokio_postgres::Error) -> Self {
        ConsolidationError::Database(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for ConsolidationError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        ConsolidationError::Connection(e.to_string())
    }
}

impl From<db_pool::DbPoolError> for ConsolidationError {
    fn from(e: db_pool::DbPoolError) -> Self {
        match e {
            db_pool::DbPoolError::InvalidUrl(msg) => ConsolidationError::Config(msg),
            other => ConsolidationError::Connection(other.to_string()),
        }
    }
}

impl ConsolidationError {
    /// Whether the error aborts the whole run.
    ///
    /// Per-conversation delete failures (`Database`, `NotFound`, `Timeout`
    /// on a delete) are recorded in the report and the batch moves on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConsolidationError::Config(_)
                | ConsolidationError::Connection(_)
                | ConsolidationError::Load(_)
        )
    }
}
