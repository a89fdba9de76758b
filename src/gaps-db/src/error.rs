use thiserror::Error;

/// Errors surfaced by the interval store. Variants mirror the taxonomy in
/// `SPEC_FULL.md` §7: callers map these to HTTP status codes or
/// `batchItemFailures` entries at the edge rather than this crate knowing
/// about either.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write would have produced two overlapping `[start, end)` ranges in
    /// the same collection; the database's exclusion constraint rejected it.
    #[error("overlap violation for collection {collection_id}: {detail}")]
    OverlapViolation {
        collection_id: String,
        detail: String,
    },

    /// The referenced collection has no provisioned partitions.
    #[error("collection {0} has no gaps/reasons partitions")]
    UnpartitionedCollection(String),

    /// A `collections.collection_id` value read back from storage does not
    /// parse as a well-formed collection id. This should never happen for
    /// rows this crate wrote itself.
    #[error("stored collection id is malformed: {0}")]
    InvalidCollectionId(String),

    #[error("database connection error: {0}")]
    Connection(#[from] deadpool_postgres::PoolError),

    #[error("database query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    #[error("database config error: {0}")]
    Config(#[from] deadpool_postgres::ConfigError),

    #[error("database build error: {0}")]
    Build(#[from] deadpool_postgres::BuildError),
}

impl StoreError {
    /// True if this error represents a conflict (overlap violation) rather
    /// than a transport/connection problem.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::OverlapViolation { .. })
    }

    /// Classifies a raw postgres error as an overlap violation (SQLSTATE
    /// `23P01`, `exclusion_violation`) when possible, otherwise wraps it
    /// as-is.
    pub fn from_pg(collection_id: &str, err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            if db_err.code() == &tokio_postgres::error::SqlState::EXCLUSION_VIOLATION {
                return StoreError::OverlapViolation {
                    collection_id: collection_id.to_string(),
                    detail: db_err.message().to_string(),
                };
            }
        }
        StoreError::Query(err)
    }
}
