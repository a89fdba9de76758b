use thiserror::Error;

/// Errors surfaced by the catalog client. Everything here is a transport or
/// upstream-data problem; callers decide how to map it onto their own error
/// taxonomy (registration failure, a skipped backfill partition, etc).
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("catalog response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("collection {0} was not found in the catalog")]
    NotFound(String),

    #[error("collection {0} has no declared temporal extent")]
    MissingExtent(String),

    #[error("catalog request for {0} failed after {1} retries: {2}")]
    RetriesExhausted(String, u32, String),
}
