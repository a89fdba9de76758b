use thiserror::Error;

/// The edge error taxonomy of §7: every downstream error gets mapped onto
/// one of these at the HTTP boundary rather than threading status codes
/// through the core crates.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    DownstreamFailure(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::DownstreamFailure(_) => 500,
        }
    }
}

impl From<gaps_registry::RegistryError> for ApiError {
    fn from(err: gaps_registry::RegistryError) -> Self {
        ApiError::DownstreamFailure(err.to_string())
    }
}

impl From<gaps_query::QueryError> for ApiError {
    fn from(err: gaps_query::QueryError) -> Self {
        match err {
            gaps_query::QueryError::Store(store_err) if store_err.is_conflict() => {
                ApiError::Conflict(store_err.to_string())
            }
            gaps_query::QueryError::EmptyReasonText => ApiError::BadRequest(err.to_string()),
            other => ApiError::DownstreamFailure(other.to_string()),
        }
    }
}

impl From<gaps_db::StoreError> for ApiError {
    fn from(err: gaps_db::StoreError) -> Self {
        if err.is_conflict() {
            ApiError::Conflict(err.to_string())
        } else {
            ApiError::DownstreamFailure(err.to_string())
        }
    }
}
