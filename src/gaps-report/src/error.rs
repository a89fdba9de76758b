use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Query(#[from] gaps_query::QueryError),

    #[error("failed to encode report as CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to upload report to S3: {0}")]
    Upload(#[from] aws_sdk_s3::error::SdkError<aws_sdk_s3::operation::put_object::PutObjectError>),
}
