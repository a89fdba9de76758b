use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("catalog error: {0}")]
    Catalog(#[from] gaps_catalog::CatalogError),

    #[error("failed to publish backfill batch to SQS: {0}")]
    Sqs(#[from] aws_sdk_sqs::error::SdkError<aws_sdk_sqs::operation::send_message_batch::SendMessageBatchError>),

    #[error("a producer or consumer task panicked: {0}")]
    TaskPanicked(String),
}
