use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("catalog error: {0}")]
    Catalog(#[from] gaps_catalog::CatalogError),

    #[error("store error: {0}")]
    Store(#[from] gaps_db::StoreError),

    #[error("tolerance store error: {0}")]
    Tolerance(#[from] aws_sdk_dynamodb::error::SdkError<aws_sdk_dynamodb::operation::put_item::PutItemError>),

    #[error("failed to read subscription filter policy: {0}")]
    GetFilterPolicy(#[from] aws_sdk_sns::error::SdkError<aws_sdk_sns::operation::get_subscription_attributes::GetSubscriptionAttributesError>),

    #[error("failed to write subscription filter policy: {0}")]
    SetFilterPolicy(#[from] aws_sdk_sns::error::SdkError<aws_sdk_sns::operation::set_subscription_attributes::SetSubscriptionAttributesError>),
}
