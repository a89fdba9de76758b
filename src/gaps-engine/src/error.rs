use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] gaps_db::StoreError),

    #[error("collection {0} is not registered")]
    UnregisteredCollection(String),

    #[error("batch for collection {0} mixes ingest and delete events")]
    MixedEventKinds(String),
}
