use chrono::{DateTime, Utc};

use crate::CollectionId;

/// Which of the two logical queues a granule event was delivered on.
/// Determines whether the maintenance engine runs the split-on-add or the
/// merge-on-delete algorithm for the batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Ingest,
    Delete,
}

/// A transient granule-coverage message consumed by the gap maintenance
/// engine. Carries the delivery id so a per-message failure can be reported
/// back to the queue for selective redelivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GranuleEvent {
    pub message_id: String,
    pub collection_id: CollectionId,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub kind: EventKind,
}
