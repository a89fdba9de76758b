use gaps_db::{InputRecord, Store};
use gaps_types::{EventKind, TimeRange};
use tracing::{error, info};

use crate::batch::{group_by_collection, EventGroup};
use crate::error::EngineError;

/// One message that failed to apply, carrying the id the event queue needs
/// to selectively redeliver it.
#[derive(Clone, Debug)]
pub struct MessageFailure {
    pub message_id: String,
    pub error: String,
}

/// Result of applying a whole batch: every message not listed here was
/// applied and committed.
#[derive(Clone, Debug, Default)]
pub struct BatchOutcome {
    pub failures: Vec<MessageFailure>,
}

/// Applies a batch of granule events: groups by collection, then commits or
/// rolls back each collection's group as a unit. A group's failure -- an
/// unregistered collection, a lock/connection error -- fails every message
/// in that group; other groups in the same batch are unaffected, matching
/// §7's "per-collection transactions contain failures; per-message failures
/// fail the whole group" policy.
pub async fn process_batch(store: &Store, events: Vec<gaps_types::GranuleEvent>) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for group in group_by_collection(events) {
        if let Err(err) = apply_group(store, &group).await {
            error!(collection_id = %group.collection_id, error = %err, "batch group failed, failing whole group");
            for event in &group.events {
                outcome.failures.push(MessageFailure {
                    message_id: event.message_id.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    outcome
}

async fn apply_group(store: &Store, group: &EventGroup) -> Result<(), EngineError> {
    if let Some(mismatched) = group.events.iter().find(|e| e.kind != group.kind) {
        let _ = mismatched;
        return Err(EngineError::MixedEventKinds(group.collection_id.to_string()));
    }

    if !store.collection_exists(&group.collection_id).await? {
        return Err(EngineError::UnregisteredCollection(group.collection_id.to_string()));
    }

    let mut client = store.checkout().await?;
    let txn = Store::begin_collection_txn(&mut client, &group.collection_id).await?;

    let records: Vec<InputRecord> = group
        .events
        .iter()
        .map(|e| InputRecord {
            collection_id: group.collection_id.clone(),
            range: TimeRange::new(e.begin, e.end),
        })
        .collect();
    Store::stage_records(&txn, &records).await?;

    match group.kind {
        EventKind::Ingest => Store::apply_ingest(&txn, &group.collection_id).await?,
        EventKind::Delete => Store::apply_delete(&txn, &group.collection_id).await?,
    }

    txn.commit().await?;
    info!(
        collection_id = %group.collection_id,
        kind = ?group.kind,
        count = group.events.len(),
        "applied batch group"
    );
    Ok(())
}
