use gaps_types::{EventKind, GranuleEvent};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bootstrap::AppState;

/// The outer SQS/SNS event-queue envelope.
#[derive(Debug, Deserialize)]
pub struct QueueEvent {
    #[serde(rename = "Records")]
    pub records: Vec<QueueRecord>,
}

#[derive(Debug, Deserialize)]
pub struct QueueRecord {
    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,
    #[serde(rename = "messageId")]
    pub message_id: String,
    pub body: String,
}

/// The SNS notification body: an inner JSON-encoded `Message` string.
#[derive(Debug, Deserialize)]
struct SnsBody {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
struct GranuleNotification {
    record: GranuleRecord,
}

#[derive(Debug, Deserialize)]
struct GranuleRecord {
    #[serde(rename = "collectionId")]
    collection_id: String,
    #[serde(rename = "beginningDateTime")]
    beginning_date_time: chrono::DateTime<chrono::Utc>,
    #[serde(rename = "endingDateTime")]
    ending_date_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Default)]
pub struct BatchItemFailures {
    #[serde(rename = "batchItemFailures")]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Serialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

/// Decodes an inbound queue event into granule events, runs them through the
/// maintenance engine, and reports per-message failures for selective
/// redelivery. A record that fails to decode is treated as a bad-input
/// failure for that one message rather than aborting the whole batch.
pub async fn handle_batch(state: &AppState, event: QueueEvent) -> BatchItemFailures {
    let mut decode_failures = Vec::new();
    let mut events = Vec::with_capacity(event.records.len());

    for record in event.records {
        match decode_record(&state.config.deletion_queue_arn, &record) {
            Ok(granule_event) => events.push(granule_event),
            Err(err) => {
                warn!(message_id = %record.message_id, error = %err, "failed to decode queue record");
                decode_failures.push(BatchItemFailure {
                    item_identifier: record.message_id,
                });
            }
        }
    }

    let outcome = gaps_engine::process_batch(&state.store, events).await;
    let mut failures = decode_failures;
    failures.extend(outcome.failures.into_iter().map(|f| BatchItemFailure {
        item_identifier: f.message_id,
    }));

    BatchItemFailures {
        batch_item_failures: failures,
    }
}

fn decode_record(deletion_queue_arn: &str, record: &QueueRecord) -> Result<GranuleEvent, String> {
    let sns_body: SnsBody = serde_json::from_str(&record.body).map_err(|e| format!("malformed SNS envelope: {e}"))?;
    let notification: GranuleNotification =
        serde_json::from_str(&sns_body.message).map_err(|e| format!("malformed granule notification: {e}"))?;

    // Live notifications carry the raw, dotted version (e.g.
    // `MOD09GA___6.1`); registration stores the sanitized form
    // (`CollectionId::new` replaces `.` with `_`), so the same
    // replacement has to happen here or `collection_exists` never matches.
    let sanitized_id = notification.record.collection_id.replace('.', "_");
    let collection_id = sanitized_id
        .parse()
        .map_err(|e: gaps_types::CollectionIdError| e.to_string())?;

    let kind = if record.event_source_arn == deletion_queue_arn {
        EventKind::Delete
    } else {
        EventKind::Ingest
    };

    Ok(GranuleEvent {
        message_id: record.message_id.clone(),
        collection_id,
        begin: notification.record.beginning_date_time,
        end: notification.record.ending_date_time,
        kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event_source_arn: &str) -> QueueRecord {
        let inner = serde_json::json!({
            "record": {
                "collectionId": "MOD09GA___6_1",
                "beginningDateTime": "2000-06-01T00:00:00Z",
                "endingDateTime": "2000-06-02T00:00:00Z",
            }
        });
        let body = serde_json::json!({ "Message": inner.to_string() });
        QueueRecord {
            event_source_arn: event_source_arn.to_string(),
            message_id: "msg-1".to_string(),
            body: body.to_string(),
        }
    }

    #[test]
    fn matching_source_arn_decodes_as_delete() {
        let event = decode_record("arn:aws:sqs:deletion-queue", &record("arn:aws:sqs:deletion-queue")).unwrap();
        assert_eq!(event.kind, EventKind::Delete);
    }

    #[test]
    fn non_matching_source_arn_decodes_as_ingest() {
        let event = decode_record("arn:aws:sqs:deletion-queue", &record("arn:aws:sqs:ingest-queue")).unwrap();
        assert_eq!(event.kind, EventKind::Ingest);
    }

    #[test]
    fn malformed_body_is_reported_rather_than_panicking() {
        let bad = QueueRecord {
            event_source_arn: "arn:aws:sqs:ingest-queue".to_string(),
            message_id: "msg-2".to_string(),
            body: "not json".to_string(),
        };
        assert!(decode_record("arn:aws:sqs:deletion-queue", &bad).is_err());
    }

    #[test]
    fn dotted_version_is_sanitized_to_match_a_registered_collection_id() {
        let inner = serde_json::json!({
            "record": {
                "collectionId": "MOD09GA___6.1",
                "beginningDateTime": "2000-06-01T00:00:00Z",
                "endingDateTime": "2000-06-02T00:00:00Z",
            }
        });
        let body = serde_json::json!({ "Message": inner.to_string() });
        let dotted = QueueRecord {
            event_source_arn: "arn:aws:sqs:ingest-queue".to_string(),
            message_id: "msg-3".to_string(),
            body: body.to_string(),
        };

        let event = decode_record("arn:aws:sqs:deletion-queue", &dotted).unwrap();
        assert_eq!(
            event.collection_id,
            gaps_types::CollectionId::new("MOD09GA", "6.1"),
            "a live notification's dotted version must sanitize to the same id registration stores"
        );
    }
}
