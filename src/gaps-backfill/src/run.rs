use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use aws_sdk_sqs::types::SendMessageBatchRequestEntry;
use gaps_catalog::{CatalogClient, GranuleSummary};
use gaps_types::{CollectionId, GranuleEvent};
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::error::BackfillError;
use crate::plan::plan;

const SQS_BATCH_SIZE: usize = 10;
const MAX_PRODUCERS: usize = 8;
const CONSUMER_RATIO: f64 = 1.5;

/// Totals for one backfill run, surfaced in the invoking Lambda's logs as
/// `fetched`/`sent` throughput at completion.
#[derive(Clone, Debug, Default)]
pub struct BackfillStats {
    pub fetched: u64,
    pub sent: u64,
}

enum TaskOutcome {
    Produced(u64),
    Sent(u64),
}

/// Runs a full-history backfill for one collection: sizes a producer/consumer
/// pool from the collection's granule count, fans producers out over CMR
/// fetching the collection's temporal extent in parallel slices, and fans
/// consumers out publishing `GranuleEvent::Ingest` messages to SQS in
/// batches of 10.
///
/// All producer and consumer tasks share one `JoinSet`: if any task fails,
/// the remaining tasks are aborted immediately rather than left to finish
/// publishing a partial, now-meaningless backfill.
pub async fn run_backfill(
    catalog: &CatalogClient,
    sqs: &aws_sdk_sqs::Client,
    queue_url: &str,
    collection_id: &CollectionId,
) -> Result<BackfillStats, BackfillError> {
    let (short_name, version) = collection_id
        .split()
        .map(|(n, v)| (n.to_string(), v.to_string()))
        .unwrap_or_else(|_| (collection_id.to_string(), String::new()));

    let hits = catalog.granule_hits(&short_name, &version).await?;
    let extent = catalog.collection_extent(collection_id).await?;
    let backfill_plan = plan(hits, extent, MAX_PRODUCERS, CONSUMER_RATIO);

    info!(
        collection_id = %collection_id,
        granules = hits,
        producers = backfill_plan.producer_windows.len(),
        consumers = backfill_plan.n_consumers,
        "starting backfill"
    );

    let (tx, rx) = mpsc::channel::<GranuleSummary>(backfill_plan.queue_capacity.max(1));
    let rx = Arc::new(Mutex::new(rx));

    let mut tasks: JoinSet<Result<TaskOutcome, BackfillError>> = JoinSet::new();

    for window in &backfill_plan.producer_windows {
        let catalog = catalog.clone();
        let short_name = short_name.clone();
        let version = version.clone();
        let window = *window;
        let tx = tx.clone();
        tasks.spawn(async move {
            let fetched = catalog
                .search_granules(&short_name, &version, window, tx)
                .await?;
            Ok(TaskOutcome::Produced(fetched))
        });
    }
    // Every producer owns a clone; dropping this one lets the channel close
    // once the last producer task finishes, which is how consumers learn
    // there's nothing left to wait for.
    drop(tx);

    for _ in 0..backfill_plan.n_consumers {
        let rx = Arc::clone(&rx);
        let sqs = sqs.clone();
        let queue_url = queue_url.to_string();
        let collection_id = collection_id.clone();
        tasks.spawn(async move { consume(rx, sqs, queue_url, collection_id).await });
    }

    let fetched = Arc::new(AtomicU64::new(0));
    let sent = Arc::new(AtomicU64::new(0));

    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(TaskOutcome::Produced(n))) => {
                fetched.fetch_add(n, Ordering::Relaxed);
            }
            Ok(Ok(TaskOutcome::Sent(n))) => {
                sent.fetch_add(n, Ordering::Relaxed);
            }
            Ok(Err(err)) => {
                tasks.abort_all();
                return Err(err);
            }
            Err(join_err) => {
                tasks.abort_all();
                return Err(BackfillError::TaskPanicked(join_err.to_string()));
            }
        }
    }

    let stats = BackfillStats {
        fetched: fetched.load(Ordering::Relaxed),
        sent: sent.load(Ordering::Relaxed),
    };
    info!(collection_id = %collection_id, fetched = stats.fetched, sent = stats.sent, "backfill complete");
    Ok(stats)
}

async fn consume(
    rx: Arc<Mutex<mpsc::Receiver<GranuleSummary>>>,
    sqs: aws_sdk_sqs::Client,
    queue_url: String,
    collection_id: CollectionId,
) -> Result<TaskOutcome, BackfillError> {
    let mut batch = Vec::with_capacity(SQS_BATCH_SIZE);
    let mut sent = 0u64;

    loop {
        let item = {
            let mut guard = rx.lock().await;
            guard.recv().await
        };

        match item {
            Some(summary) => {
                batch.push(to_entry(&collection_id, &summary));
                if batch.len() >= SQS_BATCH_SIZE {
                    sent += flush(&sqs, &queue_url, std::mem::take(&mut batch)).await?;
                }
            }
            None => {
                if !batch.is_empty() {
                    sent += flush(&sqs, &queue_url, std::mem::take(&mut batch)).await?;
                }
                return Ok(TaskOutcome::Sent(sent));
            }
        }
    }
}

fn to_entry(collection_id: &CollectionId, summary: &GranuleSummary) -> SendMessageBatchRequestEntry {
    let event = GranuleEvent {
        message_id: summary.id.clone(),
        collection_id: collection_id.clone(),
        begin: summary.range.start,
        end: summary.range.end,
        kind: gaps_types::EventKind::Ingest,
    };
    let body = json!({
        "record": {
            "beginningDateTime": event.begin.to_rfc3339(),
            "endingDateTime": event.end.to_rfc3339(),
            "collectionId": event.collection_id.as_str(),
        }
    });

    SendMessageBatchRequestEntry::builder()
        .id(summary.id.clone())
        .message_body(body.to_string())
        .build()
        .expect("id and message_body are both set")
}

async fn flush(
    sqs: &aws_sdk_sqs::Client,
    queue_url: &str,
    entries: Vec<SendMessageBatchRequestEntry>,
) -> Result<u64, BackfillError> {
    let count = entries.len() as u64;
    debug!(queue_url, count, "publishing backfill batch");
    sqs.send_message_batch()
        .queue_url(queue_url)
        .set_entries(Some(entries))
        .send()
        .await?;
    Ok(count)
}
