use gaps_backfill::BackfillStats;
use gaps_catalog::CatalogClient;
use gaps_db::Store;
use gaps_types::{Collection, CollectionId};
use serde_json::json;
use tracing::{info, warn};

use crate::error::RegistryError;

/// A collection registration request: a raw (possibly dotted) version
/// string, not yet sanitized into a [`CollectionId`].
#[derive(Clone, Debug)]
pub struct RegisterRequest {
    pub short_name: String,
    pub raw_version: String,
    pub tolerance: Option<i64>,
}

#[derive(Clone, Debug)]
pub enum RegisterOutcome {
    /// First-time registration, backfill completed.
    Registered(BackfillStats),
    /// `force=true` on an already-registered collection; only the backfill
    /// re-ran.
    Rebackfilled(BackfillStats),
    /// Already registered, `force` not set: a no-op per the idempotency
    /// contract.
    AlreadyRegistered,
    /// Registration (or its force-rerun) committed but the backfill trigger
    /// failed; the caller should retry with `force=true`.
    BackfillFailed { collection_id: String, detail: String },
}

/// Orchestrates `register(short_name, version, tolerance?)` (§4.2): catalog
/// lookup, transactional partition/collection/initial-gap insert, tolerance
/// upsert, backfill trigger, and event-bus filter policy update.
#[derive(Clone)]
pub struct Registry {
    store: Store,
    catalog: CatalogClient,
    sqs: aws_sdk_sqs::Client,
    dynamodb: aws_sdk_dynamodb::Client,
    sns: aws_sdk_sns::Client,
    queue_url: String,
    tolerance_table: String,
    ingest_subscription_arn: String,
    deletion_subscription_arn: String,
}

impl Registry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Store,
        catalog: CatalogClient,
        sqs: aws_sdk_sqs::Client,
        dynamodb: aws_sdk_dynamodb::Client,
        sns: aws_sdk_sns::Client,
        queue_url: String,
        tolerance_table: String,
        ingest_subscription_arn: String,
        deletion_subscription_arn: String,
    ) -> Self {
        Registry {
            store,
            catalog,
            sqs,
            dynamodb,
            sns,
            queue_url,
            tolerance_table,
            ingest_subscription_arn,
            deletion_subscription_arn,
        }
    }

    pub async fn register(&self, req: RegisterRequest, force: bool) -> Result<RegisterOutcome, RegistryError> {
        let collection_id = CollectionId::new(&req.short_name, &req.raw_version);
        let exists = self.store.collection_exists(&collection_id).await?;

        if exists && !force {
            return Ok(RegisterOutcome::AlreadyRegistered);
        }

        if !exists {
            let extent = self.catalog.collection_extent(&collection_id).await?;
            let collection = Collection { id: collection_id.clone(), extent };
            self.store.register_collection(&collection).await?;
            info!(collection_id = %collection_id, "inserted collection and initial gap");

            if let Some(tolerance) = req.tolerance {
                self.upsert_tolerance(&req.short_name, &req.raw_version, tolerance).await?;
            }
        }

        let stats = match gaps_backfill::run_backfill(&self.catalog, &self.sqs, &self.queue_url, &collection_id).await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(collection_id = %collection_id, error = %err, "backfill failed, registration incomplete");
                return Ok(RegisterOutcome::BackfillFailed {
                    collection_id: collection_id.to_string(),
                    detail: format!("{err}; retry with force=true"),
                });
            }
        };

        if !exists {
            self.update_filter_policies(&collection_id).await?;
            Ok(RegisterOutcome::Registered(stats))
        } else {
            Ok(RegisterOutcome::Rebackfilled(stats))
        }
    }

    async fn upsert_tolerance(&self, short_name: &str, raw_version: &str, tolerance_secs: i64) -> Result<(), RegistryError> {
        use aws_sdk_dynamodb::types::AttributeValue;

        self.dynamodb
            .put_item()
            .table_name(&self.tolerance_table)
            .item("short_name", AttributeValue::S(short_name.to_string()))
            .item("version", AttributeValue::S(raw_version.to_string()))
            .item("tolerance_seconds", AttributeValue::N(tolerance_secs.to_string()))
            .send()
            .await?;
        Ok(())
    }

    async fn update_filter_policies(&self, collection_id: &CollectionId) -> Result<(), RegistryError> {
        self.add_to_filter_policy(&self.ingest_subscription_arn, collection_id).await?;
        self.add_to_filter_policy(&self.deletion_subscription_arn, collection_id).await?;
        Ok(())
    }

    async fn add_to_filter_policy(&self, subscription_arn: &str, collection_id: &CollectionId) -> Result<(), RegistryError> {
        let attrs = self
            .sns
            .get_subscription_attributes()
            .subscription_arn(subscription_arn)
            .send()
            .await?;

        let current = attrs
            .attributes()
            .and_then(|a| a.get("FilterPolicy"))
            .cloned()
            .unwrap_or_else(|| "{}".to_string());
        let mut policy: serde_json::Value = serde_json::from_str(&current).unwrap_or_else(|_| json!({}));

        let entry = policy
            .as_object_mut()
            .expect("FilterPolicy is always a JSON object")
            .entry("collectionId")
            .or_insert_with(|| json!([]));
        if let Some(arr) = entry.as_array_mut() {
            let value = json!(collection_id.as_str());
            if !arr.contains(&value) {
                arr.push(value);
            }
        }

        self.sns
            .set_subscription_attributes()
            .subscription_arn(subscription_arn)
            .attribute_name("FilterPolicy")
            .attribute_value(policy.to_string())
            .send()
            .await?;
        Ok(())
    }
}
