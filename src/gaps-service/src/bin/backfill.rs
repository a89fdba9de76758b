use gaps_registry::{RegisterRequest, Registry};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;

/// Standalone trigger for re-running a collection's backfill outside the
/// synchronous HTTP registration path -- the async counterpart to
/// `POST /collections {"backfill": "force"}`, for operators or schedules
/// that want to kick off a rebackfill without waiting on the HTTP response.
#[derive(Deserialize)]
struct BackfillTrigger {
    short_name: String,
    version: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let state = gaps_service::bootstrap().await?;
    let registry = Registry::new(
        state.store.clone(),
        state.catalog.clone(),
        state.sqs.clone(),
        state.dynamodb.clone(),
        state.sns.clone(),
        state.config.queue_url.clone(),
        state.config.tolerance_table_name.clone(),
        state.config.subscription_arn_ingest.clone(),
        state.config.subscription_arn_deletion.clone(),
    );

    run(service_fn(move |event: LambdaEvent<BackfillTrigger>| {
        let registry = registry.clone();
        async move {
            let request = RegisterRequest {
                short_name: event.payload.short_name,
                raw_version: event.payload.version,
                tolerance: None,
            };
            let outcome = registry.register(request, true).await?;
            Ok::<_, Error>(serde_json::json!({ "outcome": format!("{outcome:?}") }))
        }
    }))
    .await
}
