use gaps_service::event_adapter::{self, BatchItemFailures, QueueEvent};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let state = gaps_service::bootstrap().await?;
    run(service_fn(|event: LambdaEvent<QueueEvent>| {
        let state = state.clone();
        async move {
            let response: BatchItemFailures = event_adapter::handle_batch(&state, event.payload).await;
            Ok::<BatchItemFailures, Error>(response)
        }
    }))
    .await
}
