use gaps_service::envelope::{self, HttpEnvelope, HttpResponse};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let state = gaps_service::bootstrap().await?;
    run(service_fn(|event: LambdaEvent<HttpEnvelope>| {
        let state = state.clone();
        async move {
            let response: HttpResponse = envelope::dispatch(&state, event.payload).await;
            Ok::<HttpResponse, Error>(response)
        }
    }))
    .await
}
