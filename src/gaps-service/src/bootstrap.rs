use gaps_catalog::{CatalogClient, CatalogEnv};
use gaps_db::{build_pool, PoolSettings, Store};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// The `{database, username, password}` shape Secrets Manager holds for
/// `RDS_SECRET`.
#[derive(Deserialize)]
struct DbSecret {
    database: String,
    username: String,
    password: String,
}

/// Everything a handler needs, built once per process and shared across
/// invocations (Lambda reuses warm execution environments, so this amortizes
/// connection setup across many requests).
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub catalog: CatalogClient,
    pub sqs: aws_sdk_sqs::Client,
    pub sns: aws_sdk_sns::Client,
    pub dynamodb: aws_sdk_dynamodb::Client,
    pub s3: aws_sdk_s3::Client,
    pub config: Config,
}

/// Initializes structured logging, resolves the database secret, builds the
/// connection pool, and constructs every AWS client the process needs. Any
/// failure here aborts process startup -- per §4.9, this crate never falls
/// back to per-request bootstrap.
pub async fn bootstrap() -> anyhow::Result<AppState> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let config = Config::from_env()?;
    let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_types::region::Region::new(config.aws_region.clone()))
        .load()
        .await;

    let secrets = aws_sdk_secretsmanager::Client::new(&aws_config);
    let secret_value = secrets
        .get_secret_value()
        .secret_id(&config.rds_secret)
        .send()
        .await?;
    let secret_string = secret_value
        .secret_string()
        .ok_or_else(|| anyhow::anyhow!("RDS_SECRET {} has no SecretString", config.rds_secret))?;
    let db_secret: DbSecret = serde_json::from_str(secret_string)?;

    let pool_settings = PoolSettings::new(
        config.rds_proxy_host.clone(),
        db_secret.database,
        db_secret.username,
        db_secret.password,
    );
    let pool = build_pool(&pool_settings).await?;
    gaps_db::bootstrap(&pool).await?;
    let store = Store::new(pool);

    let catalog = CatalogClient::new(CatalogEnv::from_str_env(&config.cmr_env))?;

    Ok(AppState {
        store,
        catalog,
        sqs: aws_sdk_sqs::Client::new(&aws_config),
        sns: aws_sdk_sns::Client::new(&aws_config),
        dynamodb: aws_sdk_dynamodb::Client::new(&aws_config),
        s3: aws_sdk_s3::Client::new(&aws_config),
        config,
    })
}
