use std::env;

use chrono::{DateTime, TimeZone, Utc};
use gaps_db::{InputRecord, PoolSettings, Store};
use gaps_types::{Collection, CollectionId, EventKind, TimeRange};

/// Connects to an environment-provided Postgres for the handful of tests
/// that exercise real SQL rather than pure in-memory logic. Returns `None`
/// when no test database is configured; callers should skip rather than
/// fail, since this workspace doesn't assume Postgres is running wherever
/// it's compiled.
pub async fn connect() -> Option<Store> {
    let host = env::var("PGHOST").ok()?;
    let dbname = env::var("PGDATABASE").unwrap_or_else(|_| "postgres".to_string());
    let user = env::var("PGUSER").unwrap_or_else(|_| "postgres".to_string());
    let password = env::var("PGPASSWORD").unwrap_or_else(|_| "postgres".to_string());

    let pool = gaps_db::build_pool(&PoolSettings::new(host, dbname, user, password))
        .await
        .expect("able to connect to the test database");
    gaps_db::bootstrap(&pool).await.expect("able to bootstrap schema");
    Some(Store::new(pool))
}

/// A fresh, uniquely-suffixed collection id so concurrent test runs never
/// collide on the same partitions or advisory lock.
pub fn unique_collection_id(short_name: &str) -> CollectionId {
    CollectionId::new(short_name, &uuid::Uuid::new_v4().simple().to_string())
}

pub fn ts(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().unwrap()
}

pub async fn register(store: &Store, id: &CollectionId, extent: TimeRange) {
    store
        .register_collection(&Collection {
            id: id.clone(),
            extent,
        })
        .await
        .expect("register_collection succeeds");
}

/// Runs the real ingest or delete SQL against a batch of ranges, exactly the
/// way `gaps-engine::process::apply_group` drives it: checkout, per-collection
/// advisory-locked transaction, stage, apply, commit.
pub async fn apply_batch(store: &Store, collection_id: &CollectionId, kind: EventKind, ranges: &[TimeRange]) {
    let mut client = store.checkout().await.expect("checkout succeeds");
    let txn = Store::begin_collection_txn(&mut client, collection_id)
        .await
        .expect("begin_collection_txn succeeds");

    let records: Vec<InputRecord> = ranges
        .iter()
        .map(|range| InputRecord {
            collection_id: collection_id.clone(),
            range: *range,
        })
        .collect();
    Store::stage_records(&txn, &records).await.expect("stage_records succeeds");

    match kind {
        EventKind::Ingest => Store::apply_ingest(&txn, collection_id).await,
        EventKind::Delete => Store::apply_delete(&txn, collection_id).await,
    }
    .expect("apply succeeds");

    txn.commit().await.expect("commit succeeds");
}
