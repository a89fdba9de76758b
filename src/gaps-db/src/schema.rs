use deadpool_postgres::Pool;
use tokio_postgres::GenericClient;
use tracing::{debug, info};

use crate::error::StoreError;

/// Idempotent bootstrap DDL for the two logical, list-partitioned relations.
/// Run once at process start; safe to run concurrently from multiple
/// processes because every statement is `IF NOT EXISTS`.
const BOOTSTRAP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    collection_id   TEXT PRIMARY KEY,
    extent_start    TIMESTAMPTZ NOT NULL,
    extent_end      TIMESTAMPTZ NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS gaps (
    gap_id          BIGSERIAL,
    collection_id   TEXT NOT NULL,
    start_ts        TIMESTAMPTZ NOT NULL,
    end_ts          TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (collection_id, gap_id)
) PARTITION BY LIST (collection_id);

CREATE TABLE IF NOT EXISTS reasons (
    reason_id       BIGSERIAL,
    collection_id   TEXT NOT NULL,
    start_ts        TIMESTAMPTZ NOT NULL,
    end_ts          TIMESTAMPTZ NOT NULL,
    reason          TEXT NOT NULL,
    PRIMARY KEY (collection_id, reason_id)
) PARTITION BY LIST (collection_id);
"#;

pub async fn bootstrap(pool: &Pool) -> Result<(), StoreError> {
    let client = pool.get().await?;
    client.batch_execute(BOOTSTRAP_SQL).await?;
    info!("bootstrapped collections/gaps/reasons schema");
    Ok(())
}

/// Safely identifier-like name derived from a collection id, for use in
/// partition/constraint names. Collection ids are themselves restricted to
/// `short_name + "___" + sanitized_version`, but this guards against any
/// stray character reaching a `CREATE TABLE ... PARTITION OF` statement.
fn safe_suffix(collection_id: &str) -> String {
    collection_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Ensures both the `gaps` and `reasons` partitions exist for `collection_id`,
/// each with its overlap-exclusion constraint. Idempotent and safe under
/// concurrent callers: a losing racer's `CREATE TABLE` observes
/// `duplicate_table` (or the existence check below short-circuits first) and
/// the call still returns `Ok(())`.
///
/// Generic over `GenericClient` so registration can run this inside the same
/// transaction as the collection row insert (`Store::register_collection`),
/// or a caller can run it standalone against a plain pooled client.
pub async fn ensure_partitions<C: GenericClient>(
    client: &C,
    collection_id: &str,
) -> Result<(), StoreError> {
    let suffix = safe_suffix(collection_id);

    for (table, constraint_suffix) in [("gaps", "gaps"), ("reasons", "reasons")] {
        let partition_name = format!("{constraint_suffix}_{suffix}");
        let exists: bool = client
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM pg_class c
                    JOIN pg_namespace n ON n.oid = c.relnamespace
                    WHERE c.relname = $1 AND n.nspname = 'public'
                )",
                &[&partition_name],
            )
            .await?
            .get(0);

        if exists {
            debug!(partition = %partition_name, "partition already provisioned");
            continue;
        }

        let create_partition = format!(
            "CREATE TABLE IF NOT EXISTS {partition_name} PARTITION OF {table} FOR VALUES IN ($1)"
        );
        // `CREATE TABLE ... PARTITION OF` can't parameterize the partition
        // bound literal directly; the collection id has already been run
        // through `safe_suffix` for the table name, and is passed as a
        // literal here via format because `FOR VALUES IN` doesn't accept
        // bind parameters in this position either. Escape single quotes
        // defensively since collection ids may contain them in principle.
        let escaped = collection_id.replace('\'', "''");
        let create_partition = create_partition.replacen(
            "FOR VALUES IN ($1)",
            &format!("FOR VALUES IN ('{escaped}')"),
            1,
        );

        match client.batch_execute(&create_partition).await {
            Ok(()) => {}
            Err(err) if is_duplicate_table(&err) => {
                debug!(partition = %partition_name, "lost the race to provision partition");
                continue;
            }
            Err(err) => return Err(StoreError::Query(err)),
        }

        let constraint_name = format!("{partition_name}_no_overlap");
        let add_constraint = format!(
            "ALTER TABLE {partition_name} ADD CONSTRAINT {constraint_name} \
             EXCLUDE USING gist (tsrange(start_ts, end_ts) WITH &&)"
        );
        match client.batch_execute(&add_constraint).await {
            Ok(()) => {
                info!(partition = %partition_name, "provisioned partition");
            }
            Err(err) if is_duplicate_object(&err) => {
                debug!(partition = %partition_name, "exclusion constraint already present");
            }
            Err(err) => return Err(StoreError::Query(err)),
        }
    }

    Ok(())
}

/// Standalone variant for callers that only need a partition guaranteed and
/// hold no transaction of their own (e.g. a one-off backfill tool).
pub async fn ensure_partitions_standalone(pool: &Pool, collection_id: &str) -> Result<(), StoreError> {
    let client = pool.get().await?;
    ensure_partitions(&*client, collection_id).await
}

fn is_duplicate_table(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .map(|e| *e.code() == tokio_postgres::error::SqlState::DUPLICATE_TABLE)
        .unwrap_or(false)
}

fn is_duplicate_object(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .map(|e| *e.code() == tokio_postgres::error::SqlState::DUPLICATE_OBJECT)
        .unwrap_or(false)
}
