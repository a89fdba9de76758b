use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use gaps_types::{Collection, CollectionId, GapRow, Reason, TimeRange};
use tokio_postgres::GenericClient;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::schema;

/// A single granule time range staged for ingest or delete, keyed by the
/// collection it belongs to.
#[derive(Clone, Debug)]
pub struct InputRecord {
    pub collection_id: CollectionId,
    pub range: TimeRange,
}

/// A reason to insert: collection, range, and free-text explanation.
#[derive(Clone, Debug)]
pub struct ReasonRecord {
    pub collection_id: CollectionId,
    pub range: TimeRange,
    pub text: String,
}

/// Handle to the partitioned `gaps`/`reasons` storage. Cheaply cloneable --
/// it only wraps a connection pool.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    pub fn new(pool: Pool) -> Self {
        Store { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Registers a collection: provisions its partitions, inserts the
    /// `collections` row, and inserts the initial full-extent gap, all in one
    /// transaction so a crash midway never leaves a collection half set up.
    pub async fn register_collection(&self, collection: &Collection) -> Result<(), StoreError> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;

        schema::ensure_partitions(&txn, collection.id.as_str()).await?;

        txn.execute(
            "INSERT INTO collections (collection_id, extent_start, extent_end) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (collection_id) DO NOTHING",
            &[
                &collection.id.as_str(),
                &collection.extent.start,
                &collection.extent.end,
            ],
        )
        .await
        .map_err(|e| StoreError::from_pg(collection.id.as_str(), e))?;

        let initial = collection.initial_gap();
        txn.execute(
            "INSERT INTO gaps (collection_id, start_ts, end_ts) VALUES ($1, $2, $3)",
            &[&collection.id.as_str(), &initial.start, &initial.end],
        )
        .await
        .map_err(|e| StoreError::from_pg(collection.id.as_str(), e))?;

        txn.commit().await?;
        info!(collection_id = %collection.id, "registered collection");
        Ok(())
    }

    pub async fn collection_exists(&self, collection_id: &CollectionId) -> Result<bool, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM collections WHERE collection_id = $1)",
                &[&collection_id.as_str()],
            )
            .await?;
        Ok(row.get(0))
    }

    pub async fn list_collections(&self) -> Result<Vec<Collection>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT collection_id, extent_start, extent_end FROM collections ORDER BY collection_id",
                &[],
            )
            .await?;
        rows.into_iter()
            .map(|row| {
                let id: String = row.get(0);
                let start: DateTime<Utc> = row.get(1);
                let end: DateTime<Utc> = row.get(2);
                Ok(Collection {
                    id: id
                        .parse()
                        .map_err(|e: gaps_types::CollectionIdError| StoreError::InvalidCollectionId(e.to_string()))?,
                    extent: TimeRange::new(start, end),
                })
            })
            .collect()
    }

    /// Inserts a single gap directly. Used by registration (the initial gap)
    /// and by tests; the engine's batch path uses `apply_ingest`/
    /// `apply_delete` instead since those operate on a whole staged batch at
    /// once.
    pub async fn insert_gap(
        &self,
        collection_id: &CollectionId,
        range: TimeRange,
    ) -> Result<i64, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "INSERT INTO gaps (collection_id, start_ts, end_ts) VALUES ($1, $2, $3) \
                 RETURNING gap_id",
                &[&collection_id.as_str(), &range.start, &range.end],
            )
            .await
            .map_err(|e| StoreError::from_pg(collection_id.as_str(), e))?;
        Ok(row.get(0))
    }

    pub async fn delete_gaps(&self, collection_id: &CollectionId, ids: &[i64]) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "DELETE FROM gaps WHERE collection_id = $1 AND gap_id = ANY($2)",
                &[&collection_id.as_str(), &ids],
            )
            .await?;
        Ok(())
    }

    /// Begins a per-collection transaction holding the collection's advisory
    /// lock for the lifetime of the transaction, per §4.4.2: serializes
    /// concurrent batches for the same collection without blocking other
    /// collections' batches.
    pub async fn begin_collection_txn<'a>(
        client: &'a mut deadpool_postgres::Object,
        collection_id: &CollectionId,
    ) -> Result<tokio_postgres::Transaction<'a>, StoreError> {
        let txn = client.transaction().await?;
        txn.execute(
            "SELECT pg_advisory_xact_lock(hashtext($1))",
            &[&collection_id.as_str()],
        )
        .await?;
        Ok(txn)
    }

    pub async fn checkout(&self) -> Result<deadpool_postgres::Object, StoreError> {
        Ok(self.pool.get().await?)
    }

    /// Stages a batch of granule ranges into a transaction-local temporary
    /// table via `COPY`. The table is dropped automatically at transaction
    /// end (`ON COMMIT DROP`).
    pub async fn stage_records(
        txn: &tokio_postgres::Transaction<'_>,
        records: &[InputRecord],
    ) -> Result<(), StoreError> {
        txn.batch_execute(
            "CREATE TEMPORARY TABLE staged_ranges (start_ts TIMESTAMPTZ, end_ts TIMESTAMPTZ) \
             ON COMMIT DROP",
        )
        .await?;

        let sink = txn
            .copy_in("COPY staged_ranges (start_ts, end_ts) FROM STDIN BINARY")
            .await?;
        let writer = tokio_postgres::binary_copy::BinaryCopyInWriter::new(
            sink,
            &[tokio_postgres::types::Type::TIMESTAMPTZ, tokio_postgres::types::Type::TIMESTAMPTZ],
        );
        futures::pin_mut!(writer);
        for record in records {
            writer
                .as_mut()
                .write(&[&record.range.start, &record.range.end])
                .await?;
        }
        writer.as_mut().finish().await?;
        Ok(())
    }

    /// Applies an ingest batch already staged by [`Store::stage_records`]:
    /// subtracts the union of staged granule ranges from every overlapping
    /// gap, as a single set-level operation. Gaps untouched by the batch are
    /// never read or rewritten.
    pub async fn apply_ingest(
        txn: &tokio_postgres::Transaction<'_>,
        collection_id: &CollectionId,
    ) -> Result<(), StoreError> {
        txn.execute(
            "WITH granule_agg AS (
                SELECT range_agg(tsrange(start_ts, end_ts)) AS multi FROM staged_ranges
            ),
            affected AS (
                SELECT g.gap_id, tsrange(g.start_ts, g.end_ts) AS rng
                FROM gaps g, granule_agg
                WHERE g.collection_id = $1
                  AND granule_agg.multi IS NOT NULL
                  AND tsrange(g.start_ts, g.end_ts) && granule_agg.multi
            ),
            removed AS (
                DELETE FROM gaps WHERE gap_id IN (SELECT gap_id FROM affected)
            ),
            remainder AS (
                SELECT unnest(tsmultirange(a.rng) - granule_agg.multi) AS piece
                FROM affected a, granule_agg
            )
            INSERT INTO gaps (collection_id, start_ts, end_ts)
            SELECT $1, lower(piece), upper(piece)
            FROM remainder
            WHERE NOT isempty(piece)",
            &[&collection_id.as_str()],
        )
        .await
        .map_err(|e| StoreError::from_pg(collection_id.as_str(), e))?;
        Ok(())
    }

    /// Applies a delete batch already staged by [`Store::stage_records`]:
    /// rounds each staged end up to the next whole second, logs (but does not
    /// fail on) spurious overlaps against existing gaps, then merges the
    /// staged ranges with every overlapping-or-adjacent gap into the smallest
    /// equivalent set of gap rows.
    pub async fn apply_delete(
        txn: &tokio_postgres::Transaction<'_>,
        collection_id: &CollectionId,
    ) -> Result<(), StoreError> {
        let spurious = txn
            .query(
                "SELECT g.gap_id, g.start_ts, g.end_ts
                 FROM gaps g, staged_ranges s
                 WHERE g.collection_id = $1
                   AND tsrange(g.start_ts, g.end_ts) && tsrange(
                         s.start_ts,
                         date_trunc('second', s.end_ts) + interval '1 second'
                       )",
                &[&collection_id.as_str()],
            )
            .await?;
        for row in &spurious {
            let gap_id: i64 = row.get(0);
            warn!(
                collection_id = %collection_id,
                gap_id,
                "delete batch overlaps an existing gap; merging anyway"
            );
        }

        txn.execute(
            "WITH input_ranges AS (
                SELECT tsrange(start_ts, date_trunc('second', end_ts) + interval '1 second') AS rng
                FROM staged_ranges
            ),
            affected AS (
                SELECT g.gap_id, tsrange(g.start_ts, g.end_ts) AS rng
                FROM gaps g, input_ranges ir
                WHERE g.collection_id = $1
                  AND (
                    tsrange(g.start_ts, g.end_ts) && ir.rng
                    OR tsrange(g.start_ts, g.end_ts) -|- ir.rng
                  )
            ),
            removed AS (
                DELETE FROM gaps WHERE gap_id IN (SELECT gap_id FROM affected)
            ),
            all_ranges AS (
                SELECT rng FROM affected
                UNION ALL
                SELECT rng FROM input_ranges
            ),
            merged AS (
                SELECT unnest(range_agg(rng)) AS piece FROM all_ranges
            )
            INSERT INTO gaps (collection_id, start_ts, end_ts)
            SELECT $1, lower(piece), upper(piece) FROM merged WHERE NOT isempty(piece)",
            &[&collection_id.as_str()],
        )
        .await
        .map_err(|e| StoreError::from_pg(collection_id.as_str(), e))?;
        Ok(())
    }

    pub async fn add_reasons(&self, records: &[ReasonRecord]) -> Result<(), StoreError> {
        let mut client = self.pool.get().await?;
        let txn = client.transaction().await?;
        for record in records {
            txn.execute(
                "INSERT INTO reasons (collection_id, start_ts, end_ts, reason) \
                 VALUES ($1, $2, $3, $4)",
                &[
                    &record.collection_id.as_str(),
                    &record.range.start,
                    &record.range.end,
                    &record.text,
                ],
            )
            .await
            .map_err(|e| StoreError::from_pg(record.collection_id.as_str(), e))?;
        }
        txn.commit().await?;
        Ok(())
    }

    pub async fn list_reasons(
        &self,
        collection_id: &CollectionId,
        window: TimeRange,
    ) -> Result<Vec<Reason>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT reason_id, start_ts, end_ts, reason FROM reasons \
                 WHERE collection_id = $1 AND tsrange(start_ts, end_ts) && tsrange($2, $3, '[]') \
                 ORDER BY start_ts",
                &[&collection_id.as_str(), &window.start, &window.end],
            )
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Reason {
                id: row.get(0),
                collection_id: collection_id.clone(),
                range: TimeRange::new(row.get(1), row.get(2)),
                text: row.get(3),
            })
            .collect())
    }

    /// The query surface's core read path (§4.5): every sub-interval of
    /// `collection_id`'s gaps, split against overlapping reasons so each
    /// emitted row carries either a reason (the intersection with that
    /// reason) or `None` (the portion left over). `window` restricts to gaps
    /// overlapping `[window.start, window.end]` (closed, unlike the half-open
    /// gap/reason ranges themselves). `tolerance_secs` of `0` passes
    /// everything; `include_known = false` drops every row with a reason.
    ///
    /// The caller is responsible for substituting the far-future sentinel on
    /// the *last* returned row only -- this function returns raw storage
    /// values.
    pub async fn list_gaps(
        &self,
        collection_id: &CollectionId,
        window: Option<TimeRange>,
        tolerance_secs: i64,
        include_known: bool,
    ) -> Result<Vec<GapRow>, StoreError> {
        let client = self.pool.get().await?;
        let (window_start, window_end): (Option<DateTime<Utc>>, Option<DateTime<Utc>>) =
            match window {
                Some(w) => (Some(w.start), Some(w.end)),
                None => (None, None),
            };

        let rows = client
            .query(
                "WITH reason_overlap AS (
                    SELECT g.gap_id,
                           tsrange(GREATEST(g.start_ts, r.start_ts), LEAST(g.end_ts, r.end_ts)) AS piece,
                           r.reason AS reason
                    FROM gaps g
                    JOIN reasons r
                      ON r.collection_id = g.collection_id
                     AND tsrange(r.start_ts, r.end_ts) && tsrange(g.start_ts, g.end_ts)
                    WHERE g.collection_id = $1
                ),
                reason_multi AS (
                    SELECT gap_id, range_agg(piece) AS covered
                    FROM reason_overlap
                    GROUP BY gap_id
                ),
                unknown_pieces AS (
                    SELECT g.gap_id,
                           unnest(tsmultirange(tsrange(g.start_ts, g.end_ts)) - COALESCE(rm.covered, tsmultirange())) AS piece,
                           NULL::text AS reason
                    FROM gaps g
                    LEFT JOIN reason_multi rm ON rm.gap_id = g.gap_id
                    WHERE g.collection_id = $1
                ),
                all_pieces AS (
                    SELECT gap_id, piece, reason FROM reason_overlap
                    UNION ALL
                    SELECT gap_id, piece, reason FROM unknown_pieces WHERE NOT isempty(piece)
                )
                SELECT DISTINCT lower(piece) AS piece_start, upper(piece) AS piece_end, reason
                FROM all_pieces
                WHERE ($2::timestamptz IS NULL OR piece && tsrange($2, $3, '[]'))
                  AND (upper(piece) - lower(piece)) >= ($4::text || ' seconds')::interval
                  AND ($5::boolean OR reason IS NULL)
                ORDER BY piece_start",
                &[
                    &collection_id.as_str(),
                    &window_start,
                    &window_end,
                    &tolerance_secs,
                    &include_known,
                ],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let start: DateTime<Utc> = row.get(0);
                let end: DateTime<Utc> = row.get(1);
                let reason: Option<String> = row.get(2);
                GapRow {
                    range: TimeRange::new(start, end),
                    reason,
                }
            })
            .collect())
    }
}
