//! Property tests for the non-overlap and batching-commutativity invariants
//! of the split-on-add SQL in `Store::apply_ingest`, run against an
//! environment-provided Postgres. Each case skips (rather than fails) when
//! `PGHOST` isn't set, since proptest has no native notion of a skipped case.

mod support;

use std::collections::BTreeSet;

use chrono::Duration;
use gaps_types::{EventKind, TimeRange};
use proptest::prelude::*;
use support::{apply_batch, connect, register, ts, unique_collection_id};

fn day(n: i64) -> chrono::DateTime<chrono::Utc> {
    ts(2000, 1, 1, 0, 0, 0) + Duration::days(n)
}

/// A handful of distinct day-offsets, sorted; each names the start of a
/// disjoint one-day granule. Distinctness plus the fixed one-day width
/// guarantees no two generated granules overlap or touch each other.
fn day_offsets() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::btree_set(1i64..58, 1..6).prop_map(|set: BTreeSet<i64>| set.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// No matter how the disjoint granules are distributed across batches,
    /// the resulting gap set must never contain two overlapping rows, and no
    /// returned gap may overlap a granule that was actually ingested.
    #[test]
    fn ingest_never_produces_overlapping_or_covered_gaps(offsets in day_offsets()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = match connect().await {
                Some(store) => store,
                None => return Ok(()),
            };
            let id = unique_collection_id("PROPTEST");
            register(&store, &id, TimeRange::new(day(0), day(60))).await;

            for &offset in &offsets {
                let range = TimeRange::new(day(offset), day(offset + 1));
                apply_batch(&store, &id, EventKind::Ingest, &[range]).await;
            }

            let gaps = store.list_gaps(&id, None, 0, true).await.expect("list_gaps succeeds");
            for window in gaps.windows(2) {
                prop_assert!(
                    !window[0].range.overlaps(&window[1].range),
                    "adjacent returned gaps must never overlap: {:?} vs {:?}",
                    window[0].range,
                    window[1].range
                );
            }
            for row in &gaps {
                for &offset in &offsets {
                    let granule = TimeRange::new(day(offset), day(offset + 1));
                    prop_assert!(
                        !row.range.overlaps(&granule),
                        "a returned gap must never overlap an ingested granule: {:?} vs {:?}",
                        row.range,
                        granule
                    );
                }
            }
            Ok(())
        })?;
    }

    /// The same disjoint granules, applied as one batch or split across two
    /// batches at an arbitrary point, must converge on the same final gap
    /// set: the split algorithm is a set operation over whatever happens to
    /// be staged, independent of how the caller chose to batch it.
    #[test]
    fn ingest_batching_is_commutative(offsets in day_offsets(), split_at in 0usize..6) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let store = match connect().await {
                Some(store) => store,
                None => return Ok(()),
            };

            let extent = TimeRange::new(day(0), day(60));
            let ranges: Vec<TimeRange> = offsets.iter().map(|&o| TimeRange::new(day(o), day(o + 1))).collect();
            let split = split_at.min(ranges.len());

            let one_shot_id = unique_collection_id("PROPTEST");
            register(&store, &one_shot_id, extent).await;
            apply_batch(&store, &one_shot_id, EventKind::Ingest, &ranges).await;

            let split_id = unique_collection_id("PROPTEST");
            register(&store, &split_id, extent).await;
            apply_batch(&store, &split_id, EventKind::Ingest, &ranges[..split]).await;
            apply_batch(&store, &split_id, EventKind::Ingest, &ranges[split..]).await;

            let one_shot_gaps: Vec<TimeRange> = store
                .list_gaps(&one_shot_id, None, 0, true)
                .await
                .expect("list_gaps succeeds")
                .into_iter()
                .map(|row| row.range)
                .collect();
            let split_gaps: Vec<TimeRange> = store
                .list_gaps(&split_id, None, 0, true)
                .await
                .expect("list_gaps succeeds")
                .into_iter()
                .map(|row| row.range)
                .collect();

            prop_assert_eq!(one_shot_gaps, split_gaps);
            Ok(())
        })?;
    }
}
