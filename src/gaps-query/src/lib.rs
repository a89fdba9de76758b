// Copyright the gap-tracker authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Query surface: gap listing (C5) and reason annotation (C6), layered over
//! [`gaps_db::Store`]. The one piece of logic that doesn't belong in SQL --
//! substituting the far-future sentinel for "now" on the last returned row
//! only -- lives here, where wall-clock time is available.

use chrono::Utc;
use gaps_db::{ReasonRecord, Store};
use gaps_types::{substitute_sentinel, CollectionId, GapRow, Reason, TimeRange};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Store(#[from] gaps_db::StoreError),

    #[error("reason text must not be empty")]
    EmptyReasonText,
}

/// Lists a collection's gaps (optionally narrowed to `window`, `reasons`
/// included or excluded, short enough to pass `tolerance_secs`), with the
/// catalog's open-ended sentinel end-time replaced by the current wall-clock
/// time on the last row only -- every other row's end time is a real gap
/// boundary and is left untouched.
pub async fn list_gaps(
    store: &Store,
    collection_id: &CollectionId,
    window: Option<TimeRange>,
    tolerance_secs: i64,
    include_known: bool,
) -> Result<Vec<GapRow>, QueryError> {
    let mut rows = store
        .list_gaps(collection_id, window, tolerance_secs, include_known)
        .await?;

    if let Some(last) = rows.last_mut() {
        let now = Utc::now();
        last.range = TimeRange::new(last.range.start, substitute_sentinel(last.range.end, now));
    }

    Ok(rows)
}

/// Inserts a batch of reasons. Each insert is independent; an overlap
/// against an existing reason (R1) surfaces as a conflict for that entry via
/// the store's exclusion-violation classification, same as a gap conflict.
pub async fn add_reasons(store: &Store, collection_id: &CollectionId, reasons: &[(TimeRange, String)]) -> Result<(), QueryError> {
    let mut records = Vec::with_capacity(reasons.len());
    for (range, text) in reasons {
        if text.trim().is_empty() {
            return Err(QueryError::EmptyReasonText);
        }
        records.push(ReasonRecord {
            collection_id: collection_id.clone(),
            range: *range,
            text: text.clone(),
        });
    }
    store.add_reasons(&records).await?;
    Ok(())
}

pub async fn list_reasons(store: &Store, collection_id: &CollectionId, window: TimeRange) -> Result<Vec<Reason>, QueryError> {
    Ok(store.list_reasons(collection_id, window).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gaps_types::SENTINEL_END;

    #[test]
    fn sentinel_substitution_only_touches_the_last_row() {
        // This exercises the pure substitution logic `list_gaps` calls;
        // the store round-trip itself needs a running postgres instance
        // and is covered by the integration tests in `gaps-db`.
        let bounded_end = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let mut rows = vec![
            GapRow { range: TimeRange::new(bounded_end, *SENTINEL_END), reason: None },
            GapRow { range: TimeRange::new(*SENTINEL_END, *SENTINEL_END), reason: None },
        ];
        let now = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap();

        if let Some(last) = rows.last_mut() {
            last.range = TimeRange::new(last.range.start, substitute_sentinel(last.range.end, now));
        }

        assert_eq!(rows[0].range.end, *SENTINEL_END, "non-last row keeps the raw sentinel");
        assert_eq!(rows[1].range.end, now, "last row's sentinel is substituted");
    }
}
