// Copyright the gap-tracker authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0

//! Report packaging (component C10): runs the same filtered query the HTTP
//! query surface does, serializes it as CSV, and uploads it to the
//! configured report bucket. No invariants of its own.

mod error;

pub use error::ReportError;

use aws_sdk_s3::primitives::ByteStream;
use gaps_db::Store;
use gaps_types::{CollectionId, TimeRange};

/// Runs `list_gaps` for `collection_id` and uploads the result as a CSV
/// object under `reports/<collection_id>/<uuid>.csv` in `bucket`, returning
/// the object key.
pub async fn generate_report(
    store: &Store,
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    collection_id: &CollectionId,
    window: Option<TimeRange>,
    tolerance_secs: i64,
    include_known: bool,
) -> Result<String, ReportError> {
    let rows = gaps_query::list_gaps(store, collection_id, window, tolerance_secs, include_known).await?;

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(["start_ts", "end_ts", "reason"])?;
    for row in &rows {
        writer.write_record([
            row.range.start.to_rfc3339(),
            row.range.end.to_rfc3339(),
            row.reason.clone().unwrap_or_default(),
        ])?;
    }
    let csv_bytes = writer.into_inner().map_err(|e| e.into_error())?;

    let key = format!("reports/{}/{}.csv", collection_id, uuid::Uuid::new_v4());
    s3.put_object()
        .bucket(bucket)
        .key(&key)
        .body(ByteStream::from(csv_bytes))
        .content_type("text/csv")
        .send()
        .await?;

    Ok(key)
}
