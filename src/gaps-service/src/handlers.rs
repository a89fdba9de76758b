use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use gaps_types::{CollectionId, TimeRange};
use serde::Deserialize;
use serde_json::json;

use crate::bootstrap::AppState;
use crate::envelope::{HttpEnvelope, HttpResponse};
use crate::error::ApiError;

/// Largest JSON response body returned inline before this crate spills it to
/// object storage and returns a presigned URL instead.
const MAX_INLINE_BODY_BYTES: usize = 6 * 1024 * 1024;
const PRESIGNED_URL_TTL_SECS: u64 = 60 * 60;

#[derive(Deserialize)]
struct RegisterCollectionsRequest {
    collections: Vec<RegisterCollectionEntry>,
    #[serde(default)]
    backfill: Option<String>,
}

#[derive(Deserialize)]
struct RegisterCollectionEntry {
    short_name: String,
    version: String,
    tolerance: Option<i64>,
}

/// `POST /collections`: registers each listed collection, triggering its
/// backfill. Returns 200 even when every collection already existed; a
/// per-collection backfill failure is reported in the body rather than
/// failing the whole request, since other collections in the same call may
/// have succeeded.
pub async fn register_collections(state: &AppState, envelope: &HttpEnvelope) -> Result<HttpResponse, ApiError> {
    let request: RegisterCollectionsRequest =
        serde_json::from_value(envelope.body_json()?).map_err(|e| ApiError::BadRequest(format!("malformed request body: {e}")))?;

    if request.collections.is_empty() {
        return Err(ApiError::BadRequest("`collections` must not be empty".to_string()));
    }
    for entry in &request.collections {
        if entry.short_name.trim().is_empty() || entry.version.trim().is_empty() {
            return Err(ApiError::BadRequest("each collection requires `short_name` and `version`".to_string()));
        }
    }

    let force = request.backfill.as_deref().map(|v| v.eq_ignore_ascii_case("force")).unwrap_or(false);

    let registry = gaps_registry::Registry::new(
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

    let mut results = Vec::with_capacity(request.collections.len());
    let mut failure: Option<String> = None;
    for entry in request.collections {
        let req = gaps_registry::RegisterRequest {
            short_name: entry.short_name,
            raw_version: entry.version,
            tolerance: entry.tolerance,
        };
        let outcome = registry.register(req, force).await?;
        if let gaps_registry::RegisterOutcome::BackfillFailed { collection_id, detail } = &outcome {
            failure.get_or_insert_with(|| format!("backfill failed for {collection_id}: {detail}"));
        }
        results.push(outcome_label(&outcome));
    }

    if let Some(detail) = failure {
        return Err(ApiError::DownstreamFailure(detail));
    }

    Ok(HttpResponse::json(200, json!({ "collections": results })))
}

fn outcome_label(outcome: &gaps_registry::RegisterOutcome) -> &'static str {
    match outcome {
        gaps_registry::RegisterOutcome::Registered(_) => "registered",
        gaps_registry::RegisterOutcome::Rebackfilled(_) => "rebackfilled",
        gaps_registry::RegisterOutcome::AlreadyRegistered => "already_registered",
        gaps_registry::RegisterOutcome::BackfillFailed { .. } => "backfill_failed",
    }
}

/// `GET /gaps`: the gap-query endpoint. `tolerance` is a `true`/`false` flag
/// selecting whether the collection's configured tolerance (read from the
/// tolerance table) or `0` is applied; it is never a raw second count on this
/// path.
pub async fn get_gaps(state: &AppState, envelope: &HttpEnvelope) -> Result<HttpResponse, ApiError> {
    let query = envelope.query();
    let collection_id = collection_id_from_query(&query)?;
    let window = optional_window(&query)?;
    let use_tolerance = parse_bool_flag(&query, "tolerance")?;
    let include_known = parse_bool_flag(&query, "knownGap")?;

    let tolerance_secs = if use_tolerance {
        lookup_tolerance(state, &query).await?
    } else {
        0
    };

    let rows = gaps_query::list_gaps(&state.store, &collection_id, window, tolerance_secs, include_known).await?;

    if rows.is_empty() {
        return Ok(HttpResponse::json(200, json!({ "message": "No qualifying time gaps found." })));
    }

    let time_gaps: Vec<_> = rows
        .iter()
        .map(|row| {
            json!({
                "start": row.range.start.to_rfc3339(),
                "end": row.range.end.to_rfc3339(),
                "reason": row.reason,
            })
        })
        .collect();
    let payload = json!({ "timeGaps": time_gaps, "gapTolerance": tolerance_secs });

    if payload.to_string().len() <= MAX_INLINE_BODY_BYTES {
        return Ok(HttpResponse::json(200, payload));
    }

    let key = format!("gap-responses/{}/{}.json", collection_id, uuid::Uuid::new_v4());
    state
        .s3
        .put_object()
        .bucket(&state.config.gap_response_bucket)
        .key(&key)
        .body(payload.to_string().into_bytes().into())
        .content_type("application/json")
        .send()
        .await
        .map_err(|e| ApiError::DownstreamFailure(format!("failed to stage oversized response: {e}")))?;

    let presigning_config = aws_sdk_s3::presigning::PresigningConfig::expires_in(std::time::Duration::from_secs(PRESIGNED_URL_TTL_SECS))
        .map_err(|e| ApiError::DownstreamFailure(e.to_string()))?;
    let presigned = state
        .s3
        .get_object()
        .bucket(&state.config.gap_response_bucket)
        .key(&key)
        .presigned(presigning_config)
        .await
        .map_err(|e| ApiError::DownstreamFailure(format!("failed to presign oversized response: {e}")))?;

    Ok(HttpResponse::json(
        200,
        json!({
            "message": "response exceeds inline size limit, fetch from presigned_url",
            "presigned_url": presigned.uri().to_string(),
        }),
    ))
}

async fn lookup_tolerance(state: &AppState, query: &std::collections::HashMap<String, String>) -> Result<i64, ApiError> {
    use aws_sdk_dynamodb::types::AttributeValue;

    let short_name = require_param(query, "short_name")?;
    let version = require_param(query, "version")?;

    let item = state
        .dynamodb
        .get_item()
        .table_name(&state.config.tolerance_table_name)
        .key("short_name", AttributeValue::S(short_name.to_string()))
        .key("version", AttributeValue::S(version.to_string()))
        .send()
        .await
        .map_err(|e| ApiError::DownstreamFailure(format!("tolerance lookup failed: {e}")))?;

    let tolerance = item
        .item()
        .and_then(|attrs| attrs.get("tolerance_seconds"))
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<i64>().ok())
        .unwrap_or(0);
    Ok(tolerance)
}

#[derive(Deserialize)]
struct AddReasonsRequest {
    reasons: Vec<ReasonEntry>,
}

#[derive(Deserialize)]
struct ReasonEntry {
    shortname: String,
    version: String,
    start_ts: DateTime<Utc>,
    end_ts: DateTime<Utc>,
    reason: String,
}

/// `POST /reasons`: attaches free-text explanations to time ranges. Each
/// entry may target a different collection.
pub async fn add_reasons(state: &AppState, envelope: &HttpEnvelope) -> Result<HttpResponse, ApiError> {
    let request: AddReasonsRequest =
        serde_json::from_value(envelope.body_json()?).map_err(|e| ApiError::BadRequest(format!("malformed request body: {e}")))?;
    if request.reasons.is_empty() {
        return Err(ApiError::BadRequest("`reasons` must not be empty".to_string()));
    }

    for entry in request.reasons {
        let collection_id = CollectionId::new(&entry.shortname, &entry.version);
        let range = TimeRange::new(entry.start_ts, entry.end_ts);
        gaps_query::add_reasons(&state.store, &collection_id, &[(range, entry.reason)]).await?;
    }

    Ok(HttpResponse::json(201, json!({ "message": "reasons recorded" })))
}

/// `GET /reasons`: lists reasons overlapping a window for one collection.
pub async fn get_reasons(state: &AppState, envelope: &HttpEnvelope) -> Result<HttpResponse, ApiError> {
    let query = envelope.query();
    let collection_id = collection_id_from_query(&query)?;
    let window = required_window(&query)?;

    let reasons = gaps_query::list_reasons(&state.store, &collection_id, window).await?;
    let body: Vec<_> = reasons
        .iter()
        .map(|r| {
            json!({
                "start_time": r.range.start.to_rfc3339(),
                "end_time": r.range.end.to_rfc3339(),
                "reason": r.text,
            })
        })
        .collect();

    Ok(HttpResponse::json(200, json!({ "reasons": body })))
}

/// `POST /reports`: packages a collection's current gap rows as a CSV object
/// and returns its key. Not part of the distilled interface contract but
/// carried over from the reporting lambdas the original system shipped.
pub async fn generate_report(state: &AppState, envelope: &HttpEnvelope) -> Result<HttpResponse, ApiError> {
    let query = envelope.query();
    let collection_id = collection_id_from_query(&query)?;
    let window = optional_window(&query)?;
    let include_known = parse_bool_flag(&query, "knownGap")?;

    let key = gaps_report::generate_report(&state.store, &state.s3, &state.config.gap_report_bucket, &collection_id, window, 0, include_known)
        .await
        .map_err(|e| ApiError::DownstreamFailure(e.to_string()))?;

    Ok(HttpResponse::json(200, json!({ "key": key })))
}

fn require_param<'a>(query: &'a std::collections::HashMap<String, String>, name: &str) -> Result<&'a str, ApiError> {
    query
        .get(name)
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing required query parameter `{name}`")))
}

fn collection_id_from_query(query: &std::collections::HashMap<String, String>) -> Result<CollectionId, ApiError> {
    let short_name = require_param(query, "short_name")?;
    let version = require_param(query, "version")?;
    Ok(CollectionId::new(short_name, version))
}

fn parse_bool_flag(query: &std::collections::HashMap<String, String>, name: &str) -> Result<bool, ApiError> {
    match query.get(name).map(|s| s.as_str()) {
        None => Ok(false),
        Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(ApiError::BadRequest(format!("`{name}` must be `true` or `false`, got `{other}`"))),
    }
}

fn parse_date_boundary(raw: &str, param: &str) -> Result<DateTime<Utc>, ApiError> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("`{param}` must be in `YYYY-MM-DD` format, got `{raw}`")))?;
    Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is always valid")))
}

fn optional_window(query: &std::collections::HashMap<String, String>) -> Result<Option<TimeRange>, ApiError> {
    match (query.get("startDate"), query.get("endDate")) {
        (None, None) => Ok(None),
        _ => required_window(query).map(Some),
    }
}

fn required_window(query: &std::collections::HashMap<String, String>) -> Result<TimeRange, ApiError> {
    let start_raw = require_param(query, "startDate")?;
    let end_raw = require_param(query, "endDate")?;
    let start = parse_date_boundary(start_raw, "startDate")?;
    let end = parse_date_boundary(end_raw, "endDate")?;
    if start > end {
        return Err(ApiError::BadRequest("`startDate` must not be after `endDate`".to_string()));
    }
    Ok(TimeRange::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn bool_flag_defaults_to_false_when_absent() {
        assert_eq!(parse_bool_flag(&query(&[]), "tolerance").unwrap(), false);
    }

    #[test]
    fn bool_flag_rejects_non_boolean_values() {
        assert!(parse_bool_flag(&query(&[("tolerance", "yes")]), "tolerance").is_err());
    }

    #[test]
    fn date_boundary_rejects_malformed_dates() {
        assert!(parse_date_boundary("2000/01/01", "startDate").is_err());
        assert!(parse_date_boundary("2000-01-01", "startDate").is_ok());
    }

    #[test]
    fn window_rejects_start_after_end() {
        let q = query(&[("startDate", "2000-06-01"), ("endDate", "2000-01-01")]);
        assert!(required_window(&q).is_err());
    }

    #[test]
    fn window_accepts_equal_bounds() {
        let q = query(&[("startDate", "2000-01-01"), ("endDate", "2000-01-01")]);
        assert!(required_window(&q).is_ok());
    }

    #[test]
    fn optional_window_is_none_when_both_absent() {
        assert_eq!(optional_window(&query(&[])).unwrap(), None);
    }
}
