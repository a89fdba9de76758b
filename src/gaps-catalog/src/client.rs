use std::time::Duration;

use chrono::{DateTime, Utc};
use gaps_types::{CollectionId, TimeRange, SENTINEL_END};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::CatalogError;

const GRANULE_PAGE_SIZE: u32 = 2000;
const MAX_RETRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Which CMR deployment to talk to. `Prod` hits the public endpoint; any
/// other value is treated as the name of a non-prod CMR environment (`uat`,
/// `sit`) and slotted into the subdomain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogEnv {
    Prod,
    Other(String),
}

impl CatalogEnv {
    pub fn from_str_env(value: &str) -> Self {
        if value.eq_ignore_ascii_case("prod") {
            CatalogEnv::Prod
        } else {
            CatalogEnv::Other(value.to_lowercase())
        }
    }

    fn search_base(&self) -> String {
        match self {
            CatalogEnv::Prod => "https://cmr.earthdata.nasa.gov/search".to_string(),
            CatalogEnv::Other(env) => format!("https://cmr.{env}.earthdata.nasa.gov/search"),
        }
    }
}

/// A single granule as surfaced by the granule search endpoint: the part the
/// ingest event pipeline actually needs, not the full CMR granule record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GranuleSummary {
    pub id: String,
    pub range: TimeRange,
}

/// Thin wrapper over a `reqwest::Client` that knows how to ask CMR for a
/// collection's temporal extent and for a collection's granules within a
/// window, paginated via the `CMR-Search-After` header.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    env: CatalogEnv,
}

impl CatalogClient {
    pub fn new(env: CatalogEnv) -> Result<Self, CatalogError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(CatalogClient { http, env })
    }

    /// Looks up a collection's declared temporal extent. The far-future
    /// sentinel stands in for an open-ended `EndingDateTime`.
    pub async fn collection_extent(&self, collection_id: &CollectionId) -> Result<TimeRange, CatalogError> {
        let (short_name, version) = collection_id
            .split()
            .map_err(|_| CatalogError::NotFound(collection_id.to_string()))?;
        let version = version.replace('_', ".");

        let url = format!("{}/collections.umm_json_v1_4", self.env.search_base());
        debug!(url = %url, short_name, version, "requesting collection temporal extent");

        let response = self
            .http
            .get(&url)
            .query(&[("short_name", short_name), ("version", version.as_str())])
            .send()
            .await?;
        let body: UmmCollectionsResponse = response.json().await?;

        let item = body
            .items
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::NotFound(collection_id.to_string()))?;
        let extent = item
            .umm
            .temporal_extents
            .into_iter()
            .next()
            .and_then(|te| te.range_date_times.into_iter().next())
            .ok_or_else(|| CatalogError::MissingExtent(collection_id.to_string()))?;

        let end = extent.ending_date_time.unwrap_or(*SENTINEL_END);
        Ok(TimeRange::new(extent.beginning_date_time, end))
    }

    /// Returns the total number of granules CMR has for a collection, read
    /// from the `CMR-Hits` response header on a zero-page-size query. Used
    /// to size the backfill producer/consumer pool before any granule is
    /// actually fetched.
    pub async fn granule_hits(&self, short_name: &str, version: &str) -> Result<u64, CatalogError> {
        let url = format!("{}/granules.json", self.env.search_base());
        let response = self
            .http
            .get(&url)
            .query(&[("short_name", short_name), ("version", version), ("page_size", "0")])
            .send()
            .await?;
        let hits = response
            .headers()
            .get("CMR-Hits")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        Ok(hits)
    }

    /// Fetches every granule for `short_name`/`version` whose temporal
    /// coverage falls in `window`, streaming results into `tx` as they're
    /// paginated. Returns once CMR stops returning a `CMR-Search-After`
    /// header or an empty page. Each page is retried up to `MAX_RETRIES`
    /// times with `attempt^2` second backoff before the whole call fails.
    pub async fn search_granules(
        &self,
        short_name: &str,
        version: &str,
        window: TimeRange,
        tx: mpsc::Sender<GranuleSummary>,
    ) -> Result<u64, CatalogError> {
        let url = format!("{}/granules.json", self.env.search_base());
        let temporal = format!(
            "{},{}",
            window.start.to_rfc3339(),
            window.end.to_rfc3339()
        );

        let mut search_after: Option<String> = None;
        let mut total: u64 = 0;

        loop {
            let page = self
                .fetch_granule_page(&url, short_name, version, &temporal, search_after.as_deref())
                .await?;

            if page.entries.is_empty() {
                return Ok(total);
            }

            for entry in page.entries {
                let Some(summary) = entry.into_summary() else {
                    continue;
                };
                total += 1;
                if tx.send(summary).await.is_err() {
                    // Consumer side shut down; nothing left to do.
                    return Ok(total);
                }
            }

            match page.search_after {
                Some(next) => search_after = Some(next),
                None => return Ok(total),
            }
        }
    }

    async fn fetch_granule_page(
        &self,
        url: &str,
        short_name: &str,
        version: &str,
        temporal: &str,
        search_after: Option<&str>,
    ) -> Result<GranulePage, CatalogError> {
        let mut last_err: Option<String> = None;

        for attempt in 0..=MAX_RETRIES {
            let mut request = self.http.get(url).query(&[
                ("short_name", short_name),
                ("version", version),
                ("page_size", &GRANULE_PAGE_SIZE.to_string()),
                ("temporal", temporal),
            ]);
            if let Some(sa) = search_after {
                request = request.header("CMR-Search-After", sa);
            }

            let outcome = request.send().await;
            match outcome {
                Ok(response) if response.status().is_success() => {
                    let next = response
                        .headers()
                        .get("CMR-Search-After")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let feed: GranuleFeedResponse = response.json().await?;
                    return Ok(GranulePage {
                        entries: feed.feed.entry,
                        search_after: next,
                    });
                }
                Ok(response) => {
                    last_err = Some(format!("HTTP {}", response.status()));
                }
                Err(err) => {
                    last_err = Some(err.to_string());
                }
            }

            if attempt < MAX_RETRIES {
                let backoff = Duration::from_secs((attempt * attempt) as u64);
                warn!(attempt, ?backoff, error = ?last_err, "retrying granule page fetch");
                sleep(backoff).await;
            }
        }

        Err(CatalogError::RetriesExhausted(
            format!("{short_name}___{version}"),
            MAX_RETRIES,
            last_err.unwrap_or_default(),
        ))
    }
}

struct GranulePage {
    entries: Vec<GranuleEntry>,
    search_after: Option<String>,
}

#[derive(Deserialize)]
struct UmmCollectionsResponse {
    items: Vec<UmmItem>,
}

#[derive(Deserialize)]
struct UmmItem {
    umm: UmmCore,
}

#[derive(Deserialize)]
struct UmmCore {
    #[serde(rename = "TemporalExtents")]
    temporal_extents: Vec<TemporalExtentJson>,
}

#[derive(Deserialize)]
struct TemporalExtentJson {
    #[serde(rename = "RangeDateTimes")]
    range_date_times: Vec<RangeDateTimeJson>,
}

#[derive(Deserialize)]
struct RangeDateTimeJson {
    #[serde(rename = "BeginningDateTime")]
    beginning_date_time: DateTime<Utc>,
    #[serde(rename = "EndingDateTime")]
    ending_date_time: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct GranuleFeedResponse {
    feed: GranuleFeed,
}

#[derive(Deserialize)]
struct GranuleFeed {
    entry: Vec<GranuleEntry>,
}

#[derive(Deserialize)]
struct GranuleEntry {
    id: String,
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
}

impl GranuleEntry {
    fn into_summary(self) -> Option<GranuleSummary> {
        let start = self.time_start?;
        let end = self.time_end?;
        Some(GranuleSummary {
            id: self.id,
            range: TimeRange::new(start, end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prod_env_uses_public_endpoint() {
        assert_eq!(
            CatalogEnv::Prod.search_base(),
            "https://cmr.earthdata.nasa.gov/search"
        );
    }

    #[test]
    fn non_prod_env_slots_into_subdomain() {
        assert_eq!(
            CatalogEnv::from_str_env("UAT").search_base(),
            "https://cmr.uat.earthdata.nasa.gov/search"
        );
    }
}
