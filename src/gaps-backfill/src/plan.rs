use gaps_types::TimeRange;

/// Producer/consumer sizing for one collection's backfill, derived from its
/// granule count: roughly one producer per 20,000 granules (10 pages of 2000
/// at a time), capped at `max_producers`, with `consumer_ratio` consumers
/// per producer.
#[derive(Clone, Debug, PartialEq)]
pub struct BackfillPlan {
    pub producer_windows: Vec<TimeRange>,
    pub n_consumers: usize,
    pub queue_capacity: usize,
    pub total_granules: u64,
}

const GRANULES_PER_PAGE: f64 = 2000.0;
const PAGES_PER_PRODUCER: f64 = 10.0;

pub fn plan(total_granules: u64, extent: TimeRange, max_producers: usize, consumer_ratio: f64) -> BackfillPlan {
    let n_producers = ((total_granules as f64) / (GRANULES_PER_PAGE * PAGES_PER_PRODUCER))
        .max(1.0)
        .min(max_producers as f64)
        .round() as usize;
    let n_consumers = ((n_producers as f64) * consumer_ratio).round().max(1.0) as usize;
    let queue_capacity = n_producers * 2 * GRANULES_PER_PAGE as usize;

    BackfillPlan {
        producer_windows: split_windows(extent, n_producers),
        n_consumers,
        queue_capacity,
        total_granules,
    }
}

/// Splits `extent` into `n` equal-width, contiguous sub-windows covering it
/// exactly. The last window's end is pinned to `extent.end` rather than
/// computed from the step size, so integer/float rounding in the earlier
/// windows never drops the final slice of coverage.
fn split_windows(extent: TimeRange, n: usize) -> Vec<TimeRange> {
    if n == 0 {
        return Vec::new();
    }
    let total = extent.end - extent.start;
    let step = total / n as i32;

    (0..n)
        .map(|i| {
            let start = extent.start + step * (i as i32);
            let end = if i + 1 == n {
                extent.end
            } else {
                extent.start + step * ((i + 1) as i32)
            };
            TimeRange::new(start, end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn extent() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn small_collection_gets_one_producer() {
        let p = plan(100, extent(), 8, 1.5);
        assert_eq!(p.producer_windows.len(), 1);
        assert_eq!(p.producer_windows[0], extent());
    }

    #[test]
    fn large_collection_caps_at_max_producers() {
        let p = plan(10_000_000, extent(), 8, 1.5);
        assert_eq!(p.producer_windows.len(), 8);
        assert_eq!(p.n_consumers, 12);
    }

    #[test]
    fn producer_windows_cover_the_extent_exactly() {
        let p = plan(500_000, extent(), 8, 1.5);
        assert_eq!(p.producer_windows.first().unwrap().start, extent().start);
        assert_eq!(p.producer_windows.last().unwrap().end, extent().end);
        for pair in p.producer_windows.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "windows must be contiguous");
        }
    }
}
