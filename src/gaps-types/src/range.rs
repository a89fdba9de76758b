use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;

/// The far-future sentinel used for collections whose catalog extent has no
/// declared end. Readers substitute the current wall-clock time for this
/// value before returning it externally.
pub static SENTINEL_END: Lazy<DateTime<Utc>> = Lazy::new(|| {
    Utc.with_ymd_and_hms(9999, 1, 1, 0, 0, 0)
        .single()
        .expect("9999-01-01T00:00:00Z is a valid instant")
});

/// A half-open time range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        TimeRange { start, end }
    }

    /// Duration of the range in seconds. Negative if malformed (`end < start`);
    /// callers that enforce G1/G2 never observe a negative duration in
    /// practice since the database rejects overlapping/empty ranges.
    pub fn duration_seconds(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True if the two ranges share an endpoint without overlapping, i.e.
    /// `self.end == other.start` or `other.end == self.start`.
    pub fn touches(&self, other: &TimeRange) -> bool {
        self.end == other.start || other.end == self.start
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    /// The intersection of two overlapping ranges. Returns `None` if they do
    /// not overlap.
    pub fn intersection(&self, other: &TimeRange) -> Option<TimeRange> {
        if !self.overlaps(other) {
            return None;
        }
        Some(TimeRange {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ts(days: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap() + Duration::days(days)
    }

    #[test]
    fn overlap_is_symmetric_and_half_open() {
        let a = TimeRange::new(ts(0), ts(10));
        let b = TimeRange::new(ts(10), ts(20));
        assert!(!a.overlaps(&b), "half-open ranges sharing an endpoint do not overlap");
        assert!(a.touches(&b));
    }

    #[test]
    fn intersection_of_overlapping_ranges() {
        let a = TimeRange::new(ts(0), ts(10));
        let b = TimeRange::new(ts(5), ts(15));
        let i = a.intersection(&b).unwrap();
        assert_eq!(i, TimeRange::new(ts(5), ts(10)));
    }

    #[test]
    fn sentinel_is_far_future() {
        assert_eq!(SENTINEL_END.format("%Y").to_string(), "9999");
    }
}
