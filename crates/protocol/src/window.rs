use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::records::DataOrigin;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("time window starts at {start} but ends earlier at {end}")]
pub struct InvalidWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Inclusive instant range with an optional set of allowed origins.
///
/// An empty origin filter means records from every origin match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowRepr", into = "WindowRepr")]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    origin_filter: BTreeSet<DataOrigin>,
}

#[derive(Serialize, Deserialize)]
struct WindowRepr {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    origin_filter: BTreeSet<DataOrigin>,
}

impl TryFrom<WindowRepr> for TimeWindow {
    type Error = InvalidWindow;

    fn try_from(repr: WindowRepr) -> Result<Self, Self::Error> {
        Ok(TimeWindow::between(repr.start, repr.end)?.with_origins(repr.origin_filter))
    }
}

impl From<TimeWindow> for WindowRepr {
    fn from(window: TimeWindow) -> Self {
        Self {
            start: window.start,
            end: window.end,
            origin_filter: window.origin_filter,
        }
    }
}

impl TimeWindow {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, InvalidWindow> {
        if start > end {
            return Err(InvalidWindow { start, end });
        }
        Ok(Self {
            start,
            end,
            origin_filter: BTreeSet::new(),
        })
    }

    /// Calendar day containing `instant`, in the instant's own offset.
    ///
    /// Covers local midnight up to one millisecond before the next midnight.
    pub fn day_of(instant: DateTime<FixedOffset>) -> Self {
        let offset_secs = instant.offset().local_minus_utc() as i64;
        let local_midnight = instant.date_naive().and_time(NaiveTime::MIN);
        let start = DateTime::<Utc>::from_naive_utc_and_offset(
            local_midnight - Duration::seconds(offset_secs),
            Utc,
        );
        let end = start + Duration::days(1) - Duration::milliseconds(1);

        Self {
            start,
            end,
            origin_filter: BTreeSet::new(),
        }
    }

    pub fn with_origin(mut self, origin: DataOrigin) -> Self {
        self.origin_filter.insert(origin);
        self
    }

    pub fn with_origins(mut self, origins: impl IntoIterator<Item = DataOrigin>) -> Self {
        self.origin_filter.extend(origins);
        self
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn origin_filter(&self) -> &BTreeSet<DataOrigin> {
        &self.origin_filter
    }

    pub fn is_unrestricted(&self) -> bool {
        self.origin_filter.is_empty()
    }

    pub fn accepts_origin(&self, origin: &DataOrigin) -> bool {
        self.origin_filter.is_empty() || self.origin_filter.contains(origin)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Seconds of `[start, end]` that fall inside this window.
    pub fn overlap_secs(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        let from = start.max(self.start);
        let to = end.min(self.end);
        if to <= from {
            return 0;
        }
        (to - from).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_between_rejects_inverted_range() {
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(TimeWindow::between(start, end).is_err());
        assert!(TimeWindow::between(start, start).is_ok());
    }

    #[test]
    fn test_day_of_late_evening_session() {
        let tz = FixedOffset::east_opt(9 * 3600).unwrap();
        let session_start = tz.with_ymd_and_hms(2024, 3, 5, 23, 50, 0).unwrap();

        let window = TimeWindow::day_of(session_start);

        let expected_start = tz.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap();
        let expected_end = tz.with_ymd_and_hms(2024, 3, 5, 23, 59, 59).unwrap()
            + Duration::milliseconds(999);
        assert_eq!(window.start(), expected_start.with_timezone(&Utc));
        assert_eq!(window.end(), expected_end.with_timezone(&Utc));
        assert!(window.is_unrestricted());
    }

    #[test]
    fn test_day_of_negative_offset() {
        let tz = FixedOffset::west_opt(5 * 3600).unwrap();
        let instant = tz.with_ymd_and_hms(2024, 7, 1, 0, 30, 0).unwrap();

        let window = TimeWindow::day_of(instant);

        assert_eq!(
            window.start(),
            Utc.with_ymd_and_hms(2024, 7, 1, 5, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_origin_filter() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let window = TimeWindow::between(start, start)
            .unwrap()
            .with_origin(DataOrigin::new("com.example.run"));

        assert!(window.accepts_origin(&DataOrigin::new("com.example.run")));
        assert!(!window.accepts_origin(&DataOrigin::new("com.example.pedometer")));
    }

    #[test]
    fn test_overlap_secs_clips_to_window() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let window = TimeWindow::between(start, start + Duration::minutes(30)).unwrap();

        assert_eq!(
            window.overlap_secs(start - Duration::minutes(10), start + Duration::minutes(10)),
            600
        );
        assert_eq!(
            window.overlap_secs(start + Duration::hours(1), start + Duration::hours(2)),
            0
        );
    }

    #[test]
    fn test_deserialize_rejects_inverted_window() {
        let json = r#"{"start":"2024-01-02T00:00:00Z","end":"2024-01-01T00:00:00Z"}"#;
        assert!(serde_json::from_str::<TimeWindow>(json).is_err());
    }
}
