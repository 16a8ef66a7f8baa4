use chrono::{DateTime, Duration, Months, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Half-open time range `[start, end)` a digest covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DigestWindow {
    #[must_use]
    pub fn new(start: DateTime<Utc>, length: Duration) -> Self {
        Self {
            start,
            end: start + length,
        }
    }

    /// `days` starting at midnight UTC on the same calendar day `years` ago.
    ///
    /// A leap day maps to February 28 of a non-leap year. Returns `None` when
    /// the date falls outside the representable range.
    #[must_use]
    pub fn years_ago(now: DateTime<Utc>, years: u32, days: u32) -> Option<Self> {
        let day = now
            .date_naive()
            .checked_sub_months(Months::new(years.checked_mul(12)?))?;
        let start = day.and_time(NaiveTime::MIN).and_utc();
        let end = start.checked_add_signed(Duration::days(i64::from(days)))?;
        Some(Self { start, end })
    }

    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn one_year_ago_starts_at_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 6, 14, 17, 42, 9).unwrap();
        let window = DigestWindow::years_ago(now, 1, 1).expect("window");
        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 6, 14, 0, 0, 0).unwrap());
        assert_eq!(window.end, Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap());
    }

    #[test]
    fn leap_day_clamps_to_end_of_february() {
        let now = Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap();
        let window = DigestWindow::years_ago(now, 1, 1).expect("window");
        assert_eq!(window.start, Utc.with_ymd_and_hms(2023, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let window = DigestWindow::new(start, Duration::days(1));
        assert!(window.contains(start));
        assert!(window.contains(start + Duration::hours(23)));
        assert!(!window.contains(window.end));
        assert!(!window.contains(start - Duration::seconds(1)));
    }
}
