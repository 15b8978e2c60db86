//! Calendar helpers. The ledger keeps its days in Bangladesh time (Asia/Dhaka, UTC+06:00, no
//! daylight saving), regardless of where the program runs.

use anyhow::{bail, Context};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Offset, Utc};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const DHAKA_OFFSET_SECS: i32 = 6 * 3600;

fn dhaka() -> FixedOffset {
    FixedOffset::east_opt(DHAKA_OFFSET_SECS).unwrap_or(Utc.fix())
}

/// The calendar date in Dhaka at the instant `now`.
pub fn dhaka_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&dhaka()).date_naive()
}

/// Today's date in Dhaka.
pub fn today() -> NaiveDate {
    dhaka_date(Utc::now())
}

/// Today's date in Dhaka as `YYYY-MM-DD`, the format stored in entries.
pub fn today_string() -> String {
    format_date(today())
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Parses an entry date in `YYYY-MM-DD` form.
pub fn parse_date(s: &str) -> crate::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("'{s}' is not a date in YYYY-MM-DD form"))
}

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> crate::Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("Month must be between 1 and 12, got {month}");
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in Dhaka.
    pub fn current() -> Self {
        Self::of(today())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Whether an entry date string (`YYYY-MM-DD`) falls inside this month.
    pub fn contains(&self, date: &str) -> bool {
        date.starts_with(&format!("{self}-"))
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
            .with_context(|| format!("'{s}' is not a month in YYYY-MM form"))?;
        Ok(Self::of(date))
    }
}

/// The day-of-month of an entry date, used to label the daily series.
pub(crate) fn day_of_month(date: &str) -> Option<u32> {
    parse_date(date).ok().map(|d| d.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_dhaka_date_rolls_over_before_utc() {
        // 20:30 UTC is 02:30 the next day in Dhaka.
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 20, 30, 0).unwrap();
        assert_eq!(
            dhaka_date(now),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
        );

        let now = Utc.with_ymd_and_hms(2025, 3, 31, 17, 59, 59).unwrap();
        assert_eq!(
            dhaka_date(now),
            NaiveDate::from_ymd_opt(2025, 3, 31).unwrap()
        );
    }

    #[test]
    fn test_month_parse_and_display() {
        let m = Month::from_str("2025-02").unwrap();
        assert_eq!(m.year(), 2025);
        assert_eq!(m.month(), 2);
        assert_eq!(m.to_string(), "2025-02");
        assert!(Month::from_str("2025-13").is_err());
        assert!(Month::from_str("Feb 2025").is_err());
        assert!(Month::new(2025, 0).is_err());
    }

    #[test]
    fn test_month_contains() {
        let m = Month::new(2025, 1).unwrap();
        assert!(m.contains("2025-01-31"));
        assert!(!m.contains("2025-10-01"));
        assert!(!m.contains("2024-01-15"));
    }

    #[test]
    fn test_day_of_month() {
        assert_eq!(day_of_month("2025-06-09"), Some(9));
        assert_eq!(day_of_month("garbage"), None);
    }
}
