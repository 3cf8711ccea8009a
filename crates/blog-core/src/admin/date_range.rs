use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::query::{Lookup, PostField, Q};

/// Choices of a timestamp list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateRange {
    AnyDate,
    Today,
    PastSevenDays,
    ThisMonth,
    ThisYear,
}

impl DateRange {
    pub const ALL: [DateRange; 5] = [
        DateRange::AnyDate,
        DateRange::Today,
        DateRange::PastSevenDays,
        DateRange::ThisMonth,
        DateRange::ThisYear,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DateRange::AnyDate => "any_date",
            DateRange::Today => "today",
            DateRange::PastSevenDays => "past_7_days",
            DateRange::ThisMonth => "this_month",
            DateRange::ThisYear => "this_year",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DateRange::AnyDate => "Any date",
            DateRange::Today => "Today",
            DateRange::PastSevenDays => "Past 7 days",
            DateRange::ThisMonth => "This month",
            DateRange::ThisYear => "This year",
        }
    }

    pub fn parse(key: &str) -> Option<DateRange> {
        DateRange::ALL.into_iter().find(|r| r.key() == key)
    }

    /// Half-open `[start, end)` window relative to `now`, in UTC.
    /// `AnyDate` has no bounds.
    pub fn bounds(self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = now.date_naive();
        let tomorrow = today + Duration::days(1);
        let (start, end) = match self {
            DateRange::AnyDate => return None,
            DateRange::Today => (today, tomorrow),
            DateRange::PastSevenDays => (today - Duration::days(7), tomorrow),
            DateRange::ThisMonth => {
                let start = today.with_day(1)?;
                let end = if start.month() == 12 {
                    NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)?
                } else {
                    NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)?
                };
                (start, end)
            }
            DateRange::ThisYear => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
                NaiveDate::from_ymd_opt(today.year() + 1, 1, 1)?,
            ),
        };
        Some((midnight(start)?, midnight(end)?))
    }

    /// Predicate selecting `field` values inside the window.
    pub fn q(self, field: PostField, now: DateTime<Utc>) -> Q {
        match self.bounds(now) {
            Some((start, end)) => {
                Q::new(field, Lookup::Gte, start) & Q::new(field, Lookup::Lt, end)
            }
            None => Q::All,
        }
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}
