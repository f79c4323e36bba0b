//! Parsed cron expressions and the next-occurrence search.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::field::{CronField, FieldKind};
use crate::CronError;

/// Default bound on jump operations in [`CronExpression::next_after`].
///
/// Guards against contradictory constraints (e.g. February 30th) that can
/// never be satisfied.
pub const DEFAULT_MAX_ITERATIONS: usize = 10_000;

/// A parsed, validated six-field cron expression.
///
/// Fields are minute, hour, day-of-month, month, day-of-week (0 = Sunday),
/// and an optional year that defaults to `*`.
///
/// Day-of-month and day-of-week must BOTH match for a timestamp to match.
/// This deviates from POSIX cron (where a match on either suffices when both
/// fields are restricted) and is preserved deliberately from the source
/// system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpression {
    pub minute: CronField,
    pub hour: CronField,
    pub day_of_month: CronField,
    pub month: CronField,
    pub day_of_week: CronField,
    pub year: CronField,
}

impl CronExpression {
    /// Parse a 5- or 6-field cron string.
    pub fn parse(input: &str) -> Result<Self, CronError> {
        let tokens: Vec<&str> = input.split_whitespace().collect();
        if tokens.len() != 5 && tokens.len() != 6 {
            return Err(CronError::InvalidFieldCount {
                found: tokens.len(),
            });
        }

        let year = if tokens.len() == 6 {
            CronField::parse(FieldKind::Year, tokens[5])?
        } else {
            CronField::wildcard(FieldKind::Year)
        };

        Ok(Self {
            minute: CronField::parse(FieldKind::Minute, tokens[0])?,
            hour: CronField::parse(FieldKind::Hour, tokens[1])?,
            day_of_month: CronField::parse(FieldKind::DayOfMonth, tokens[2])?,
            month: CronField::parse(FieldKind::Month, tokens[3])?,
            day_of_week: CronField::parse(FieldKind::DayOfWeek, tokens[4])?,
            year,
        })
    }

    /// The `* * * * *` expression (every minute).
    pub fn every_minute() -> Self {
        Self {
            minute: CronField::wildcard(FieldKind::Minute),
            hour: CronField::wildcard(FieldKind::Hour),
            day_of_month: CronField::wildcard(FieldKind::DayOfMonth),
            month: CronField::wildcard(FieldKind::Month),
            day_of_week: CronField::wildcard(FieldKind::DayOfWeek),
            year: CronField::wildcard(FieldKind::Year),
        }
    }

    /// Whether the given timestamp matches this expression.
    ///
    /// Seconds are ignored; matching is at minute granularity.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        let weekday = at.weekday().num_days_from_sunday();
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.day_of_month.matches(at.day())
            && self.month.matches(at.month())
            && self.day_of_week.matches(weekday)
            && (self.year.is_wildcard() || (at.year() >= 0 && self.year.matches(at.year() as u32)))
    }

    /// The next matching timestamp strictly after `from`.
    ///
    /// Bounded by [`DEFAULT_MAX_ITERATIONS`] jump operations.
    pub fn next_after(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
        self.next_after_bounded(from, DEFAULT_MAX_ITERATIONS)
    }

    /// The next matching timestamp strictly after `from`, with an explicit
    /// bound on jump operations.
    ///
    /// The search starts at `from + 1 minute` with seconds truncated, then
    /// jumps field by field: a non-matching year jumps to January 1st of the
    /// next candidate year, a non-matching month to day 1 of the next
    /// candidate month, a non-matching day scans forward day by day (the
    /// day-of-month AND day-of-week rule applies), and non-matching hours and
    /// minutes jump to the next candidate value, rolling the unit above when
    /// none remains.
    pub fn next_after_bounded(
        &self,
        from: DateTime<Utc>,
        max_iterations: usize,
    ) -> Result<DateTime<Utc>, CronError> {
        let mut at = truncate_to_minute(from + Duration::minutes(1))?;

        for _ in 0..max_iterations {
            let year = at.year();
            if !self.year.is_wildcard() && !(year >= 0 && self.year.matches(year as u32)) {
                let next_year = if year < 0 {
                    self.year.min_matching()
                } else {
                    self.year.next_after(year as u32)
                };
                match next_year {
                    Some(candidate) => {
                        at = start_of_month(candidate as i32, 1)?;
                        continue;
                    }
                    None => return Err(CronError::NoValidTimestamp),
                }
            }

            if !self.month.matches(at.month()) {
                at = match self.month.next_after(at.month()) {
                    Some(month) => start_of_month(at.year(), month)?,
                    None => start_of_month(at.year() + 1, 1)?,
                };
                continue;
            }

            let weekday = at.weekday().num_days_from_sunday();
            if !(self.day_of_month.matches(at.day()) && self.day_of_week.matches(weekday)) {
                let next_day = at
                    .date_naive()
                    .succ_opt()
                    .ok_or(CronError::NoValidTimestamp)?;
                at = midnight(next_day)?;
                continue;
            }

            if !self.hour.matches(at.hour()) {
                at = match self.hour.next_after(at.hour()) {
                    Some(hour) => midnight(at.date_naive())? + Duration::hours(hour as i64),
                    None => {
                        let next_day = at
                            .date_naive()
                            .succ_opt()
                            .ok_or(CronError::NoValidTimestamp)?;
                        midnight(next_day)?
                    }
                };
                continue;
            }

            if !self.minute.matches(at.minute()) {
                let hour_start = at - Duration::minutes(at.minute() as i64);
                at = match self.minute.next_after(at.minute()) {
                    Some(minute) => hour_start + Duration::minutes(minute as i64),
                    None => hour_start + Duration::hours(1),
                };
                continue;
            }

            return Ok(at);
        }

        Err(CronError::NoValidTimestamp)
    }

    /// Re-serialize the 5 required fields as a canonical cron string.
    ///
    /// The inverse of [`CronExpression::parse`] for numeric expressions;
    /// names parse to numbers and serialize numerically.
    pub fn to_cron_string(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }

    /// Like [`CronExpression::to_cron_string`], with the year field appended.
    pub fn to_cron_string_with_year(&self) -> String {
        format!("{} {}", self.to_cron_string(), self.year)
    }
}

impl FromStr for CronExpression {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_cron_string())
    }
}

fn truncate_to_minute(at: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .ok_or(CronError::NoValidTimestamp)
}

fn midnight(date: NaiveDate) -> Result<DateTime<Utc>, CronError> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or(CronError::NoValidTimestamp)
}

fn start_of_month(year: i32, month: u32) -> Result<DateTime<Utc>, CronError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or(CronError::NoValidTimestamp)
        .and_then(midnight)
}
