//! Fluent field-by-field construction of cron expressions.

use crate::field::{CronField, FieldExpr, FieldKind};
use crate::{CronError, CronExpression};

/// Builds a [`CronExpression`] one field at a time.
///
/// Every field defaults to `*`; setters overwrite the whole field. `build`
/// runs the same bounds validation as [`CronExpression::parse`].
///
/// ```
/// use chime_cron::CronBuilder;
///
/// let expr = CronBuilder::new()
///     .at_minute(0)
///     .at_hour(9)
///     .on_weekday_range(1, 5)
///     .build()
///     .unwrap();
/// assert_eq!(expr.to_cron_string(), "0 9 * * 1-5");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CronBuilder {
    minute: Option<FieldExpr>,
    hour: Option<FieldExpr>,
    day_of_month: Option<FieldExpr>,
    month: Option<FieldExpr>,
    day_of_week: Option<FieldExpr>,
    year: Option<FieldExpr>,
}

impl CronBuilder {
    /// A builder with every field set to `*`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run at an exact minute.
    pub fn at_minute(mut self, minute: u32) -> Self {
        self.minute = Some(FieldExpr::Value(minute));
        self
    }

    /// Run at each of the listed minutes.
    pub fn at_minutes(mut self, minutes: &[u32]) -> Self {
        self.minute = Some(value_list(minutes));
        self
    }

    /// Run every `step` minutes (`*/step`).
    pub fn every_minutes(mut self, step: u32) -> Self {
        self.minute = Some(wildcard_step(step));
        self
    }

    /// Run at an exact hour.
    pub fn at_hour(mut self, hour: u32) -> Self {
        self.hour = Some(FieldExpr::Value(hour));
        self
    }

    /// Run at each of the listed hours.
    pub fn at_hours(mut self, hours: &[u32]) -> Self {
        self.hour = Some(value_list(hours));
        self
    }

    /// Run every `step` hours (`*/step`).
    pub fn every_hours(mut self, step: u32) -> Self {
        self.hour = Some(wildcard_step(step));
        self
    }

    /// Restrict to hours `start` through `end` inclusive.
    pub fn hour_range(mut self, start: u32, end: u32) -> Self {
        self.hour = Some(FieldExpr::Range(start, end));
        self
    }

    /// Run on an exact day of the month.
    pub fn on_day_of_month(mut self, day: u32) -> Self {
        self.day_of_month = Some(FieldExpr::Value(day));
        self
    }

    /// Run on each of the listed days of the month.
    pub fn on_days_of_month(mut self, days: &[u32]) -> Self {
        self.day_of_month = Some(value_list(days));
        self
    }

    /// Restrict to an exact month (1 = January).
    pub fn in_month(mut self, month: u32) -> Self {
        self.month = Some(FieldExpr::Value(month));
        self
    }

    /// Restrict to each of the listed months.
    pub fn in_months(mut self, months: &[u32]) -> Self {
        self.month = Some(value_list(months));
        self
    }

    /// Run on an exact weekday (0 = Sunday).
    pub fn on_weekday(mut self, weekday: u32) -> Self {
        self.day_of_week = Some(FieldExpr::Value(weekday));
        self
    }

    /// Run on weekdays `start` through `end` inclusive (0 = Sunday).
    pub fn on_weekday_range(mut self, start: u32, end: u32) -> Self {
        self.day_of_week = Some(FieldExpr::Range(start, end));
        self
    }

    /// Restrict to an exact year.
    pub fn in_year(mut self, year: u32) -> Self {
        self.year = Some(FieldExpr::Value(year));
        self
    }

    /// Validate the configured fields and produce the expression.
    pub fn build(self) -> Result<CronExpression, CronError> {
        Ok(CronExpression {
            minute: finish(FieldKind::Minute, self.minute)?,
            hour: finish(FieldKind::Hour, self.hour)?,
            day_of_month: finish(FieldKind::DayOfMonth, self.day_of_month)?,
            month: finish(FieldKind::Month, self.month)?,
            day_of_week: finish(FieldKind::DayOfWeek, self.day_of_week)?,
            year: finish(FieldKind::Year, self.year)?,
        })
    }
}

fn value_list(values: &[u32]) -> FieldExpr {
    match values {
        [single] => FieldExpr::Value(*single),
        _ => FieldExpr::List(values.iter().copied().map(FieldExpr::Value).collect()),
    }
}

fn wildcard_step(step: u32) -> FieldExpr {
    FieldExpr::Step {
        base: Box::new(FieldExpr::Wildcard),
        step,
    }
}

/// Validate a built field by re-parsing its canonical token.
fn finish(kind: FieldKind, expr: Option<FieldExpr>) -> Result<CronField, CronError> {
    match expr {
        None => Ok(CronField::wildcard(kind)),
        Some(expr) => CronField::parse(kind, &expr.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_to_every_minute() {
        let expr = CronBuilder::new().build().unwrap();
        assert_eq!(expr, CronExpression::every_minute());
    }

    #[test]
    fn builder_matches_parsed_equivalent() {
        let built = CronBuilder::new()
            .at_minute(30)
            .at_hours(&[8, 18])
            .on_day_of_month(1)
            .in_month(6)
            .build()
            .unwrap();
        let parsed = CronExpression::parse("30 8,18 1 6 *").unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn step_and_range_fields() {
        let built = CronBuilder::new()
            .every_minutes(15)
            .hour_range(9, 17)
            .on_weekday_range(1, 5)
            .build()
            .unwrap();
        assert_eq!(built.to_cron_string(), "*/15 9-17 * * 1-5");
    }

    #[test]
    fn year_field_is_included() {
        let built = CronBuilder::new().at_minute(0).in_year(2031).build().unwrap();
        assert_eq!(built.to_cron_string_with_year(), "0 * * * * 2031");
    }

    #[test]
    fn build_validates_bounds() {
        let err = CronBuilder::new().at_hour(25).build().unwrap_err();
        assert!(matches!(
            err,
            CronError::OutOfRange { field: "hour", .. }
        ));

        let err = CronBuilder::new().on_weekday_range(5, 2).build().unwrap_err();
        assert!(matches!(err, CronError::InvalidRange { .. }));

        let err = CronBuilder::new().every_minutes(0).build().unwrap_err();
        assert!(matches!(err, CronError::InvalidStep { .. }));
    }
}
