//! Natural-language summaries of cron expressions.

use crate::field::{CronField, FieldExpr};
use crate::CronExpression;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

impl CronExpression {
    /// A human-readable summary, e.g. "At 08:00 on Monday" or
    /// "At minute 0 past every hour".
    ///
    /// Purely derived from the parsed fields; display only.
    pub fn describe(&self) -> String {
        let mut out = match (&self.minute.expr, &self.hour.expr) {
            (FieldExpr::Value(m), FieldExpr::Value(h)) => format!("At {h:02}:{m:02}"),
            (FieldExpr::Value(m), FieldExpr::Wildcard) => {
                format!("At minute {m} past every hour")
            }
            (FieldExpr::Wildcard, FieldExpr::Wildcard) => "Every minute".to_string(),
            (FieldExpr::Wildcard, FieldExpr::Value(h)) => format!("Every minute past hour {h}"),
            (FieldExpr::Step { base, step }, FieldExpr::Wildcard)
                if **base == FieldExpr::Wildcard =>
            {
                format!("Every {step} minutes")
            }
            (_, FieldExpr::Wildcard) => format!("At minute {} past every hour", self.minute),
            (_, _) => format!("At minute {} past hour {}", self.minute, self.hour),
        };

        if !self.day_of_month.is_wildcard() {
            out.push_str(&format!(" on day-of-month {}", self.day_of_month));
        }
        if !self.day_of_week.is_wildcard() {
            out.push_str(&format!(" on {}", named_phrase(&self.day_of_week, &WEEKDAYS, 0)));
        }
        if !self.month.is_wildcard() {
            out.push_str(&format!(" in {}", named_phrase(&self.month, &MONTHS, 1)));
        }
        if !self.year.is_wildcard() {
            out.push_str(&format!(" in {}", self.year));
        }
        out
    }
}

/// Render a month or weekday field using English names where possible.
fn named_phrase(field: &CronField, names: &[&str], offset: u32) -> String {
    fn name_of(names: &[&str], offset: u32, value: u32) -> Option<String> {
        names
            .get(value.checked_sub(offset)? as usize)
            .map(|n| (*n).to_string())
    }

    let fallback = || field.to_string();
    match &field.expr {
        FieldExpr::Value(v) => name_of(names, offset, *v).unwrap_or_else(fallback),
        FieldExpr::Range(a, b) => match (name_of(names, offset, *a), name_of(names, offset, *b)) {
            (Some(from), Some(to)) => format!("{from} through {to}"),
            _ => fallback(),
        },
        FieldExpr::List(members) => {
            let mut rendered = Vec::with_capacity(members.len());
            for member in members {
                match member {
                    FieldExpr::Value(v) => match name_of(names, offset, *v) {
                        Some(name) => rendered.push(name),
                        None => return fallback(),
                    },
                    _ => return fallback(),
                }
            }
            rendered.join(", ")
        }
        _ => fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case("0 * * * *", "At minute 0 past every hour")]
    #[test_case("* * * * *", "Every minute")]
    #[test_case("*/5 * * * *", "Every 5 minutes")]
    #[test_case("0 8 * * 1", "At 08:00 on Monday")]
    #[test_case("30 17 * * *", "At 17:30")]
    #[test_case("* 6 * * *", "Every minute past hour 6")]
    fn describes_common_schedules(input: &str, expected: &str) {
        let expr = CronExpression::parse(input).unwrap();
        assert_eq!(expr.describe(), expected);
    }

    #[test]
    fn describes_day_and_month_restrictions() {
        let expr = CronExpression::parse("0 9 1 jan mon-fri").unwrap();
        assert_eq!(
            expr.describe(),
            "At 09:00 on day-of-month 1 on Monday through Friday in January"
        );
    }

    #[test]
    fn describes_weekday_lists_by_name() {
        let expr = CronExpression::parse("0 0 * * 0,6").unwrap();
        assert_eq!(expr.describe(), "At 00:00 on Sunday, Saturday");
    }

    #[test]
    fn describes_year_restriction() {
        let expr = CronExpression::parse("0 12 * * * 2030").unwrap();
        assert_eq!(expr.describe(), "At 12:00 in 2030");
    }

    #[test]
    fn falls_back_to_tokens_for_complex_fields() {
        let expr = CronExpression::parse("0,30 9-17 * * *").unwrap();
        assert_eq!(expr.describe(), "At minute 0,30 past hour 9-17");
    }
}
