//! Cron field grammar: parsing, validation, and per-value matching.

use std::fmt;

use crate::CronError;

const MONTH_NAMES: [(&str, u32); 12] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

const DAY_NAMES: [(&str, u32); 7] = [
    ("sunday", 0),
    ("monday", 1),
    ("tuesday", 2),
    ("wednesday", 3),
    ("thursday", 4),
    ("friday", 5),
    ("saturday", 6),
];

/// Which of the six cron fields a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
    Year,
}

impl FieldKind {
    /// Field name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day-of-month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day-of-week",
            FieldKind::Year => "year",
        }
    }

    /// Inclusive (min, max) bounds for concrete values in this field.
    pub fn bounds(self) -> (u32, u32) {
        match self {
            FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::DayOfMonth => (1, 31),
            FieldKind::Month => (1, 12),
            FieldKind::DayOfWeek => (0, 6),
            FieldKind::Year => (0, 2099),
        }
    }

    /// English names accepted in this field, if any.
    fn name_table(self) -> &'static [(&'static str, u32)] {
        match self {
            FieldKind::Month => &MONTH_NAMES,
            FieldKind::DayOfWeek => &DAY_NAMES,
            _ => &[],
        }
    }

    /// A hint for values that look like a common field mix-up.
    fn mis_entry_hint(self, value: u32) -> Option<&'static str> {
        match self {
            FieldKind::Hour if (24..=59).contains(&value) => {
                Some("this looks like a minute; hours run 0-23")
            }
            FieldKind::DayOfWeek if (7..=23).contains(&value) => {
                Some("this looks like an hour; days of week run 0 (Sunday) to 6 (Saturday)")
            }
            _ => None,
        }
    }
}

/// One parsed alternative within a cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldExpr {
    /// `*` — matches every value.
    Wildcard,
    /// A single concrete value.
    Value(u32),
    /// An inclusive range `a-b`.
    Range(u32, u32),
    /// A stepped base, `*/n` or `a-b/n`.
    Step { base: Box<FieldExpr>, step: u32 },
    /// A comma-separated list of alternatives.
    List(Vec<FieldExpr>),
}

impl fmt::Display for FieldExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldExpr::Wildcard => write!(f, "*"),
            FieldExpr::Value(v) => write!(f, "{v}"),
            FieldExpr::Range(a, b) => write!(f, "{a}-{b}"),
            FieldExpr::Step { base, step } => write!(f, "{base}/{step}"),
            FieldExpr::List(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{member}")?;
                }
                Ok(())
            }
        }
    }
}

/// A single validated cron field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronField {
    pub kind: FieldKind,
    pub expr: FieldExpr,
}

impl CronField {
    /// A `*` field of the given kind.
    pub fn wildcard(kind: FieldKind) -> Self {
        Self {
            kind,
            expr: FieldExpr::Wildcard,
        }
    }

    /// Parse and validate one field token.
    ///
    /// Month and day-of-week names are resolved to numbers first, including
    /// inside lists, ranges, and step bases. Anything left unresolved fails
    /// numeric parsing with a descriptive error.
    pub fn parse(kind: FieldKind, token: &str) -> Result<Self, CronError> {
        let resolved = resolve_name_tokens(kind, token);
        let expr = if resolved.contains(',') {
            let mut members = Vec::new();
            for part in resolved.split(',') {
                members.push(parse_single(kind, part)?);
            }
            FieldExpr::List(members)
        } else {
            parse_single(kind, &resolved)?
        };
        Ok(Self { kind, expr })
    }

    /// Whether this field is an unrestricted `*`.
    pub fn is_wildcard(&self) -> bool {
        self.expr == FieldExpr::Wildcard
    }

    /// Whether the given component value matches this field.
    pub fn matches(&self, value: u32) -> bool {
        expr_matches(&self.expr, value, self.kind.bounds().0)
    }

    /// Smallest matching value strictly greater than `value`, if any.
    pub fn next_after(&self, value: u32) -> Option<u32> {
        let (min, max) = self.kind.bounds();
        let start = value.saturating_add(1).max(min);
        (start..=max).find(|&candidate| self.matches(candidate))
    }

    /// Smallest matching value in this field, if any.
    pub fn min_matching(&self) -> Option<u32> {
        let (min, max) = self.kind.bounds();
        (min..=max).find(|&candidate| self.matches(candidate))
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

fn expr_matches(expr: &FieldExpr, value: u32, field_min: u32) -> bool {
    match expr {
        FieldExpr::Wildcard => true,
        FieldExpr::Value(v) => *v == value,
        FieldExpr::Range(a, b) => (*a..=*b).contains(&value),
        FieldExpr::Step { base, step } => match base.as_ref() {
            FieldExpr::Wildcard => value >= field_min && (value - field_min) % step == 0,
            FieldExpr::Range(a, b) => (*a..=*b).contains(&value) && (value - a) % step == 0,
            // Parsing rejects other bases.
            other => expr_matches(other, value, field_min),
        },
        FieldExpr::List(members) => members
            .iter()
            .any(|member| expr_matches(member, value, field_min)),
    }
}

/// Parse one non-list alternative: `*`, value, range, or stepped range.
fn parse_single(kind: FieldKind, part: &str) -> Result<FieldExpr, CronError> {
    if let Some((base_str, step_str)) = part.split_once('/') {
        let step: u32 = step_str.parse().map_err(|_| CronError::InvalidStep {
            field: kind.name(),
            step: step_str.to_string(),
        })?;
        if step == 0 {
            return Err(CronError::InvalidStep {
                field: kind.name(),
                step: step_str.to_string(),
            });
        }
        let base = if base_str == "*" {
            FieldExpr::Wildcard
        } else if base_str.contains('-') {
            parse_range(kind, base_str)?
        } else {
            return Err(CronError::MalformedStep {
                field: kind.name(),
                token: part.to_string(),
            });
        };
        return Ok(FieldExpr::Step {
            base: Box::new(base),
            step,
        });
    }

    if part == "*" {
        return Ok(FieldExpr::Wildcard);
    }

    if part.contains('-') {
        return parse_range(kind, part);
    }

    let value = parse_value(kind, part)?;
    Ok(FieldExpr::Value(value))
}

fn parse_range(kind: FieldKind, part: &str) -> Result<FieldExpr, CronError> {
    let Some((start_str, end_str)) = part.split_once('-') else {
        return Err(CronError::InvalidValue {
            field: kind.name(),
            value: part.to_string(),
        });
    };
    let start = parse_value(kind, start_str)?;
    let end = parse_value(kind, end_str)?;
    if start > end {
        return Err(CronError::InvalidRange {
            field: kind.name(),
            start,
            end,
        });
    }
    Ok(FieldExpr::Range(start, end))
}

fn parse_value(kind: FieldKind, raw: &str) -> Result<u32, CronError> {
    let value: u32 = raw.parse().map_err(|_| CronError::InvalidValue {
        field: kind.name(),
        value: raw.to_string(),
    })?;
    let (min, max) = kind.bounds();
    if value < min || value > max {
        return Err(CronError::OutOfRange {
            field: kind.name(),
            value,
            min,
            max,
            hint: kind.mis_entry_hint(value),
        });
    }
    Ok(value)
}

/// Replace month/day-of-week names with their numeric values.
///
/// Names may appear anywhere numbers may: `jan,jul`, `mon-fri`, `jan-jun/2`.
/// Unknown names pass through unchanged and fail numeric parsing later.
fn resolve_name_tokens(kind: FieldKind, token: &str) -> String {
    let table = kind.name_table();
    if table.is_empty() {
        return token.to_string();
    }

    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_alphabetic() {
            let mut word = String::new();
            while let Some(&letter) = chars.peek() {
                if letter.is_ascii_alphabetic() {
                    word.push(letter);
                    chars.next();
                } else {
                    break;
                }
            }
            match lookup_name(table, &word) {
                Some(value) => out.push_str(&value.to_string()),
                None => out.push_str(&word),
            }
        } else {
            out.push(c);
            chars.next();
        }
    }
    out
}

/// Case-insensitive lookup of a full name or its 3-letter abbreviation.
fn lookup_name(table: &[(&str, u32)], word: &str) -> Option<u32> {
    let lowered = word.to_ascii_lowercase();
    table
        .iter()
        .find(|(name, _)| *name == lowered || (lowered.len() == 3 && name.starts_with(&lowered)))
        .map(|(_, value)| *value)
}
