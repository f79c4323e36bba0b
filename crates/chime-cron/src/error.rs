//! Error types for cron parsing and evaluation.

use thiserror::Error;

/// Errors that can occur while parsing or evaluating a cron expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CronError {
    /// Wrong number of whitespace-separated fields.
    #[error("expected 5 or 6 fields, found {found}")]
    InvalidFieldCount { found: usize },

    /// A concrete value fell outside its field's bounds.
    #[error(
        "{field} value {value} is out of range ({min}-{max}){}",
        .hint.map(|h| format!("; {h}")).unwrap_or_default()
    )]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
        hint: Option<&'static str>,
    },

    /// A token could not be parsed as a number or known name.
    #[error("invalid {field} value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    /// Range start exceeds range end.
    #[error("invalid {field} range {start}-{end}: start must not exceed end")]
    InvalidRange {
        field: &'static str,
        start: u32,
        end: u32,
    },

    /// Step is missing, zero, or not a number.
    #[error("invalid {field} step '{step}': step must be a positive integer")]
    InvalidStep { field: &'static str, step: String },

    /// Step applied to something other than `*` or a range.
    #[error("malformed {field} step expression '{token}': base must be '*' or a range")]
    MalformedStep { field: &'static str, token: String },

    /// The next-occurrence search exhausted its iteration budget.
    ///
    /// This happens when the expression's constraints can never be
    /// satisfied (e.g. February 30th).
    #[error("no matching timestamp found within the search iteration limit")]
    NoValidTimestamp,
}
