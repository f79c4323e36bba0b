//! Cron expression parsing and evaluation for Chime.
//!
//! This crate provides the schedule algebra the scheduler builds on:
//! - Six-field cron expressions (minute, hour, day-of-month, month,
//!   day-of-week, optional year) with lists, ranges, steps, and English
//!   month/weekday names
//! - Named aliases ("hourly", "weekdays", ...) resolving to canonical forms
//! - A fluent builder for constructing expressions field by field
//! - Timestamp matching and a bounded next-occurrence search
//!
//! Note: day-of-month and day-of-week must BOTH match. This intentionally
//! deviates from POSIX cron's either-match rule for doubly-restricted day
//! fields; see [`CronExpression`].

mod alias;
mod builder;
mod describe;
mod error;
mod expression;
mod field;

pub use alias::resolve_alias;
pub use builder::CronBuilder;
pub use error::CronError;
pub use expression::{CronExpression, DEFAULT_MAX_ITERATIONS};
pub use field::{CronField, FieldExpr, FieldKind};
