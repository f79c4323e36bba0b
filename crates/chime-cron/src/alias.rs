//! Named schedule aliases.

/// Resolve a schedule alias to its canonical cron string.
///
/// Lookup is case-insensitive and trims surrounding whitespace. Input that
/// matches no alias is returned unchanged and treated as a literal cron
/// string downstream.
pub fn resolve_alias(input: &str) -> &str {
    let trimmed = input.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "yearly" | "annually" => "0 0 1 1 *",
        "monthly" => "0 0 1 * *",
        "weekly" => "0 0 * * 0",
        "daily" | "midnight" => "0 0 * * *",
        "hourly" => "0 * * * *",
        "every_minute" => "* * * * *",
        "every_5_minutes" => "*/5 * * * *",
        "every_10_minutes" => "*/10 * * * *",
        "every_15_minutes" => "*/15 * * * *",
        "every_30_minutes" => "*/30 * * * *",
        "twice_daily" => "0 0,12 * * *",
        "weekdays" => "0 0 * * 1-5",
        "weekends" => "0 0 * * 0,6",
        _ => trimmed,
    }
}
