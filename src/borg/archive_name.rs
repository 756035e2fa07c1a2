// src/borg/archive_name.rs

//! Expansion of `{hostname}` and `{now}` style placeholders in archive names.
//!
//! Placeholders we don't know are left for the engine to expand.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use regex::Regex;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(hostname|now|utcnow)(?::([^}]*))?\}").expect("archive placeholder pattern is valid")
});

/// Expand `{hostname}`, `{now}`, `{now:FORMAT}`, `{utcnow}` and
/// `{utcnow:FORMAT}` in `format`.
pub fn expand_archive_name(format: &str, hostname: &str, now: DateTime<Local>) -> String {
    PLACEHOLDER
        .replace_all(format, |caps: &regex::Captures<'_>| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let pattern = caps.get(2).map(|m| m.as_str());
            match caps.get(1).map(|m| m.as_str()) {
                Some("hostname") if pattern.is_none() => hostname.to_string(),
                Some("now") => format_time(&now, pattern).unwrap_or_else(|| whole.to_string()),
                Some("utcnow") => format_time(&now.with_timezone(&Utc), pattern)
                    .unwrap_or_else(|| whole.to_string()),
                _ => whole.to_string(),
            }
        })
        .into_owned()
}

/// Format with a strftime pattern, treating `%f` as microseconds. Returns
/// `None` for patterns chrono can't render.
fn format_time<Tz>(time: &DateTime<Tz>, pattern: Option<&str>) -> Option<String>
where
    Tz: chrono::TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let pattern = pattern.unwrap_or("%Y-%m-%dT%H:%M:%S").replace("%f", "%6f");
    let items: Vec<Item<'_>> = StrftimeItems::new(&pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    Some(time.format_with_items(items.into_iter()).to_string())
}
