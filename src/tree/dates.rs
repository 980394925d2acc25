//! ISO-8601 date-time detection and revival of stored date text.

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::copy::deep_copy;
use super::value::Tree;

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`, the shape `JSON.stringify` gives a date.
static ISO_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$").expect("static pattern compiles")
});

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Parse text that is exactly an ISO-8601 millisecond UTC timestamp.
///
/// Text that has the right shape but names an impossible instant
/// (month 13, second 61) is rejected.
pub fn parse_iso_date_time(text: &str) -> Option<DateTime<Utc>> {
    if !ISO_DATE_TIME.is_match(text) {
        return None;
    }
    NaiveDateTime::parse_from_str(text, ISO_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_iso_date_time(date: &DateTime<Utc>) -> String {
    date.format(ISO_FORMAT).to_string()
}

/// Copy a stored mapping, turning top-level date text back into date leaves.
///
/// Only direct properties are revived; nested containers are copied as-is.
pub fn revive_dates(value: &Tree) -> Tree {
    let mut revived = deep_copy(value);
    if let Some(map) = revived.as_object_mut() {
        for field in map.values_mut() {
            let date = field.as_str().and_then(parse_iso_date_time);
            if let Some(date) = date {
                *field = Tree::Date(date);
            }
        }
    }
    revived
}
