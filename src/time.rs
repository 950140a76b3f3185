//! Timestamp normalization.
//!
//! Client timestamps arrive as ISO-8601-ish strings, with or without a zone.
//! Everything is reduced to whole Unix seconds in UTC and rendered back in a
//! single canonical form, `YYYY-MM-DDTHH:MM:SSZ`, which sorts
//! lexicographically in time order for every accepted year.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::engine::EngineError;
use crate::limits::*;
use crate::model::{Secs, Span};

const CANONICAL: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Formats carrying an explicit offset (`+0200` or `+02:00`).
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%dT%H:%M%:z",
];

/// Zone-less formats, read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parse a client timestamp into UTC seconds. Fractional seconds are truncated.
pub fn normalize(raw: &str) -> Result<Secs, EngineError> {
    let s = raw.trim();
    if s.is_empty() || s.len() > MAX_TIMESTAMP_LEN {
        return Err(invalid(raw));
    }
    let secs = parse_utc(s).ok_or_else(|| invalid(raw))?;
    if !(MIN_VALID_TIMESTAMP..=MAX_VALID_TIMESTAMP).contains(&secs) {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    Ok(secs)
}

/// Normalize both ends and require `start < end`.
pub fn parse_span(start: &str, end: &str) -> Result<Span, EngineError> {
    let start = normalize(start)?;
    let end = normalize(end)?;
    if start >= end {
        return Err(EngineError::InvalidInterval { start, end });
    }
    Ok(Span::new(start, end))
}

/// Render UTC seconds in canonical form.
pub fn format(secs: Secs) -> String {
    match DateTime::<Utc>::from_timestamp(secs, 0) {
        Some(dt) => dt.format(CANONICAL).to_string(),
        None => secs.to_string(),
    }
}

fn parse_utc(s: &str) -> Option<Secs> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp());
    }
    // A bare `Z` suffix on a shape RFC 3339 rejects (e.g. no seconds).
    if let Some(naive) = s.strip_suffix(['Z', 'z']) {
        return parse_naive(naive);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.timestamp());
        }
    }
    parse_naive(s)
}

fn parse_naive(s: &str) -> Option<Secs> {
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc().timestamp());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc().timestamp())
}

fn invalid(raw: &str) -> EngineError {
    let shown: String = raw.chars().take(MAX_TIMESTAMP_LEN).collect();
    EngineError::InvalidFormat(shown)
}
