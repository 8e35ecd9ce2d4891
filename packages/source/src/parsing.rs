//! Field-level parsing for feed records.
//!
//! Dates must be strict ISO 8601 calendar dates. Counters tolerate the
//! value shapes the feed actually produces (integers, integral floats,
//! numeric strings, `null`) but reject anything that is not a
//! non-negative whole number.

use chrono::NaiveDate;
use covid_map_incidence_models::FeedField;

use crate::SourceError;

/// Builds a [`SourceError::Parse`] for the given feed field.
fn parse_error(field: FeedField, message: impl Into<String>) -> SourceError {
    SourceError::Parse {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Parses a `YYYY-MM-DD` date.
///
/// chrono's `%m`/`%d` accept single digits, so the shape is checked first
/// to keep `2020-1-5` and `+2020-01-05` out.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the string is not exactly a zero-padded
/// `YYYY-MM-DD` date or names a day that does not exist.
pub fn parse_date(s: &str) -> Result<NaiveDate, SourceError> {
    let bytes = s.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });

    if !well_formed {
        return Err(parse_error(
            FeedField::Date,
            format!("expected YYYY-MM-DD, got '{s}'"),
        ));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| parse_error(FeedField::Date, format!("invalid date '{s}': {e}")))
}

/// Parses the region code field. Surrounding whitespace is trimmed.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the value is missing, not a string, or
/// blank.
pub fn parse_region_code(value: Option<&serde_json::Value>) -> Result<String, SourceError> {
    let code = value
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| parse_error(FeedField::RegionCode, "missing or blank region code"))?;

    Ok(code.to_string())
}

/// Parses a cumulative counter.
///
/// Returns `Ok(None)` for `null`, a missing field, or a blank string.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] for negative, fractional, or
/// non-numeric values.
pub fn parse_counter(
    field: FeedField,
    value: Option<&serde_json::Value>,
) -> Result<Option<u64>, SourceError> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_u64().map_or_else(
            || {
                n.as_f64()
                    .and_then(whole_f64_to_u64)
                    .map(Some)
                    .ok_or_else(|| parse_error(field, format!("not a non-negative integer: {n}")))
            },
            |v| Ok(Some(v)),
        ),
        Some(serde_json::Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            if let Ok(v) = s.parse::<u64>() {
                return Ok(Some(v));
            }
            s.parse::<f64>()
                .ok()
                .and_then(whole_f64_to_u64)
                .map(Some)
                .ok_or_else(|| parse_error(field, format!("not a non-negative integer: '{s}'")))
        }
        Some(other) => Err(parse_error(
            field,
            format!("unexpected value type: {other}"),
        )),
    }
}

/// Converts a float to `u64` if it is finite, non-negative, and whole.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn whole_f64_to_u64(f: f64) -> Option<u64> {
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}
