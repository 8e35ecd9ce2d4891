//! Case feed download and projection.
//!
//! The feed answers a single GET with `{"records": [...]}`. Only the six
//! [`FeedField`]s are read from each record; every other field is
//! dropped.

use std::time::Duration;

use covid_map_incidence_models::{CaseRecord, FeedField};
use strum::IntoEnumIterator as _;

use crate::SourceError;
use crate::parsing::{parse_counter, parse_date, parse_region_code};

/// User-Agent sent with feed requests.
const USER_AGENT: &str = concat!("covid_map/", env!("CARGO_PKG_VERSION"));

/// Maximum length of the response body preview included in error messages.
const BODY_PREVIEW_LEN: usize = 200;

/// Builds a `reqwest::Client` for feed requests.
///
/// # Errors
///
/// Returns [`SourceError::Fetch`] if the client cannot be built.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(Into::into)
}

/// Truncates a string for error messages, appending "..." if it exceeds
/// `max_len`.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Downloads the raw feed document.
///
/// Makes exactly one request. There is no retry: an unreachable endpoint
/// aborts the run.
///
/// # Errors
///
/// Returns [`SourceError::Fetch`] if the request fails or the server
/// answers with a non-success status, and [`SourceError::Payload`] if the
/// body is not JSON.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
) -> Result<serde_json::Value, SourceError> {
    log::info!("Fetching case feed from {url}");

    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.text().await?;

    log::debug!("Downloaded {} bytes from {url}", body.len());

    serde_json::from_str(&body).map_err(|e| SourceError::Payload {
        message: format!(
            "response is not JSON ({e}): {}",
            truncate_for_log(&body, BODY_PREVIEW_LEN)
        ),
    })
}

/// Parses the feed document into case records.
///
/// # Errors
///
/// Returns [`SourceError::Payload`] if there is no `records` array or a
/// record is not an object, and [`SourceError::Parse`] if any consumed
/// field fails to parse.
pub fn parse_feed(feed: &serde_json::Value) -> Result<Vec<CaseRecord>, SourceError> {
    let records = feed
        .get("records")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| SourceError::Payload {
            message: "no 'records' array in feed".to_string(),
        })?;

    let cases = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let fields = record.as_object().ok_or_else(|| SourceError::Payload {
                message: format!("record {i} is not an object"),
            })?;
            parse_record(fields)
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("Parsed {} case records", cases.len());

    Ok(cases)
}

/// Projects a single feed record onto the consumed fields and parses them.
fn parse_record(
    fields: &serde_json::Map<String, serde_json::Value>,
) -> Result<CaseRecord, SourceError> {
    let get = |field: FeedField| {
        let key: &str = field.as_ref();
        fields.get(key)
    };

    let date_str = get(FeedField::Date)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| SourceError::Parse {
            field: FeedField::Date.to_string(),
            message: "missing or non-string date".to_string(),
        })?;

    let mut counters = [None; 4];
    for (slot, field) in counters
        .iter_mut()
        .zip(FeedField::iter().filter(|f| f.is_counter()))
    {
        *slot = parse_counter(field, get(field))?;
    }
    let [tested, confirmed, hospitalized, deceased] = counters;

    Ok(CaseRecord {
        date: parse_date(date_str)?,
        region_code: parse_region_code(get(FeedField::RegionCode))?,
        tested_cumulative: tested,
        confirmed_cumulative: confirmed,
        hospitalized_cumulative: hospitalized,
        deceased_cumulative: deceased,
    })
}

/// Fetches and parses the case feed.
///
/// # Errors
///
/// Returns [`SourceError`] if fetching or parsing fails.
pub async fn fetch_case_records(
    client: &reqwest::Client,
    url: &str,
) -> Result<Vec<CaseRecord>, SourceError> {
    let feed = fetch_feed(client, url).await?;
    parse_feed(&feed)
}
