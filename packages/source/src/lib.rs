#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Remote COVID-19 case feed fetching and record parsing.
//!
//! The feed is a single JSON document with a `records` array. Each record
//! is projected down to the fields named by
//! [`FeedField`](covid_map_incidence_models::FeedField) and parsed into a
//! [`CaseRecord`](covid_map_incidence_models::CaseRecord).

pub mod feed;
pub mod parsing;

pub use feed::{build_client, fetch_case_records, fetch_feed, parse_feed};

/// Errors that can occur while fetching or parsing the case feed.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The endpoint was unreachable or answered with a non-success status.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The endpoint answered, but the payload is not the expected shape.
    #[error("Malformed feed payload: {message}")]
    Payload {
        /// Description of what went wrong.
        message: String,
    },

    /// A date or counter field could not be parsed.
    #[error("Parse error in field '{field}': {message}")]
    Parse {
        /// Wire name of the offending field.
        field: String,
        /// Description of what went wrong.
        message: String,
    },
}
