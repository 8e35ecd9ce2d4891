#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Case, population, and enriched incidence record types.
//!
//! These types flow through the ingestion pipeline: [`CaseRecord`]s parsed
//! from the remote feed are joined with [`PopulationRecord`]s into
//! [`EnrichedRecord`]s, which are persisted as the CSV interchange file
//! consumed by the classification pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Incidence is expressed as cases per this many residents.
pub const INCIDENCE_SCALE: f64 = 100_000.0;

/// Column order of the persisted enriched table. This is the interchange
/// contract between ingestion and classification and must not change.
pub const ENRICHED_HEADER: [&str; 8] = [
    "date",
    "abbreviation_canton_and_fl",
    "ncumul_tested_fwd",
    "ncumul_conf_fwd",
    "ncumul_hosp_fwd",
    "ncumul_deceased_fwd",
    "population",
    "incidence",
];

/// The fields consumed from each record of the remote case feed. Anything
/// else in a feed record is discarded.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter,
)]
pub enum FeedField {
    /// Reporting date (`YYYY-MM-DD`).
    #[strum(serialize = "date")]
    Date,
    /// Canton (or Liechtenstein) abbreviation, e.g. `"ZH"`.
    #[strum(serialize = "abbreviation_canton_and_fl")]
    RegionCode,
    /// Cumulative number of tests, forward-filled.
    #[strum(serialize = "ncumul_tested_fwd")]
    TestedCumulative,
    /// Cumulative confirmed cases, forward-filled.
    #[strum(serialize = "ncumul_conf_fwd")]
    ConfirmedCumulative,
    /// Cumulative hospitalizations, forward-filled.
    #[strum(serialize = "ncumul_hosp_fwd")]
    HospitalizedCumulative,
    /// Cumulative deaths, forward-filled.
    #[strum(serialize = "ncumul_deceased_fwd")]
    DeceasedCumulative,
}

impl FeedField {
    /// Whether the field is one of the four cumulative counters.
    #[must_use]
    pub const fn is_counter(self) -> bool {
        !matches!(self, Self::Date | Self::RegionCode)
    }
}

/// One row of the case feed for a single region and reporting date.
///
/// Counters are `None` where the feed has a gap. Gaps are kept as-is and
/// never defaulted to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseRecord {
    /// Reporting date.
    pub date: NaiveDate,
    /// Short region code (e.g. `"BE"`).
    pub region_code: String,
    /// Cumulative tests.
    pub tested_cumulative: Option<u64>,
    /// Cumulative confirmed cases.
    pub confirmed_cumulative: Option<u64>,
    /// Cumulative hospitalizations.
    pub hospitalized_cumulative: Option<u64>,
    /// Cumulative deaths.
    pub deceased_cumulative: Option<u64>,
}

/// Total population of a region, summed over all of its sub-regions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationRecord {
    /// Short region code.
    pub region_code: String,
    /// Number of residents.
    pub population: u64,
}

/// A [`CaseRecord`] joined with its region's population and derived
/// incidence.
///
/// Serializes with the column names and order of [`ENRICHED_HEADER`].
/// `None` values are written as empty fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Reporting date.
    pub date: NaiveDate,
    /// Short region code.
    #[serde(rename = "abbreviation_canton_and_fl")]
    pub region_code: String,
    /// Cumulative tests.
    #[serde(rename = "ncumul_tested_fwd")]
    pub tested_cumulative: Option<u64>,
    /// Cumulative confirmed cases.
    #[serde(rename = "ncumul_conf_fwd")]
    pub confirmed_cumulative: Option<u64>,
    /// Cumulative hospitalizations.
    #[serde(rename = "ncumul_hosp_fwd")]
    pub hospitalized_cumulative: Option<u64>,
    /// Cumulative deaths.
    #[serde(rename = "ncumul_deceased_fwd")]
    pub deceased_cumulative: Option<u64>,
    /// Population of the region, `None` when the region has no population
    /// entry.
    pub population: Option<u64>,
    /// Confirmed cases per 100,000 residents, `None` when it cannot be
    /// computed.
    pub incidence: Option<f64>,
}

impl EnrichedRecord {
    /// Builds an enriched record from a case row, the region's population,
    /// and the already computed incidence.
    #[must_use]
    pub fn new(case: CaseRecord, population: Option<u64>, incidence: Option<f64>) -> Self {
        Self {
            date: case.date,
            region_code: case.region_code,
            tested_cumulative: case.tested_cumulative,
            confirmed_cumulative: case.confirmed_cumulative,
            hospitalized_cumulative: case.hospitalized_cumulative,
            deceased_cumulative: case.deceased_cumulative,
            population,
            incidence,
        }
    }
}
