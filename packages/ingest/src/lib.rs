#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Ingestion and enrichment pipeline.
//!
//! Fetches the case feed, joins it to the population reference table,
//! computes incidence per 100,000 residents, keeps a single reporting date,
//! and persists the result as the enriched CSV table.

pub mod enrich;
pub mod population;
pub mod table;

use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use covid_map_incidence_models::{CaseRecord, EnrichedRecord, PopulationRecord};
use covid_map_source::SourceError;
use thiserror::Error;

pub use enrich::{
    JoinGaps, compute_incidence, enrich, ensure_unique_regions, filter_as_of, latest_date,
    report_join_gaps,
};
pub use population::load_population;
pub use table::{read_enriched, write_enriched};

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Fetching or parsing the case feed failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A required input file does not exist.
    #[error("File not found: {}", .path.display())]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// CSV reading or writing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Spreadsheet reading failed.
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input data could not be interpreted.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// A region code occurs more than once for a single reporting date.
    #[error("Region {region_code} appears more than once on {date}")]
    DuplicateRegion {
        /// The repeated region code.
        region_code: String,
        /// The reporting date of the duplicate rows.
        date: NaiveDate,
    },

    /// Nothing was left to persist after filtering.
    #[error("No case records for {}", describe_as_of(.as_of.as_ref()))]
    NoRecords {
        /// The requested reporting date, if one was given.
        as_of: Option<NaiveDate>,
    },
}

fn describe_as_of(as_of: Option<&NaiveDate>) -> String {
    as_of.map_or_else(|| "any date".to_string(), ToString::to_string)
}

/// Inputs for a single ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Feed URL.
    pub endpoint: String,
    /// Population reference table.
    pub population_path: PathBuf,
    /// Worksheet name for spreadsheet population files.
    pub population_sheet: Option<String>,
    /// Where to write the enriched table.
    pub output_path: PathBuf,
    /// Reporting date to keep. Defaults to the most recent date in the feed.
    pub as_of: Option<NaiveDate>,
}

/// Outcome of a successful ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Reporting date that was kept.
    pub as_of: NaiveDate,
    /// Number of case rows fetched before filtering.
    pub records_fetched: usize,
    /// Number of regions persisted.
    pub regions: usize,
    /// Missing population/incidence counts among the persisted rows.
    pub gaps: JoinGaps,
    /// Path of the enriched table.
    pub output_path: PathBuf,
}

/// Enriched rows for a single reporting date.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// The reporting date every row shares.
    pub as_of: NaiveDate,
    /// One row per region.
    pub records: Vec<EnrichedRecord>,
}

/// Enriches case rows and reduces them to one reporting date.
///
/// Uses `as_of` when given, otherwise the most recent date present.
///
/// # Errors
///
/// Returns [`IngestError::NoRecords`] if no row matches the date and
/// [`IngestError::DuplicateRegion`] if a region is reported twice on it.
pub fn build_snapshot(
    cases: Vec<CaseRecord>,
    population: &[PopulationRecord],
    as_of: Option<NaiveDate>,
) -> Result<Snapshot, IngestError> {
    let enriched = enrich(cases, population);
    let date = as_of.or_else(|| latest_date(&enriched));
    let records = filter_as_of(enriched, date);

    let Some(date) = date.filter(|_| !records.is_empty()) else {
        return Err(IngestError::NoRecords { as_of });
    };

    ensure_unique_regions(&records)?;

    Ok(Snapshot {
        as_of: date,
        records,
    })
}

/// Runs the ingestion pipeline end to end.
///
/// The population table is loaded before the feed is fetched so a missing
/// reference file fails fast. Nothing is written unless every step
/// succeeds.
///
/// # Errors
///
/// Returns [`IngestError`] if fetching, parsing, loading, validation, or
/// writing fails, or if no rows remain for the requested date.
pub async fn run_ingest(
    client: &reqwest::Client,
    options: &IngestOptions,
) -> Result<IngestReport, IngestError> {
    let start = Instant::now();

    let population = load_population(
        &options.population_path,
        options.population_sheet.as_deref(),
    )?;

    let cases = covid_map_source::fetch_case_records(client, &options.endpoint).await?;
    let records_fetched = cases.len();

    let snapshot = build_snapshot(cases, &population, options.as_of)?;
    let gaps = report_join_gaps(&snapshot.records);

    log::info!(
        "Keeping {} of {records_fetched} rows reported on {}",
        snapshot.records.len(),
        snapshot.as_of
    );

    write_enriched(&options.output_path, &snapshot.records)?;

    log::info!(
        "Ingestion finished in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(IngestReport {
        as_of: snapshot.as_of,
        records_fetched,
        regions: snapshot.records.len(),
        gaps,
        output_path: options.output_path.clone(),
    })
}
