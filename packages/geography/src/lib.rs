#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Region geometry loading and enrichment.
//!
//! Loads region polygon fragments from `GeoJSON`, maps their numeric ids to
//! region codes, and attaches the incidence computed during ingestion.
//! Every join is a left join on the geometry side: a fragment is never
//! dropped, only left without a code or incidence.

pub mod fragments;
pub mod join;
pub mod mapping;

use std::path::{Path, PathBuf};

use covid_map_geography_models::{DuplicateMappingError, GeoRecord, RegionIncidence};
use covid_map_ingest::IngestError;
use thiserror::Error;

pub use fragments::load_fragments;
pub use join::{attach_incidence, attach_region_codes};
pub use mapping::load_code_mapping;

/// Errors that can occur while loading or joining region geometry.
#[derive(Debug, Error)]
pub enum GeoError {
    /// A required input file does not exist.
    #[error("File not found: {}", .path.display())]
    FileNotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// I/O error (file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The geometry file is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// A feature could not be turned into a region fragment.
    #[error("Feature {index}: {message}")]
    Conversion {
        /// Position of the feature in the collection.
        index: usize,
        /// Description of what went wrong.
        message: String,
    },

    /// The code mapping lists an id or code twice.
    #[error("Duplicate code mapping: {0}")]
    DuplicateMapping(#[from] DuplicateMappingError),

    /// The enriched table has more than one row for a region.
    #[error("Region {region_code} appears more than once in the enriched table")]
    DuplicateRegion {
        /// The repeated region code.
        region_code: String,
    },

    /// Reading the enriched table failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Input locations for [`load_region_incidence`].
#[derive(Debug, Clone)]
pub struct RegionSources<'a> {
    /// `GeoJSON` file with one or more features per region.
    pub geometry: &'a Path,
    /// Feature property holding the numeric region id.
    pub geometry_id_field: &'a str,
    /// CSV file with `code` and `code_num` columns.
    pub code_mapping: &'a Path,
    /// Enriched table written by ingestion.
    pub enriched: &'a Path,
}

/// Loads fragments, code mapping, and the enriched table, and joins them.
///
/// # Errors
///
/// Returns [`GeoError`] if any input is missing or malformed, or if a join
/// key is duplicated.
pub fn load_region_incidence(
    sources: &RegionSources<'_>,
) -> Result<Vec<GeoRecord<RegionIncidence>>, GeoError> {
    let fragments = load_fragments(sources.geometry, sources.geometry_id_field)?;
    let mapping = load_code_mapping(sources.code_mapping)?;
    let enriched = covid_map_ingest::read_enriched(sources.enriched)?;

    let coded = attach_region_codes(fragments, &mapping);
    attach_incidence(coded, &enriched)
}
