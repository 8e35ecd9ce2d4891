//! Enriched table persistence.
//!
//! The CSV written here is the only interchange point between ingestion and
//! classification. Its header is fixed by
//! [`ENRICHED_HEADER`](covid_map_incidence_models::ENRICHED_HEADER).

use std::path::Path;

use covid_map_config::paths;
use covid_map_incidence_models::{ENRICHED_HEADER, EnrichedRecord};

use crate::IngestError;

/// Writes the enriched table, replacing any existing file atomically.
///
/// The header row is always written, even for an empty table.
///
/// # Errors
///
/// Returns [`IngestError`] if the directory, temporary file, or rename
/// fails. A failed write leaves any existing table untouched and no
/// temporary file behind.
pub fn write_enriched(path: &Path, records: &[EnrichedRecord]) -> Result<(), IngestError> {
    paths::write_atomic(path, |tmp| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(tmp)?;
        writer.write_record(ENRICHED_HEADER)?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok::<_, IngestError>(())
    })?;

    log::info!("Persisted {} enriched rows", records.len());
    Ok(())
}

/// Reads an enriched table written by [`write_enriched`].
///
/// # Errors
///
/// Returns [`IngestError::FileNotFound`] if `path` does not exist,
/// [`IngestError::Parse`] if the header differs from the contract, and
/// [`IngestError::Csv`] if a row cannot be deserialized.
pub fn read_enriched(path: &Path) -> Result<Vec<EnrichedRecord>, IngestError> {
    if !path.is_file() {
        return Err(IngestError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::Reader::from_path(path)?;

    let headers: Vec<&str> = reader.headers()?.iter().map(str::trim).collect();
    if headers != ENRICHED_HEADER {
        return Err(IngestError::Parse {
            message: format!(
                "{} has header [{}], expected [{}]",
                path.display(),
                headers.join(","),
                ENRICHED_HEADER.join(",")
            ),
        });
    }

    let records = reader
        .deserialize()
        .collect::<Result<Vec<EnrichedRecord>, _>>()?;

    log::info!(
        "Read {} enriched rows from {}",
        records.len(),
        path.display()
    );

    Ok(records)
}
