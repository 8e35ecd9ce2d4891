//! Region code mapping loading.

use std::path::Path;

use covid_map_geography_models::{CodeMapping, CodeMappingEntry};

use crate::GeoError;

/// Loads the `code`/`code_num` mapping between region codes and the
/// numeric ids used by the geometry file.
///
/// Surrounding whitespace in either column is ignored.
///
/// # Errors
///
/// Returns [`GeoError::FileNotFound`] if `path` does not exist,
/// [`GeoError::Csv`] if a row cannot be read, and
/// [`GeoError::DuplicateMapping`] if an id or code appears twice.
pub fn load_code_mapping(path: &Path) -> Result<CodeMapping, GeoError> {
    if !path.is_file() {
        return Err(GeoError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let entries = reader
        .deserialize()
        .collect::<Result<Vec<CodeMappingEntry>, _>>()?;

    let mapping = CodeMapping::from_entries(entries)?;
    if mapping.is_empty() {
        log::warn!(
            "{} maps no regions, no fragment will receive a region code",
            path.display()
        );
        return Ok(mapping);
    }

    log::info!(
        "Loaded {} region code mappings from {}",
        mapping.len(),
        path.display()
    );

    Ok(mapping)
}
