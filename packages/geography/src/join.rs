//! Left joins from region fragments to codes and incidence.

use std::collections::{BTreeMap, BTreeSet};

use covid_map_geography_models::{
    CodeMapping, CodedFragment, GeoRecord, RegionFragment, RegionIncidence,
};
use covid_map_incidence_models::EnrichedRecord;

use crate::GeoError;

/// Attaches the region code to every fragment by numeric id.
///
/// Fragments whose id has no mapping keep `region_code = None`; the
/// unmapped ids are logged.
#[must_use]
pub fn attach_region_codes(
    fragments: Vec<GeoRecord<RegionFragment>>,
    mapping: &CodeMapping,
) -> Vec<GeoRecord<CodedFragment>> {
    let mut unmapped = BTreeSet::new();

    let coded: Vec<_> = fragments
        .into_iter()
        .map(|fragment| {
            fragment.map(|RegionFragment { region_id }| {
                let region_code = mapping.code(region_id).map(str::to_string);
                if region_code.is_none() {
                    unmapped.insert(region_id);
                }
                CodedFragment {
                    region_id,
                    region_code,
                }
            })
        })
        .collect();

    if !unmapped.is_empty() {
        log::warn!(
            "No region code for {} region id(s): {}",
            unmapped.len(),
            join_display(&unmapped)
        );
    }

    coded
}

/// Attaches incidence to every fragment by region code.
///
/// Only the incidence column of the enriched table is carried over.
/// Fragments without a code, or whose code has no row, get
/// `incidence = None`. Enriched regions without any fragment are logged.
///
/// # Errors
///
/// Returns [`GeoError::DuplicateRegion`] if `enriched` lists a region code
/// more than once.
pub fn attach_incidence(
    fragments: Vec<GeoRecord<CodedFragment>>,
    enriched: &[EnrichedRecord],
) -> Result<Vec<GeoRecord<RegionIncidence>>, GeoError> {
    let mut by_code: BTreeMap<&str, Option<f64>> = BTreeMap::new();
    for record in enriched {
        if by_code
            .insert(record.region_code.as_str(), record.incidence)
            .is_some()
        {
            return Err(GeoError::DuplicateRegion {
                region_code: record.region_code.clone(),
            });
        }
    }

    let mut covered = BTreeSet::new();
    let mut without_cases = BTreeSet::new();

    let joined: Vec<_> = fragments
        .into_iter()
        .map(|fragment| {
            fragment.map(|CodedFragment { region_id, region_code }| {
                let incidence = match region_code.as_deref() {
                    Some(code) => {
                        if let Some((key, incidence)) = by_code.get_key_value(code) {
                            covered.insert(*key);
                            *incidence
                        } else {
                            without_cases.insert(code.to_string());
                            None
                        }
                    }
                    None => None,
                };
                RegionIncidence {
                    region_id,
                    region_code,
                    incidence,
                }
            })
        })
        .collect();

    if !without_cases.is_empty() {
        log::warn!(
            "No case data for {} mapped region(s): {}",
            without_cases.len(),
            join_display(&without_cases)
        );
    }

    let uncovered: BTreeSet<&str> = by_code
        .keys()
        .copied()
        .filter(|code| !covered.contains(code))
        .collect();
    if !uncovered.is_empty() {
        log::warn!(
            "No geometry for {} region(s) with case data: {}",
            uncovered.len(),
            join_display(&uncovered)
        );
    }

    Ok(joined)
}

fn join_display<T: std::fmt::Display>(items: &BTreeSet<T>) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
