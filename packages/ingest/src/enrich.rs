//! Population join, incidence computation, and reporting-date filtering.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use covid_map_incidence_models::{
    CaseRecord, EnrichedRecord, INCIDENCE_SCALE, PopulationRecord,
};

use crate::IngestError;

/// Confirmed cases per 100,000 residents.
///
/// Returns `None` when either input is missing or the population is zero,
/// so a region without usable data is never reported as zero incidence or
/// as infinity.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_incidence(confirmed: Option<u64>, population: Option<u64>) -> Option<f64> {
    let confirmed = confirmed?;
    let population = population.filter(|p| *p > 0)?;
    Some(confirmed as f64 / population as f64 * INCIDENCE_SCALE)
}

/// Left-joins case rows to the population table on region code and
/// computes incidence.
///
/// Case rows without a population entry are kept with `population` and
/// `incidence` set to `None`.
#[must_use]
pub fn enrich(cases: Vec<CaseRecord>, population: &[PopulationRecord]) -> Vec<EnrichedRecord> {
    let by_region: BTreeMap<&str, u64> = population
        .iter()
        .map(|p| (p.region_code.as_str(), p.population))
        .collect();

    cases
        .into_iter()
        .map(|case| {
            let population = by_region.get(case.region_code.as_str()).copied();
            let incidence = compute_incidence(case.confirmed_cumulative, population);
            EnrichedRecord::new(case, population, incidence)
        })
        .collect()
}

/// The most recent reporting date in `records`.
#[must_use]
pub fn latest_date(records: &[EnrichedRecord]) -> Option<NaiveDate> {
    records.iter().map(|r| r.date).max()
}

/// Keeps only the rows reported on `as_of`, or on the most recent date when
/// `as_of` is `None`.
///
/// Applying the filter to its own output returns the same rows.
#[must_use]
pub fn filter_as_of(records: Vec<EnrichedRecord>, as_of: Option<NaiveDate>) -> Vec<EnrichedRecord> {
    let Some(date) = as_of.or_else(|| latest_date(&records)) else {
        return records;
    };

    records.into_iter().filter(|r| r.date == date).collect()
}

/// Checks that every region code appears at most once.
///
/// # Errors
///
/// Returns [`IngestError::DuplicateRegion`] for the first repeated code.
pub fn ensure_unique_regions(records: &[EnrichedRecord]) -> Result<(), IngestError> {
    let mut seen = BTreeSet::new();
    for record in records {
        if !seen.insert(record.region_code.as_str()) {
            return Err(IngestError::DuplicateRegion {
                region_code: record.region_code.clone(),
                date: record.date,
            });
        }
    }
    Ok(())
}

/// Data-quality counts for an enriched table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinGaps {
    /// Rows whose region has no population entry.
    pub without_population: usize,
    /// Rows whose incidence could not be computed.
    pub without_incidence: usize,
}

/// Counts rows with missing population or incidence and logs the affected
/// regions.
#[must_use]
pub fn report_join_gaps(records: &[EnrichedRecord]) -> JoinGaps {
    let missing_population: Vec<&str> = records
        .iter()
        .filter(|r| r.population.is_none())
        .map(|r| r.region_code.as_str())
        .collect();
    let missing_incidence: Vec<&str> = records
        .iter()
        .filter(|r| r.incidence.is_none())
        .map(|r| r.region_code.as_str())
        .collect();

    if !missing_population.is_empty() {
        log::warn!(
            "No population for {} region(s): {}",
            missing_population.len(),
            missing_population.join(", ")
        );
    }
    if !missing_incidence.is_empty() {
        log::warn!(
            "Incidence undefined for {} region(s): {}",
            missing_incidence.len(),
            missing_incidence.join(", ")
        );
    }

    JoinGaps {
        without_population: missing_population.len(),
        without_incidence: missing_incidence.len(),
    }
}
