//! Incidence ranking of enriched regions.

use std::cmp::Ordering;

use covid_map_incidence_models::EnrichedRecord;

/// Sorts regions by incidence, highest first.
///
/// Regions without incidence come last. Ties are broken by region code so
/// the order is stable across runs. `limit` caps the number of rows.
#[must_use]
pub fn rank_regions(records: &[EnrichedRecord], limit: Option<usize>) -> Vec<&EnrichedRecord> {
    let mut ranked: Vec<&EnrichedRecord> = records.iter().collect();
    ranked.sort_by(|a, b| {
        compare_incidence_desc(a.incidence, b.incidence)
            .then_with(|| a.region_code.cmp(&b.region_code))
    });

    if let Some(limit) = limit {
        ranked.truncate(limit);
    }

    ranked
}

fn compare_incidence_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
