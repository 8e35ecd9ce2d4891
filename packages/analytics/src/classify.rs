//! Assigns every region fragment to an incidence class.

use std::collections::{BTreeMap, BTreeSet};

use covid_map_analytics_models::{
    BreakBasis, ClassSummary, Classification, ClassificationSummary, ClassifiedRegion,
    QuantileBreaks,
};
use covid_map_geography_models::{GeoRecord, RegionIncidence};

use crate::quantile::compute_breaks;

/// Incidence values the breaks are computed over.
///
/// With [`BreakBasis::Regions`] each region code contributes once, no matter
/// how many fragments it has.
#[must_use]
pub fn break_values(regions: &[GeoRecord<RegionIncidence>], basis: BreakBasis) -> Vec<f64> {
    match basis {
        BreakBasis::Fragments => regions
            .iter()
            .filter_map(|r| r.attributes.incidence)
            .collect(),
        BreakBasis::Regions => {
            let mut by_code: BTreeMap<&str, f64> = BTreeMap::new();
            for region in regions {
                let attrs = &region.attributes;
                if let (Some(code), Some(incidence)) = (attrs.region_code.as_deref(), attrs.incidence)
                {
                    by_code.entry(code).or_insert(incidence);
                }
            }
            by_code.into_values().collect()
        }
    }
}

/// Computes quantile breaks and assigns a bin to every fragment.
///
/// Fragments with missing incidence stay in the result with no bin. When no
/// fragment has an incidence value there are no breaks and every fragment
/// is unclassified.
#[must_use]
pub fn classify(
    regions: Vec<GeoRecord<RegionIncidence>>,
    n_classes: usize,
    basis: BreakBasis,
) -> Classification {
    let values = break_values(&regions, basis);
    let breaks = compute_breaks(&values, n_classes);

    match &breaks {
        Some(b) => {
            log::info!(
                "Computed {n_classes} quantile classes over {} {basis} values: {:?}",
                values.len(),
                b.labels()
            );
            let effective = b.effective_bins().len();
            if effective < b.class_count() {
                log::warn!(
                    "Repeated breaks leave {effective} of {} classes non-empty",
                    b.class_count()
                );
            }
        }
        None => log::warn!(
            "No incidence values to classify, all {} fragments are unclassified",
            regions.len()
        ),
    }

    let regions = regions
        .into_iter()
        .map(|region| {
            region.map(|attrs| {
                let bin_index = breaks.as_ref().and_then(|b| b.assign(attrs.incidence));
                let incidence_bin = breaks.as_ref().and_then(|b| b.label_for(attrs.incidence));
                ClassifiedRegion {
                    region_id: attrs.region_id,
                    region_code: attrs.region_code,
                    incidence: attrs.incidence,
                    bin_index,
                    incidence_bin,
                }
            })
        })
        .collect();

    Classification { breaks, regions }
}

/// Counts fragments and distinct regions per effective bin.
#[must_use]
pub fn summarize(classification: &Classification) -> ClassificationSummary {
    let bins = classification
        .breaks
        .as_ref()
        .map(QuantileBreaks::effective_bins)
        .unwrap_or_default();

    let classes = bins
        .into_iter()
        .map(|bin| {
            let members: Vec<&ClassifiedRegion> = classification
                .regions
                .iter()
                .map(|r| &r.attributes)
                .filter(|a| a.bin_index == Some(bin.index))
                .collect();
            let regions: BTreeSet<&str> = members
                .iter()
                .filter_map(|a| a.region_code.as_deref())
                .collect();

            ClassSummary {
                fragments: members.len(),
                regions: regions.len(),
                bin,
            }
        })
        .collect();

    ClassificationSummary {
        classes,
        unclassified_fragments: classification.unclassified().count(),
    }
}

#[cfg(test)]
mod tests {
    use geo::{LineString, MultiPolygon, Polygon};

    use super::*;

    fn region(region_id: i64, code: Option<&str>, incidence: Option<f64>) -> GeoRecord<RegionIncidence> {
        let exterior = LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        GeoRecord::new(
            MultiPolygon(vec![Polygon::new(exterior, vec![])]),
            RegionIncidence {
                region_id,
                region_code: code.map(str::to_string),
                incidence,
            },
        )
    }

    fn cantons() -> Vec<GeoRecord<RegionIncidence>> {
        vec![
            region(1, Some("ZH"), Some(4246.808)),
            region(2, Some("BE"), Some(5028.254)),
            // Second fragment of BE.
            region(2, Some("BE"), Some(5028.254)),
            region(3, Some("LU"), Some(8930.688)),
            region(4, Some("UR"), Some(4661.523)),
            region(5, Some("SZ"), Some(7911.581)),
            region(6, Some("OW"), Some(5190.643)),
            region(7, Some("NW"), None),
            region(99, None, None),
        ]
    }

    #[test]
    fn region_basis_counts_enclaves_once() {
        let regions = cantons();
        assert_eq!(break_values(&regions, BreakBasis::Regions).len(), 6);
        assert_eq!(break_values(&regions, BreakBasis::Fragments).len(), 7);
    }

    #[test]
    fn default_basis_weighs_every_fragment() {
        let mut regions: Vec<_> = (0..4).map(|_| region(1, Some("A"), Some(100.0))).collect();
        let others = [("B", 200.0), ("C", 300.0), ("D", 400.0), ("E", 500.0), ("F", 600.0)];
        for (id, (code, incidence)) in (2..).zip(others) {
            regions.push(region(id, Some(code), Some(incidence)));
        }

        let classification = classify(regions.clone(), 5, BreakBasis::default());
        assert_eq!(
            classification.breaks.as_ref().unwrap().labels(),
            vec!["100-100", "100-120", "120-280", "280-440", "440-600"]
        );

        let per_region = classify(regions, 5, BreakBasis::Regions);
        assert_eq!(
            per_region.breaks.as_ref().unwrap().labels(),
            vec!["100-200", "200-300", "300-400", "400-500", "500-600"]
        );
    }

    #[test]
    fn six_values_give_their_own_breaks() {
        let classification = classify(cantons(), 5, BreakBasis::Regions);
        let breaks = classification.breaks.as_ref().unwrap();
        assert_eq!(
            breaks.labels(),
            vec![
                "4247-4662",
                "4662-5028",
                "5028-5191",
                "5191-7912",
                "7912-8931"
            ]
        );

        let bins: Vec<_> = classification
            .regions
            .iter()
            .map(|r| r.attributes.bin_index)
            .collect();
        assert_eq!(
            bins,
            vec![
                Some(0),
                Some(1),
                Some(1),
                Some(4),
                Some(0),
                Some(3),
                Some(2),
                None,
                None
            ]
        );
        assert_eq!(
            classification.regions[3].attributes.incidence_bin.as_deref(),
            Some("7912-8931")
        );
    }

    #[test]
    fn enclaves_share_a_bin() {
        let classification = classify(cantons(), 5, BreakBasis::Regions);
        let be: Vec<_> = classification
            .regions
            .iter()
            .filter(|r| r.attributes.region_code.as_deref() == Some("BE"))
            .map(|r| (r.attributes.bin_index, r.attributes.incidence_bin.clone()))
            .collect();
        assert_eq!(be.len(), 2);
        assert_eq!(be[0], be[1]);
    }

    #[test]
    fn missing_incidence_is_kept_without_bin() {
        let classification = classify(cantons(), 5, BreakBasis::Regions);
        assert_eq!(classification.regions.len(), 9);
        let nw = &classification.regions[7].attributes;
        assert_eq!(nw.region_code.as_deref(), Some("NW"));
        assert_eq!(nw.bin_index, None);
        assert_eq!(nw.incidence_bin, None);
    }

    #[test]
    fn equal_incidence_does_not_fail() {
        let regions = vec![
            region(1, Some("ZH"), Some(100.0)),
            region(2, Some("BE"), Some(100.0)),
            region(3, Some("LU"), Some(100.0)),
        ];
        let classification = classify(regions, 5, BreakBasis::Regions);
        assert!(
            classification
                .regions
                .iter()
                .all(|r| r.attributes.bin_index == Some(0))
        );

        let summary = summarize(&classification);
        assert_eq!(summary.classes.len(), 1);
        assert_eq!(summary.classes[0].fragments, 3);
        assert_eq!(summary.classes[0].bin.label, "100-100");
    }

    #[test]
    fn no_values_leaves_everything_unclassified() {
        let regions = vec![region(1, Some("ZH"), None), region(2, None, None)];
        let classification = classify(regions, 5, BreakBasis::Regions);
        assert_eq!(classification.breaks, None);

        let summary = summarize(&classification);
        assert!(summary.classes.is_empty());
        assert_eq!(summary.unclassified_fragments, 2);
    }

    #[test]
    fn summary_counts_fragments_and_regions() {
        let summary = summarize(&classify(cantons(), 5, BreakBasis::Regions));

        let counts: Vec<_> = summary
            .classes
            .iter()
            .map(|c| (c.bin.index, c.fragments, c.regions))
            .collect();
        assert_eq!(
            counts,
            vec![(0, 2, 2), (1, 2, 1), (2, 1, 1), (3, 1, 1), (4, 1, 1)]
        );
        assert_eq!(summary.unclassified_fragments, 2);
    }
}
