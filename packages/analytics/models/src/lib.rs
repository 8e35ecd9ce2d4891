#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Quantile classification types.
//!
//! [`QuantileBreaks`] holds the class boundaries and owns the bin
//! membership rule: the lowest bin is closed on both ends (`[b0, b1]`),
//! every later bin is closed on the right only (`(b_i, b_{i+1}]`).
//! Repeated boundaries produce empty bins rather than errors.

use covid_map_geography_models::GeoRecord;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Default number of quantile classes.
pub const DEFAULT_CLASS_COUNT: usize = 5;

/// Which incidence values the quantile breaks are computed over.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BreakBasis {
    /// One value per polygon fragment, so regions with enclaves weigh
    /// more.
    #[default]
    Fragments,
    /// One value per region code. A region split into several fragments
    /// counts once.
    Regions,
}

/// Ordered class boundaries.
///
/// Always holds at least two finite, non-decreasing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct QuantileBreaks {
    breaks: Vec<f64>,
}

/// Why a boundary list was rejected by [`QuantileBreaks::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidBreaksError {
    /// Fewer than two boundaries.
    TooFew,
    /// A boundary is NaN or infinite.
    NotFinite,
    /// A boundary is smaller than its predecessor.
    Decreasing,
}

impl std::fmt::Display for InvalidBreaksError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFew => write!(f, "at least two breaks are required"),
            Self::NotFinite => write!(f, "breaks must be finite"),
            Self::Decreasing => write!(f, "breaks must be non-decreasing"),
        }
    }
}

impl std::error::Error for InvalidBreaksError {}

impl TryFrom<Vec<f64>> for QuantileBreaks {
    type Error = InvalidBreaksError;

    fn try_from(breaks: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(breaks)
    }
}

impl From<QuantileBreaks> for Vec<f64> {
    fn from(breaks: QuantileBreaks) -> Self {
        breaks.breaks
    }
}

impl QuantileBreaks {
    /// Validates and wraps a boundary list.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBreaksError`] if there are fewer than two
    /// boundaries, any is not finite, or the list decreases anywhere.
    pub fn new(breaks: Vec<f64>) -> Result<Self, InvalidBreaksError> {
        if breaks.len() < 2 {
            return Err(InvalidBreaksError::TooFew);
        }
        if !breaks.iter().all(|b| b.is_finite()) {
            return Err(InvalidBreaksError::NotFinite);
        }
        if breaks.windows(2).any(|w| w[1] < w[0]) {
            return Err(InvalidBreaksError::Decreasing);
        }
        Ok(Self { breaks })
    }

    /// The boundaries, lowest first.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.breaks
    }

    /// Number of nominal classes (one fewer than the boundaries).
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.breaks.len() - 1
    }

    /// Every nominal bin, including empty ones from repeated boundaries.
    #[must_use]
    pub fn bins(&self) -> Vec<IncidenceBin> {
        self.breaks
            .windows(2)
            .enumerate()
            .map(|(index, w)| IncidenceBin::new(index, w[0], w[1]))
            .collect()
    }

    /// Labels of every nominal bin, lowest first.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.bins().into_iter().map(|bin| bin.label).collect()
    }

    /// Bins that can hold a value: the lowest bin plus every bin of
    /// positive width. When all boundaries are equal this is the lowest
    /// bin alone.
    #[must_use]
    pub fn effective_bins(&self) -> Vec<IncidenceBin> {
        self.bins()
            .into_iter()
            .filter(|bin| bin.index == 0 || bin.upper > bin.lower)
            .collect()
    }

    /// Index of the bin holding `value`.
    ///
    /// Returns `None` for a missing or non-finite value and for a value
    /// outside `[b0, bn]`.
    #[must_use]
    pub fn assign(&self, value: Option<f64>) -> Option<usize> {
        let value = value.filter(|v| v.is_finite())?;
        let first = *self.breaks.first()?;
        let last = *self.breaks.last()?;
        if value < first || value > last {
            return None;
        }

        // Upper bounds are inclusive, so the first bin whose upper bound
        // reaches the value holds it.
        self.breaks[1..].iter().position(|upper| value <= *upper)
    }

    /// Label of the bin holding `value`.
    #[must_use]
    pub fn label_for(&self, value: Option<f64>) -> Option<String> {
        self.assign(value)
            .map(|index| format_label(self.breaks[index], self.breaks[index + 1]))
    }
}

/// Formats a bin label as `"{lower}-{upper}"` with both bounds rounded to
/// the nearest integer, halves to even (`0.5` is `0`, `2.5` is `2`).
#[must_use]
pub fn format_label(lower: f64, upper: f64) -> String {
    format!("{}-{}", round_bound(lower), round_bound(upper))
}

fn round_bound(value: f64) -> f64 {
    // Adding zero turns -0.0 into 0.0 so it never prints as "-0".
    value.round_ties_even() + 0.0
}

/// One class of a choropleth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidenceBin {
    /// Position in the ordered list of nominal bins.
    pub index: usize,
    /// Lower boundary (inclusive only for bin 0).
    pub lower: f64,
    /// Upper boundary (inclusive).
    pub upper: f64,
    /// Human-readable range, e.g. `"4247-4662"`.
    pub label: String,
}

impl IncidenceBin {
    /// Creates a bin and its label.
    #[must_use]
    pub fn new(index: usize, lower: f64, upper: f64) -> Self {
        Self {
            index,
            lower,
            upper,
            label: format_label(lower, upper),
        }
    }
}

/// Attributes of a classified polygon fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedRegion {
    /// Numeric region identifier.
    pub region_id: i64,
    /// Short region code, `None` when unmapped.
    pub region_code: Option<String>,
    /// Confirmed cases per 100,000 residents.
    pub incidence: Option<f64>,
    /// Index of the assigned bin, `None` when the fragment is unclassified.
    pub bin_index: Option<usize>,
    /// Label of the assigned bin.
    pub incidence_bin: Option<String>,
}

/// Result of classifying every fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Class boundaries, `None` when no incidence value was available.
    pub breaks: Option<QuantileBreaks>,
    /// Every input fragment, in input order.
    pub regions: Vec<GeoRecord<ClassifiedRegion>>,
}

impl Classification {
    /// Fragments without a bin.
    pub fn unclassified(&self) -> impl Iterator<Item = &GeoRecord<ClassifiedRegion>> {
        self.regions
            .iter()
            .filter(|r| r.attributes.bin_index.is_none())
    }
}

/// Per-bin counts of a [`Classification`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    /// The bin being counted.
    pub bin: IncidenceBin,
    /// Number of fragments in the bin.
    pub fragments: usize,
    /// Number of distinct region codes in the bin.
    pub regions: usize,
}

/// Counts for every effective bin plus the fragments left unclassified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationSummary {
    /// One entry per effective bin, lowest first.
    pub classes: Vec<ClassSummary>,
    /// Fragments with no bin (missing incidence or no breaks).
    pub unclassified_fragments: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaks(values: &[f64]) -> QuantileBreaks {
        QuantileBreaks::new(values.to_vec()).unwrap()
    }

    #[test]
    fn labels_round_both_bounds() {
        let b = breaks(&[4246.808, 4661.523, 5028.254, 5190.643, 7911.581, 8930.688]);
        assert_eq!(
            b.labels(),
            vec![
                "4247-4662",
                "4662-5028",
                "5028-5191",
                "5191-7912",
                "7912-8931"
            ]
        );
    }

    #[test]
    fn label_rounds_halves_to_even() {
        assert_eq!(format_label(0.5, 2.5), "0-2");
        assert_eq!(format_label(1.5, 3.5), "2-4");
        assert_eq!(format_label(4661.5, 4662.5), "4662-4662");
        assert_eq!(format_label(-0.2, 0.4), "0-0");
        assert_eq!(format_label(-0.5, 0.6), "0-1");
    }

    #[test]
    fn lowest_bin_is_closed_on_both_ends() {
        let b = breaks(&[0.0, 10.0, 20.0]);
        assert_eq!(b.assign(Some(0.0)), Some(0));
        assert_eq!(b.assign(Some(10.0)), Some(0));
        assert_eq!(b.assign(Some(10.000_1)), Some(1));
        assert_eq!(b.assign(Some(20.0)), Some(1));
    }

    #[test]
    fn outside_and_missing_values_get_no_bin() {
        let b = breaks(&[0.0, 10.0, 20.0]);
        assert_eq!(b.assign(None), None);
        assert_eq!(b.assign(Some(-1.0)), None);
        assert_eq!(b.assign(Some(20.5)), None);
        assert_eq!(b.assign(Some(f64::NAN)), None);
    }

    #[test]
    fn bins_cover_range_exactly_once() {
        let b = breaks(&[1.0, 2.0, 4.0, 4.0, 8.0, 9.0]);
        for tenth in 10..=90 {
            let value = f64::from(tenth) / 10.0;
            let holding: Vec<_> = b
                .bins()
                .iter()
                .filter(|bin| {
                    if bin.index == 0 {
                        bin.lower <= value && value <= bin.upper
                    } else {
                        bin.lower < value && value <= bin.upper
                    }
                })
                .map(|bin| bin.index)
                .collect();
            assert_eq!(holding.len(), 1, "value {value} in bins {holding:?}");
            assert_eq!(b.assign(Some(value)), Some(holding[0]));
        }
    }

    #[test]
    fn equal_breaks_collapse_to_one_bin() {
        let b = breaks(&[7.0; 6]);
        assert_eq!(b.class_count(), 5);
        assert_eq!(b.assign(Some(7.0)), Some(0));
        let effective = b.effective_bins();
        assert_eq!(effective.len(), 1);
        assert_eq!(effective[0].label, "7-7");
    }

    #[test]
    fn repeated_inner_breaks_drop_empty_bins() {
        let b = breaks(&[1.0, 2.0, 2.0, 3.0]);
        let indices: Vec<_> = b.effective_bins().iter().map(|bin| bin.index).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(b.assign(Some(2.0)), Some(0));
        assert_eq!(b.assign(Some(2.5)), Some(2));
    }

    #[test]
    fn rejects_invalid_breaks() {
        assert_eq!(
            QuantileBreaks::new(vec![1.0]),
            Err(InvalidBreaksError::TooFew)
        );
        assert_eq!(
            QuantileBreaks::new(vec![1.0, f64::INFINITY]),
            Err(InvalidBreaksError::NotFinite)
        );
        assert_eq!(
            QuantileBreaks::new(vec![2.0, 1.0]),
            Err(InvalidBreaksError::Decreasing)
        );
    }

    #[test]
    fn breaks_deserialize_with_validation() {
        let b: QuantileBreaks = serde_json::from_str("[1.0, 2.0, 3.0]").unwrap();
        assert_eq!(b.class_count(), 2);
        assert!(serde_json::from_str::<QuantileBreaks>("[3.0, 2.0]").is_err());
    }

    #[test]
    fn basis_parses_from_snake_case() {
        assert_eq!("regions".parse::<BreakBasis>().unwrap(), BreakBasis::Regions);
        assert_eq!(BreakBasis::default().to_string(), "fragments");
    }
}
