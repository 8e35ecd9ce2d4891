//! Sample quantiles and class breaks.

use covid_map_analytics_models::QuantileBreaks;

/// Sample quantile of already sorted data.
///
/// Interpolates linearly between the order statistics around
/// `h = (n - 1) * p` (R's default "type 7" estimator). Returns `None` for
/// empty input or `p` outside `[0, 1]`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn quantile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }

    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor();
    let lower = *sorted.get(lo as usize)?;
    let upper = *sorted.get(h.ceil() as usize)?;

    Some((h - lo).mul_add(upper - lower, lower))
}

/// Computes `n_classes + 1` breaks at probabilities `i / n_classes`.
///
/// Missing and non-finite values are ignored. Returns `None` when nothing
/// is left to classify or `n_classes` is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_breaks(values: &[f64], n_classes: usize) -> Option<QuantileBreaks> {
    if n_classes == 0 {
        return None;
    }

    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let mut breaks = Vec::with_capacity(n_classes + 1);
    for i in 0..=n_classes {
        let value = quantile(&sorted, i as f64 / n_classes as f64)?;
        // Interpolation rounding must never undercut the previous break.
        let value = breaks.last().map_or(value, |prev: &f64| value.max(*prev));
        breaks.push(value);
    }

    QuantileBreaks::new(breaks).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn interpolates_between_order_statistics() {
        let data: Vec<f64> = (1..=10).map(f64::from).collect();
        assert!(close(quantile(&data, 0.0).unwrap(), 1.0));
        assert!(close(quantile(&data, 0.2).unwrap(), 2.8));
        assert!(close(quantile(&data, 0.5).unwrap(), 5.5));
        assert!(close(quantile(&data, 1.0).unwrap(), 10.0));
    }

    #[test]
    fn rejects_empty_and_out_of_range() {
        assert_eq!(quantile(&[], 0.5), None);
        assert_eq!(quantile(&[1.0], 1.5), None);
        assert_eq!(quantile(&[1.0], f64::NAN), None);
        assert_eq!(quantile(&[3.0], 0.7), Some(3.0));
    }

    #[test]
    fn fifths_of_ten_values() {
        let values: Vec<f64> = (1..=10).rev().map(f64::from).collect();
        let breaks = compute_breaks(&values, 5).unwrap();
        let expected = [1.0, 2.8, 4.6, 6.4, 8.2, 10.0];
        assert_eq!(breaks.values().len(), expected.len());
        for (got, want) in breaks.values().iter().zip(expected) {
            assert!(close(*got, want), "{got} != {want}");
        }
    }

    #[test]
    fn ignores_non_finite_values() {
        let breaks = compute_breaks(&[f64::NAN, 2.0, f64::INFINITY, 4.0], 2).unwrap();
        assert_eq!(breaks.values(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn nothing_to_classify() {
        assert_eq!(compute_breaks(&[], 5), None);
        assert_eq!(compute_breaks(&[f64::NAN], 5), None);
        assert_eq!(compute_breaks(&[1.0, 2.0], 0), None);
    }

    #[test]
    fn equal_values_collapse() {
        let breaks = compute_breaks(&[42.0; 7], 5).unwrap();
        assert_eq!(breaks.values(), &[42.0; 6]);
        assert_eq!(breaks.effective_bins().len(), 1);
        assert_eq!(breaks.assign(Some(42.0)), Some(0));
    }

    #[test]
    fn single_value_is_one_class() {
        let breaks = compute_breaks(&[1234.5], 5).unwrap();
        assert_eq!(breaks.labels()[0], "1234-1234");
    }

    #[test]
    fn breaks_never_decrease() {
        // Deterministic pseudo-random samples of varying size and spread.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        for size in 1..60 {
            let values: Vec<f64> = (0..size)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    #[allow(clippy::cast_precision_loss)]
                    let v = (state % 1_000_000) as f64 / 7.0;
                    v
                })
                .collect();

            let breaks = compute_breaks(&values, 5).unwrap();
            assert!(breaks.values().windows(2).all(|w| w[0] <= w[1]));

            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(close(breaks.values()[0], min));
            assert!(close(breaks.values()[5], max));
            // Every input value lands in exactly one bin.
            assert!(values.iter().all(|v| breaks.assign(Some(*v)).is_some()));
        }
    }
}
