/// Median of a buffer, reordering it in place. `None` for an empty buffer.
///
/// NaN values compare as equal to everything, so they do not panic but will
/// produce an arbitrary result; callers are expected to pass finite data.
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let cmp = |a: &f64, b: &f64| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);
    let mid = n / 2;
    let (lower, upper_mid, _) = values.select_nth_unstable_by(mid, cmp);
    let upper_mid = *upper_mid;
    if n % 2 == 1 {
        Some(upper_mid)
    } else {
        let lower_mid = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((lower_mid + upper_mid) / 2.0)
    }
}

/// Median of a slice, without touching it.
///
/// ```
/// use msiquery::utils::statistics::median;
///
/// assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
/// assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
/// assert_eq!(median(&[]), None);
/// ```
pub fn median(values: &[f64]) -> Option<f64> {
    let mut buf = values.to_vec();
    median_in_place(&mut buf)
}

/// Median absolute deviation from the median.
///
/// Robust estimate of the noise floor of a spectrum, insensitive to the
/// (comparatively few) samples that belong to peaks. Empty input gives 0.
///
/// ```
/// use msiquery::utils::statistics::mad;
///
/// // median = 2, deviations = [1, 0, 0, 1, 98], median deviation = 1
/// assert_eq!(mad(&[1.0, 2.0, 2.0, 3.0, 100.0]), 1.0);
/// ```
pub fn mad(values: &[f64]) -> f64 {
    let Some(center) = median(values) else {
        return 0.0;
    };
    let mut deviations: Vec<f64> = values.iter().map(|x| (x - center).abs()).collect();
    median_in_place(&mut deviations).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[5.0]), Some(5.0));
        assert_eq!(median(&[5.0, 1.0]), Some(3.0));
        assert_eq!(median(&[9.0, 1.0, 5.0, 7.0, 3.0]), Some(5.0));
    }

    #[test]
    fn test_mad_constant_is_zero() {
        assert_eq!(mad(&[4.0; 10]), 0.0);
        assert_eq!(mad(&[]), 0.0);
    }

    #[test]
    fn test_mad_ignores_outlier() {
        let base = mad(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let with_outlier = mad(&[1.0, 2.0, 3.0, 4.0, 5000.0]);
        assert_eq!(base, with_outlier);
    }
}
