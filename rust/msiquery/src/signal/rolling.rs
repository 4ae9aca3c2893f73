//! Centered rolling window statistics.
//!
//! Windows are `[i - half_window, i + half_window]` clipped to the buffer, so
//! they shrink near the edges instead of padding. Every output sample is
//! defined.

use std::collections::VecDeque;

/// Number of samples a window can actually cover in a buffer of `n` samples.
pub fn window_len(half_window: usize, n: usize) -> usize {
    half_window.saturating_mul(2).saturating_add(1).min(n)
}

/// Sorted multiset of the values currently inside a rolling window.
///
/// Insertion and removal are a binary search plus a shift, which is cheap for
/// the window sizes used on spectra (a few hundred samples at most).
#[derive(Debug, Default, Clone)]
pub struct RollingMedianCalculator {
    data: Vec<f64>,
}

impl RollingMedianCalculator {
    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    pub fn add(&mut self, value: f64) {
        let pos = self
            .data
            .partition_point(|x| x.total_cmp(&value).is_lt());
        self.data.insert(pos, value);
    }

    /// Removes one instance of `value`. Returns false if it was not present.
    pub fn remove(&mut self, value: f64) -> bool {
        let pos = self
            .data
            .partition_point(|x| x.total_cmp(&value).is_lt());
        match self.data.get(pos) {
            Some(x) if x.total_cmp(&value).is_eq() => {
                self.data.remove(pos);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Median of the window, averaging the two middle values for even sizes.
    pub fn median(&self) -> Option<f64> {
        let n = self.data.len();
        if n == 0 {
            return None;
        }
        let mid = n / 2;
        if n % 2 == 1 {
            Some(self.data[mid])
        } else {
            Some((self.data[mid - 1] + self.data[mid]) / 2.0)
        }
    }
}

pub fn rolling_median_into(
    values: &[f64],
    half_window: usize,
    calc: &mut RollingMedianCalculator,
    out: &mut Vec<f64>,
) {
    out.clear();
    calc.clear();
    let n = values.len();
    calc.reserve(window_len(half_window, n));
    let mut hi = 0;
    for i in 0..n {
        let last = i.saturating_add(half_window).min(n - 1);
        while hi <= last {
            calc.add(values[hi]);
            hi += 1;
        }
        if i > half_window {
            calc.remove(values[i - half_window - 1]);
        }
        // Never empty, `i` itself is always inside its window
        out.push(calc.median().unwrap_or(values[i]));
    }
}

fn moving_extremum_into(
    values: &[f64],
    half_window: usize,
    out: &mut Vec<f64>,
    replaces: fn(f64, f64) -> bool,
) {
    out.clear();
    let n = values.len();
    let mut candidates: VecDeque<usize> = VecDeque::with_capacity(window_len(half_window, n));
    let mut hi = 0;
    for i in 0..n {
        let last = i.saturating_add(half_window).min(n - 1);
        while hi <= last {
            while let Some(&back) = candidates.back() {
                if replaces(values[hi], values[back]) {
                    candidates.pop_back();
                } else {
                    break;
                }
            }
            candidates.push_back(hi);
            hi += 1;
        }
        while let Some(&front) = candidates.front() {
            if i - front > half_window {
                candidates.pop_front();
            } else {
                break;
            }
        }
        out.push(candidates.front().map_or(values[i], |&j| values[j]));
    }
}

/// Rolling minimum (grayscale erosion) with a flat window.
pub fn moving_min_into(values: &[f64], half_window: usize, out: &mut Vec<f64>) {
    moving_extremum_into(values, half_window, out, |new, old| new <= old);
}

/// Rolling maximum (grayscale dilation) with a flat window.
pub fn moving_max_into(values: &[f64], half_window: usize, out: &mut Vec<f64>) {
    moving_extremum_into(values, half_window, out, |new, old| new >= old);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(values: &[f64], hw: usize, f: impl Fn(&mut Vec<f64>) -> f64) -> Vec<f64> {
        (0..values.len())
            .map(|i| {
                let lo = i.saturating_sub(hw);
                let hi = i.saturating_add(hw).min(values.len() - 1);
                let mut w = values[lo..=hi].to_vec();
                f(&mut w)
            })
            .collect()
    }

    fn naive_median(w: &mut Vec<f64>) -> f64 {
        w.sort_by(|a, b| a.total_cmp(b));
        let n = w.len();
        if n % 2 == 1 {
            w[n / 2]
        } else {
            (w[n / 2 - 1] + w[n / 2]) / 2.0
        }
    }

    #[test]
    fn test_rolling_median_calculator() {
        let mut calc = RollingMedianCalculator::default();
        calc.add(10.0);
        calc.add(30.0);
        calc.add(20.0);
        assert_eq!(calc.median(), Some(20.0));
        assert!(calc.remove(30.0));
        assert!(!calc.remove(30.0));
        assert_eq!(calc.median(), Some(15.0));
        calc.clear();
        assert_eq!(calc.median(), None);
    }

    #[test]
    fn test_rolling_median_shrinks_at_edges() {
        let input = vec![1.0, 2.0, 30.0, 4.0, 5.0, 60.0, 7.0, 8.0, 9.0];
        let mut calc = RollingMedianCalculator::default();
        let mut out = Vec::new();
        rolling_median_into(&input, 1, &mut calc, &mut out);
        let expect_out = vec![1.5, 2.0, 4.0, 5.0, 5.0, 7.0, 8.0, 8.0, 8.5];
        assert_eq!(out, expect_out);
    }

    #[test]
    fn test_rolling_against_naive() {
        let input: Vec<f64> = (0..40)
            .map(|i| ((i * 37) % 11) as f64 - (i % 3) as f64 * 0.5)
            .collect();
        let mut calc = RollingMedianCalculator::default();
        let mut out = Vec::new();
        for hw in [0, 1, 2, 5, 39, 60, usize::MAX / 4, usize::MAX] {
            rolling_median_into(&input, hw, &mut calc, &mut out);
            assert_eq!(out, naive(&input, hw, naive_median), "median hw={hw}");

            moving_min_into(&input, hw, &mut out);
            let expect = naive(&input, hw, |w| w.iter().copied().fold(f64::INFINITY, f64::min));
            assert_eq!(out, expect, "min hw={hw}");

            moving_max_into(&input, hw, &mut out);
            let expect = naive(&input, hw, |w| {
                w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            });
            assert_eq!(out, expect, "max hw={hw}");
        }
    }

    #[test]
    fn test_window_len_is_clipped() {
        assert_eq!(window_len(2, 100), 5);
        assert_eq!(window_len(2, 3), 3);
        assert_eq!(window_len(usize::MAX, 7), 7);
        assert_eq!(window_len(usize::MAX / 2, 0), 0);
    }

    #[test]
    fn test_empty_input() {
        let mut out = vec![1.0];
        moving_min_into(&[], 3, &mut out);
        assert!(out.is_empty());
        rolling_median_into(&[], 3, &mut RollingMedianCalculator::default(), &mut out);
        assert!(out.is_empty());
    }
}
