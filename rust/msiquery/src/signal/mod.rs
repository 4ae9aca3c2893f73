//! Per-spectrum signal transforms.
//!
//! Every strategy is selected by an enum and resolved once per bulk call into a
//! transform object ([`Smoother`], [`BaselineCorrector`], [`Normalizer`]).
//! Transforms own only scratch space, never state that carries between spectra,
//! so each worker block builds its own instance and reuses it for every
//! spectrum in the block.

pub mod baseline;
pub mod normalization;
pub mod pooling;
pub mod rolling;
pub mod smoothing;

pub use baseline::{
    BaselineCorrectionStrategy,
    BaselineCorrector,
};
pub use normalization::{
    NormalizationStrategy,
    Normalizer,
};
pub use pooling::RangePoolingStrategy;
pub use smoothing::{
    Smoother,
    SmoothingStrategy,
};

use crate::utils::{
    binary_search_range_by_key,
    TupleRange,
};

/// Implements the string representation shared by every strategy enum.
///
/// Names are matched case-insensitively. Unknown names do not fail: they log a
/// warning and resolve to the fallback variant, so a stale config degrades to
/// an identity transform instead of aborting a whole batch.
macro_rules! strategy_names {
    ($t:ident, fallback = $fallback:ident, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $t {
            pub const ALL: &'static [$t] = &[$($t::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $($t::$variant => $name),+
                }
            }

            pub fn from_name_lossy(name: &str) -> Self {
                $(
                    if name.eq_ignore_ascii_case($name) {
                        return $t::$variant;
                    }
                )+
                tracing::warn!(
                    "Unsupported {} '{}', falling back to {}",
                    stringify!($t),
                    name,
                    $t::$fallback.name()
                );
                $t::$fallback
            }
        }

        impl std::fmt::Display for $t {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl From<String> for $t {
            fn from(x: String) -> Self {
                Self::from_name_lossy(&x)
            }
        }

        impl From<$t> for String {
            fn from(x: $t) -> Self {
                x.name().to_string()
            }
        }
    };
}

pub(crate) use strategy_names;

/// Resolves the closed interval `[lo, hi]` onto a sorted axis.
///
/// Returns `(start, count)`: the first index whose coordinate is `>= lo`, and
/// the number of samples inside the interval. `count` is 0 when the interval
/// falls between two samples, outside the axis, or is inverted (`lo > hi`).
///
/// ```
/// use msiquery::signal::subrange;
///
/// let xs = [100.0, 101.0, 102.0, 103.0, 104.0];
/// assert_eq!(subrange(&xs, 100.5, 102.0), (1, 2));
/// assert_eq!(subrange(&xs, 99.0, 99.5), (0, 0));
/// assert_eq!(subrange(&xs, 104.5, 200.0), (5, 0));
/// ```
pub fn subrange(xs: &[f64], lo: f64, hi: f64) -> (usize, usize) {
    match TupleRange::try_new(lo, hi) {
        Ok(range) => {
            let idx = binary_search_range_by_key(xs, range, |x| *x);
            (idx.start, idx.len())
        }
        Err(_) => (xs.partition_point(|x| *x < lo), 0),
    }
}

/// Mirrors an index that may fall outside `[0, n)` back into it.
///
/// Reflection is about the edge samples without repeating them
/// (`-1 -> 1`, `n -> n - 2`), applied repeatedly for windows wider than the
/// buffer.
pub(crate) fn mirror_index(i: isize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let r = i.rem_euclid(period);
    if r >= n as isize {
        (period - r) as usize
    } else {
        r as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_index() {
        assert_eq!(mirror_index(-1, 5), 1);
        assert_eq!(mirror_index(-2, 5), 2);
        assert_eq!(mirror_index(5, 5), 3);
        assert_eq!(mirror_index(6, 5), 2);
        assert_eq!(mirror_index(3, 5), 3);
        assert_eq!(mirror_index(-1, 2), 1);
        assert_eq!(mirror_index(-7, 1), 0);
        // Windows wider than the buffer keep bouncing
        assert_eq!(mirror_index(-9, 5), 1);
    }

    #[test]
    fn test_subrange_closed_interval() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(subrange(&xs, 2.0, 3.0), (1, 2));
        assert_eq!(subrange(&xs, 0.0, 10.0), (0, 4));
        assert_eq!(subrange(&xs, 2.2, 2.8), (2, 0));
        assert_eq!(subrange(&[], 2.2, 2.8), (0, 0));
    }

    #[test]
    fn test_strategy_names_fall_back() {
        assert_eq!(
            SmoothingStrategy::from_name_lossy("gaussian"),
            SmoothingStrategy::Gaussian
        );
        assert_eq!(
            SmoothingStrategy::from_name_lossy("Wavelet"),
            SmoothingStrategy::None
        );
        assert_eq!(
            RangePoolingStrategy::from_name_lossy("Integral"),
            RangePoolingStrategy::Sum
        );
        let s: String = BaselineCorrectionStrategy::TopHat.into();
        assert_eq!(s, "TopHat");
    }
}
