use serde::{
    Deserialize,
    Serialize,
};

use super::strategy_names;
use crate::utils::statistics::median;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NormalizationStrategy {
    None,
    #[default]
    TIC,
    Median,
    InFile,
}

strategy_names!(NormalizationStrategy, fallback = None, {
    None => "None",
    TIC => "TIC",
    Median => "Median",
    InFile => "InFile",
});

/// Computes per-spectrum normalization divisors.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    strategy: NormalizationStrategy,
}

impl Normalizer {
    pub fn new(strategy: NormalizationStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> NormalizationStrategy {
        self.strategy
    }

    /// Divisor for one spectrum.
    ///
    /// Returns `None` when the strategy does not derive the divisor from the
    /// intensities (`None`, and `InFile` whose value lives in the
    /// normalization image).
    pub fn factor(&self, ys: &[f64]) -> Option<f64> {
        match self.strategy {
            NormalizationStrategy::None | NormalizationStrategy::InFile => None,
            NormalizationStrategy::TIC => Some(ys.iter().sum()),
            NormalizationStrategy::Median => Some(median(ys).unwrap_or(0.0)),
        }
    }
}

/// Divides `ys` in place by `divisor`.
///
/// Returns `false`, leaving `ys` untouched, when the divisor is zero or not
/// finite. Callers decide how to report the skipped division.
pub fn divide_guarded(ys: &mut [f64], divisor: f64) -> bool {
    if divisor == 0.0 || !divisor.is_finite() {
        return false;
    }
    ys.iter_mut().for_each(|y| *y /= divisor);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factors() {
        let ys = [1.0, 4.0, 2.0, 8.0];
        assert_eq!(Normalizer::new(NormalizationStrategy::TIC).factor(&ys), Some(15.0));
        assert_eq!(Normalizer::new(NormalizationStrategy::Median).factor(&ys), Some(3.0));
        assert_eq!(Normalizer::new(NormalizationStrategy::None).factor(&ys), None);
        assert_eq!(Normalizer::new(NormalizationStrategy::InFile).factor(&ys), None);
        assert_eq!(Normalizer::new(NormalizationStrategy::Median).factor(&[]), Some(0.0));
    }

    #[test]
    fn test_zero_divisor_is_skipped() {
        let mut ys = vec![1.0, 2.0];
        assert!(!divide_guarded(&mut ys, 0.0));
        assert!(!divide_guarded(&mut ys, f64::NAN));
        assert_eq!(ys, vec![1.0, 2.0]);
        assert!(divide_guarded(&mut ys, 2.0));
        assert_eq!(ys, vec![0.5, 1.0]);
    }

    #[test]
    fn test_serde_roundtrip_names() {
        let s = serde_json::to_string(&NormalizationStrategy::TIC).unwrap();
        assert_eq!(s, r#""TIC""#);
        let parsed: NormalizationStrategy = serde_json::from_str(r#""rms""#).unwrap();
        assert_eq!(parsed, NormalizationStrategy::None);
    }
}
