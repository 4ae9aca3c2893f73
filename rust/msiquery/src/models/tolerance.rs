use serde::{
    Deserialize,
    Serialize,
};

use crate::utils::TupleRange;

/// Half-width of the window placed around an axis coordinate.
///
/// Example:
/// ```
/// use msiquery::models::tolerance::MzTolerance;
///
/// let tol = MzTolerance::default(); // 10 ppm
/// let range = tol.mz_range(500.0);
///
/// // For 500 Da at 10 ppm: ±0.005 Da
/// assert!((range.start() - 499.995).abs() < 1e-9);
/// assert!((range.end() - 500.005).abs() < 1e-9);
/// ```
///
/// Convention: tolerances are positive values, a tolerance of 1 on a value of 10
/// means a range of (9, 11).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MzTolerance {
    #[serde(rename = "da")]
    Absolute(f64),
    #[serde(rename = "ppm")]
    Ppm(f64),
}

impl Default for MzTolerance {
    fn default() -> Self {
        MzTolerance::Ppm(10.0)
    }
}

impl MzTolerance {
    /// Absolute half-width of the window at `x`.
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            MzTolerance::Absolute(tol) => tol.abs(),
            MzTolerance::Ppm(tol) => (x * tol * 1e-6).abs(),
        }
    }

    /// `[x - tol, x + tol]`, always ordered.
    pub fn mz_range(&self, x: f64) -> TupleRange<f64> {
        TupleRange::around(x, self.apply(x))
    }

    pub fn value(&self) -> f64 {
        match *self {
            MzTolerance::Absolute(tol) => tol,
            MzTolerance::Ppm(tol) => tol,
        }
    }

    pub fn is_ppm(&self) -> bool {
        matches!(self, MzTolerance::Ppm(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute() {
        let tol = MzTolerance::Absolute(0.25);
        assert_eq!(tol.apply(1000.0), 0.25);
        assert_eq!(tol.mz_range(10.0).as_tuple(), (9.75, 10.25));
    }

    #[test]
    fn test_ppm_scales_with_mass() {
        let tol = MzTolerance::Ppm(20.0);
        assert!((tol.apply(500.0) - 0.01).abs() < 1e-12);
        assert!((tol.apply(1000.0) - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_serde_names() {
        let tol: MzTolerance = serde_json::from_str(r#"{"ppm": 5.0}"#).unwrap();
        assert_eq!(tol, MzTolerance::Ppm(5.0));
        let tol: MzTolerance = serde_json::from_str(r#"{"da": 0.1}"#).unwrap();
        assert_eq!(tol, MzTolerance::Absolute(0.1));
    }
}
