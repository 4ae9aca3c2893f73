use serde::{
    Deserialize,
    Serialize,
};

use super::strategy_names;
use crate::utils::statistics::median;

/// Reduction applied to the samples of an m/z window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RangePoolingStrategy {
    #[default]
    Sum,
    Mean,
    Maximum,
    Median,
}

strategy_names!(RangePoolingStrategy, fallback = Sum, {
    Sum => "Sum",
    Mean => "Mean",
    Maximum => "Maximum",
    Median => "Median",
});

impl RangePoolingStrategy {
    /// Reduces `values` to one scalar. An empty window pools to 0.
    ///
    /// ```
    /// use msiquery::signal::RangePoolingStrategy;
    ///
    /// let ys = [1.0, 5.0, 3.0];
    /// assert_eq!(RangePoolingStrategy::Sum.pool(&ys), 9.0);
    /// assert_eq!(RangePoolingStrategy::Maximum.pool(&ys), 5.0);
    /// assert_eq!(RangePoolingStrategy::Median.pool(&[]), 0.0);
    /// ```
    pub fn pool(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        match self {
            Self::Sum => values.iter().sum(),
            Self::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Self::Maximum => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Median => median(values).unwrap_or(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pooling() {
        let ys = [2.0, 8.0, 4.0, 6.0];
        assert_eq!(RangePoolingStrategy::Sum.pool(&ys), 20.0);
        assert_eq!(RangePoolingStrategy::Mean.pool(&ys), 5.0);
        assert_eq!(RangePoolingStrategy::Maximum.pool(&ys), 8.0);
        assert_eq!(RangePoolingStrategy::Median.pool(&ys), 5.0);
    }

    #[test]
    fn test_empty_window_pools_to_zero() {
        for strategy in RangePoolingStrategy::ALL {
            assert_eq!(strategy.pool(&[]), 0.0);
        }
    }

    #[test]
    fn test_maximum_with_negative_values() {
        assert_eq!(RangePoolingStrategy::Maximum.pool(&[-3.0, -1.0]), -1.0);
    }
}
