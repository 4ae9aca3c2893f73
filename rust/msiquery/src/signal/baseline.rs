use serde::{
    Deserialize,
    Serialize,
};

use super::rolling::{
    moving_max_into,
    moving_min_into,
    rolling_median_into,
    RollingMedianCalculator,
};
use super::strategy_names;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BaselineCorrectionStrategy {
    #[default]
    None,
    TopHat,
    Median,
    MovingMinimum,
}

strategy_names!(BaselineCorrectionStrategy, fallback = None, {
    None => "None",
    TopHat => "TopHat",
    Median => "Median",
    MovingMinimum => "MovingMinimum",
});

/// Baseline subtraction resolved from a [`BaselineCorrectionStrategy`].
///
/// The estimated baseline never exceeds the signal for `TopHat` and
/// `MovingMinimum`, so their output stays non-negative for non-negative input.
/// `Median` can go below zero and is not clamped.
#[derive(Debug, Clone)]
pub struct BaselineCorrector {
    strategy: BaselineCorrectionStrategy,
    half_window: usize,
    baseline: Vec<f64>,
    scratch: Vec<f64>,
    median: RollingMedianCalculator,
}

impl BaselineCorrector {
    pub fn new(strategy: BaselineCorrectionStrategy, half_window: usize) -> Self {
        Self {
            strategy,
            half_window,
            baseline: Vec::new(),
            scratch: Vec::new(),
            median: RollingMedianCalculator::default(),
        }
    }

    pub fn strategy(&self) -> BaselineCorrectionStrategy {
        self.strategy
    }

    /// Computes the baseline of `ys` into the internal buffer and returns it.
    pub fn baseline(&mut self, ys: &[f64]) -> &[f64] {
        match self.strategy {
            BaselineCorrectionStrategy::None => {
                self.baseline.clear();
                self.baseline.resize(ys.len(), 0.0);
            }
            BaselineCorrectionStrategy::TopHat => {
                // Opening: erosion followed by dilation
                moving_min_into(ys, self.half_window, &mut self.scratch);
                moving_max_into(&self.scratch, self.half_window, &mut self.baseline);
            }
            BaselineCorrectionStrategy::Median => {
                rolling_median_into(ys, self.half_window, &mut self.median, &mut self.baseline);
            }
            BaselineCorrectionStrategy::MovingMinimum => {
                moving_min_into(ys, self.half_window, &mut self.baseline);
            }
        }
        &self.baseline
    }

    pub fn apply(&mut self, ys: &mut [f64]) {
        if self.strategy == BaselineCorrectionStrategy::None || ys.is_empty() {
            return;
        }
        self.baseline(ys);
        for (y, b) in ys.iter_mut().zip(self.baseline.iter()) {
            *y -= b;
        }
    }
}
