use serde::{
    Deserialize,
    Serialize,
};

use super::spectrum::OverviewSpectrumType;
use super::tolerance::MzTolerance;
use crate::errors::{
    ConfigError,
    Result,
};
use crate::peaks::DEFAULT_CHARGES;
use crate::signal::{
    BaselineCorrectionStrategy,
    NormalizationStrategy,
    RangePoolingStrategy,
    SmoothingStrategy,
};

pub const DEFAULT_NUMBER_OF_BINS: usize = 2000;
pub const DEFAULT_SMOOTHING_HALF_WINDOW: usize = 4;
pub const DEFAULT_BASELINE_HALF_WINDOW: usize = 100;

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Knobs of the per-pixel processing pipeline.
///
/// Every field has an independent setter; the validated ones return an error
/// and leave the config untouched on bad input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub normalization: NormalizationStrategy,
    pub smoothing: SmoothingStrategy,
    pub smoothing_half_window: usize,
    pub baseline_correction: BaselineCorrectionStrategy,
    pub baseline_half_window: usize,
    pub range_pooling: RangePoolingStrategy,
    pub tolerance: MzTolerance,
    #[serde(default = "default_threads")]
    threads: usize,
    /// Keep the mask image supplied by ingestion instead of deriving it.
    pub use_external_mask: bool,
    /// Divide by the stored normalization image instead of resetting it to 1.
    pub use_external_normalization: bool,
    number_of_bins: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            normalization: NormalizationStrategy::default(),
            smoothing: SmoothingStrategy::default(),
            smoothing_half_window: DEFAULT_SMOOTHING_HALF_WINDOW,
            baseline_correction: BaselineCorrectionStrategy::default(),
            baseline_half_window: DEFAULT_BASELINE_HALF_WINDOW,
            range_pooling: RangePoolingStrategy::default(),
            tolerance: MzTolerance::default(),
            threads: default_threads(),
            use_external_mask: false,
            use_external_normalization: false,
            number_of_bins: DEFAULT_NUMBER_OF_BINS,
        }
    }
}

impl ProcessingConfig {
    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn number_of_bins(&self) -> usize {
        self.number_of_bins
    }

    pub fn set_normalization(&mut self, strategy: NormalizationStrategy) {
        self.normalization = strategy;
    }

    pub fn set_smoothing(&mut self, strategy: SmoothingStrategy, half_window: usize) {
        self.smoothing = strategy;
        self.smoothing_half_window = half_window;
    }

    pub fn set_baseline_correction(
        &mut self,
        strategy: BaselineCorrectionStrategy,
        half_window: usize,
    ) {
        self.baseline_correction = strategy;
        self.baseline_half_window = half_window;
    }

    pub fn set_range_pooling(&mut self, strategy: RangePoolingStrategy) {
        self.range_pooling = strategy;
    }

    pub fn set_tolerance(&mut self, tolerance: MzTolerance) -> Result<()> {
        let value = tolerance.value();
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::InvalidTolerance(value).into());
        }
        self.tolerance = tolerance;
        Ok(())
    }

    pub fn set_threads(&mut self, threads: usize) -> Result<()> {
        if threads == 0 {
            return Err(ConfigError::InvalidThreadCount(threads).into());
        }
        self.threads = threads;
        Ok(())
    }

    pub fn set_number_of_bins(&mut self, bins: usize) -> Result<()> {
        if bins == 0 {
            return Err(ConfigError::InvalidBinCount(bins).into());
        }
        self.number_of_bins = bins;
        Ok(())
    }

    pub fn set_use_external_mask(&mut self, value: bool) {
        self.use_external_mask = value;
    }

    pub fn set_use_external_normalization(&mut self, value: bool) {
        self.use_external_normalization = value;
    }

    /// Checks the fields that can be set directly through deserialization.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(ConfigError::InvalidThreadCount(self.threads).into());
        }
        if self.number_of_bins == 0 {
            return Err(ConfigError::InvalidBinCount(self.number_of_bins).into());
        }
        let tol = self.tolerance.value();
        if !tol.is_finite() || tol < 0.0 {
            return Err(ConfigError::InvalidTolerance(tol).into());
        }
        Ok(())
    }
}

/// Parameters of peak picking on an overview spectrum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakPickingConfig {
    pub overview: OverviewSpectrumType,
    pub half_window: usize,
    pub snr: f64,
    pub monoisotopic: bool,
    pub charges: Vec<u8>,
    pub min_correlation: f64,
    /// Absolute coordinate tolerance for isotope matching.
    pub isotope_tolerance: f64,
    pub max_isotope_distance: usize,
}

impl Default for PeakPickingConfig {
    fn default() -> Self {
        Self {
            overview: OverviewSpectrumType::Skyline,
            half_window: 5,
            snr: 3.0,
            monoisotopic: false,
            charges: DEFAULT_CHARGES.to_vec(),
            min_correlation: 0.9,
            isotope_tolerance: 0.01,
            max_isotope_distance: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProcessingConfig::default();
        assert_eq!(config.normalization, NormalizationStrategy::TIC);
        assert_eq!(config.range_pooling, RangePoolingStrategy::Sum);
        assert_eq!(config.tolerance, MzTolerance::Ppm(10.0));
        assert_eq!(config.number_of_bins(), 2000);
        assert!(config.threads() >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_setters_leave_config_untouched() {
        let mut config = ProcessingConfig::default();
        let threads = config.threads();
        assert!(config.set_threads(0).is_err());
        assert_eq!(config.threads(), threads);
        assert!(config.set_number_of_bins(0).is_err());
        assert!(config.set_tolerance(MzTolerance::Absolute(-1.0)).is_err());
        assert!(config.set_tolerance(MzTolerance::Ppm(f64::NAN)).is_err());
        assert_eq!(config, ProcessingConfig::default());
        config.set_threads(3).unwrap();
        assert_eq!(config.threads(), 3);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ProcessingConfig = serde_json::from_str(
            r#"{"smoothing": "Gaussian", "baseline_correction": "Wavelet", "threads": 2}"#,
        )
        .unwrap();
        assert_eq!(config.smoothing, SmoothingStrategy::Gaussian);
        assert_eq!(config.baseline_correction, BaselineCorrectionStrategy::None);
        assert_eq!(config.threads(), 2);
        assert_eq!(config.baseline_half_window, DEFAULT_BASELINE_HALF_WINDOW);
    }

    #[test]
    fn test_zero_threads_from_json_fails_validation() {
        let config: ProcessingConfig = serde_json::from_str(r#"{"threads": 0}"#).unwrap();
        assert!(config.validate().is_err());
    }
}
