use crate::errors::{
    DataProcessingError,
    Result,
};
use crate::models::peak::Peak;
use crate::utils::statistics::mad;

/// Lazy iterator over the strict local maxima of a spectrum.
///
/// Only positions with a full window (`half_window <= i < n - half_window`)
/// are candidates. A candidate is yielded when it is strictly greater than every
/// other sample of `ys[i - half_window ..= i + half_window]` and strictly
/// greater than `threshold`. Cloning the iterator restarts nothing, it forks
/// the current position.
#[derive(Debug, Clone)]
pub struct LocalMaxima<'a> {
    ys: &'a [f64],
    xs: &'a [f64],
    half_window: usize,
    threshold: f64,
    pos: usize,
    end: usize,
}

impl<'a> LocalMaxima<'a> {
    pub fn new(ys: &'a [f64], xs: &'a [f64], half_window: usize, threshold: f64) -> Result<Self> {
        if ys.len() != xs.len() {
            return Err(DataProcessingError::ExpectedSlicesSameLength {
                expected: ys.len(),
                other: xs.len(),
                context: "local maxima intensities vs axis",
            }
            .into());
        }
        let end = ys.len().saturating_sub(half_window);
        Ok(Self {
            ys,
            xs,
            half_window,
            threshold,
            pos: half_window,
            end,
        })
    }

    fn is_peak(&self, i: usize) -> bool {
        let y = self.ys[i];
        if !(y > self.threshold) {
            return false;
        }
        let window = &self.ys[i - self.half_window..=i + self.half_window];
        window
            .iter()
            .enumerate()
            .all(|(k, &other)| k == self.half_window || y > other)
    }
}

impl Iterator for LocalMaxima<'_> {
    type Item = Peak;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.end {
            let i = self.pos;
            if self.is_peak(i) {
                // Nothing within the window right of a peak can be a peak.
                self.pos = i + self.half_window + 1;
                return Some(Peak {
                    index: i,
                    x: self.xs[i],
                    intensity: self.ys[i],
                });
            }
            self.pos += 1;
        }
        None
    }
}

/// Local maxima above `threshold`, see [`LocalMaxima`].
pub fn local_maxima<'a>(
    ys: &'a [f64],
    xs: &'a [f64],
    half_window: usize,
    threshold: f64,
) -> Result<LocalMaxima<'a>> {
    LocalMaxima::new(ys, xs, half_window, threshold)
}

/// Peaks whose height exceeds `snr` times the median absolute deviation of
/// the whole spectrum.
///
/// ```
/// use msiquery::peaks::detect_peaks;
///
/// let xs: Vec<f64> = (0..9).map(|i| 100.0 + i as f64).collect();
/// let ys = [1.0, 2.0, 1.0, 1.0, 9.0, 1.0, 2.0, 1.0, 1.0];
/// let peaks = detect_peaks(&ys, &xs, 1, 3.0).unwrap();
/// let found: Vec<usize> = peaks.iter().map(|p| p.index).collect();
/// // mad = 0, so every strict maximum above 0 is kept
/// assert_eq!(found, vec![1, 4, 6]);
/// ```
pub fn detect_peaks(ys: &[f64], xs: &[f64], half_window: usize, snr: f64) -> Result<Vec<Peak>> {
    let threshold = mad(ys) * snr;
    Ok(local_maxima(ys, xs, half_window, threshold)?.collect())
}
