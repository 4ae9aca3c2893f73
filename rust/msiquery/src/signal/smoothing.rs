use serde::{
    Deserialize,
    Serialize,
};
use tracing::warn;

use super::{
    mirror_index,
    strategy_names,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SmoothingStrategy {
    #[default]
    None,
    MovingAverage,
    SavitzkyGolay,
    Gaussian,
}

strategy_names!(SmoothingStrategy, fallback = None, {
    None => "None",
    MovingAverage => "MovingAverage",
    SavitzkyGolay => "SavitzkyGolay",
    Gaussian => "Gaussian",
});

/// Largest half window a kernel is built for. Wider requests are clamped.
pub const MAX_SMOOTHING_HALF_WINDOW: usize = 1 << 16;

/// Convolution weights for a smoothing strategy, `2 * half_window + 1` long.
///
/// All kernels are symmetric and sum to 1. `None` (or a half window of 0)
/// yields the identity kernel `[1.0]`. Half windows above
/// [`MAX_SMOOTHING_HALF_WINDOW`] are clamped with a warning.
pub fn smoothing_kernel(strategy: SmoothingStrategy, half_window: usize) -> Vec<f64> {
    if half_window == 0 {
        return vec![1.0];
    }
    let half_window = if half_window > MAX_SMOOTHING_HALF_WINDOW {
        warn!(
            "Smoothing half window {} clamped to {}",
            half_window, MAX_SMOOTHING_HALF_WINDOW
        );
        MAX_SMOOTHING_HALF_WINDOW
    } else {
        half_window
    };
    let m = half_window as f64;
    let offsets = -(half_window as isize)..=(half_window as isize);
    match strategy {
        SmoothingStrategy::None => vec![1.0],
        SmoothingStrategy::MovingAverage => {
            let width = 2 * half_window + 1;
            vec![1.0 / width as f64; width]
        }
        SmoothingStrategy::SavitzkyGolay => {
            // Closed form of the quadratic/cubic least squares fit.
            let denom = (2.0 * m - 1.0) * (2.0 * m + 1.0) * (2.0 * m + 3.0);
            offsets
                .map(|i| {
                    let i = i as f64;
                    3.0 * (3.0 * m * m + 3.0 * m - 1.0 - 5.0 * i * i) / denom
                })
                .collect()
        }
        SmoothingStrategy::Gaussian => {
            let sigma = m / 2.0;
            let weights: Vec<f64> = offsets
                .map(|i| {
                    let i = i as f64;
                    (-(i * i) / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let total: f64 = weights.iter().sum();
            weights.into_iter().map(|w| w / total).collect()
        }
    }
}

/// Smoothing transform resolved from a [`SmoothingStrategy`].
///
/// Output has the same length as the input. Samples past the edges are taken
/// from the mirror image of the buffer, so symmetric input stays symmetric.
#[derive(Debug, Clone)]
pub enum Smoother {
    Identity,
    Kernel {
        kernel: Vec<f64>,
        scratch: Vec<f64>,
    },
}

impl Smoother {
    pub fn new(strategy: SmoothingStrategy, half_window: usize) -> Self {
        if strategy == SmoothingStrategy::None || half_window == 0 {
            return Smoother::Identity;
        }
        Smoother::Kernel {
            kernel: smoothing_kernel(strategy, half_window),
            scratch: Vec::new(),
        }
    }

    pub fn apply(&mut self, ys: &mut [f64]) {
        let Smoother::Kernel { kernel, scratch } = self else {
            return;
        };
        let n = ys.len();
        if n < 2 {
            return;
        }
        let half = (kernel.len() / 2) as isize;
        scratch.clear();
        scratch.extend_from_slice(ys);
        for (i, y) in ys.iter_mut().enumerate() {
            let start = i as isize - half;
            *y = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * scratch[mirror_index(start + k as isize, n)])
                .sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f64], b: &[f64]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "Expected {:?}, got {:?}", b, a);
        }
    }

    #[test]
    fn test_kernels_are_normalized_and_symmetric() {
        for strategy in SmoothingStrategy::ALL {
            for hw in 0..6 {
                let k = smoothing_kernel(*strategy, hw);
                let total: f64 = k.iter().sum();
                assert!((total - 1.0).abs() < 1e-9, "{strategy} {hw}: {k:?}");
                let rev: Vec<f64> = k.iter().rev().copied().collect();
                assert_close(&k, &rev);
            }
        }
    }

    #[test]
    fn test_savitzky_golay_five_point() {
        let k = smoothing_kernel(SmoothingStrategy::SavitzkyGolay, 2);
        let expect: Vec<f64> = [-3.0, 12.0, 17.0, 12.0, -3.0]
            .iter()
            .map(|x| x / 35.0)
            .collect();
        assert_close(&k, &expect);
    }

    #[test]
    fn test_none_is_identity() {
        let mut ys = vec![1.0, 5.0, 2.0, 8.0, 1.0];
        let orig = ys.clone();
        Smoother::new(SmoothingStrategy::None, 3).apply(&mut ys);
        assert_eq!(ys, orig);
        Smoother::new(SmoothingStrategy::Gaussian, 0).apply(&mut ys);
        assert_eq!(ys, orig);
    }

    #[test]
    fn test_moving_average_with_mirrored_edges() {
        let mut ys = vec![3.0, 0.0, 0.0, 6.0];
        Smoother::new(SmoothingStrategy::MovingAverage, 1).apply(&mut ys);
        // Edge 0 sees [ys[1], ys[0], ys[1]], edge 3 sees [ys[2], ys[3], ys[2]]
        assert_close(&ys, &[1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_symmetric_input_stays_symmetric() {
        let input = vec![0.0, 1.0, 4.0, 9.0, 3.0, 9.0, 4.0, 1.0, 0.0];
        for strategy in SmoothingStrategy::ALL {
            for hw in 1..12 {
                let mut ys = input.clone();
                Smoother::new(*strategy, hw).apply(&mut ys);
                let rev: Vec<f64> = ys.iter().rev().copied().collect();
                assert_close(&ys, &rev);
                assert_eq!(ys.len(), input.len());
            }
        }
    }

    #[test]
    fn test_constant_signal_is_preserved() {
        for strategy in SmoothingStrategy::ALL {
            let mut ys = vec![2.5; 7];
            Smoother::new(*strategy, 2).apply(&mut ys);
            assert_close(&ys, &[2.5; 7]);
        }
    }

    #[test]
    fn test_huge_half_window_is_clamped() {
        let k = smoothing_kernel(SmoothingStrategy::MovingAverage, usize::MAX / 4);
        assert_eq!(k.len(), 2 * MAX_SMOOTHING_HALF_WINDOW + 1);

        let mut ys = vec![2.5; 7];
        Smoother::new(SmoothingStrategy::MovingAverage, usize::MAX).apply(&mut ys);
        assert_close(&ys, &[2.5; 7]);
    }
}
