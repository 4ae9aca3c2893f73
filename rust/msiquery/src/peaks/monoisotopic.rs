use arrayvec::ArrayVec;
use tracing::warn;

use crate::models::peak::Peak;
use crate::utils::correlation::cosine_similarity;

/// Mass difference between consecutive isotopes (13C - 12C).
pub const ISOTOPE_SPACING: f64 = 1.00335;

/// Longest isotope series (monoisotopic peak included) considered per cluster.
pub const MAX_ISOTOPES: usize = 16;

/// Charges searched when none are given explicitly.
pub const DEFAULT_CHARGES: [u8; 8] = [3, 4, 5, 6, 7, 8, 9, 10];

type IsotopeSeries = ArrayVec<usize, MAX_ISOTOPES>;

/// Relative abundance of the first `n` isotopes of a species of the given mass.
///
/// Poisson approximation of the averagine model, normalized to sum to 1.
pub fn averagine_envelope(mass: f64, n: usize) -> Vec<f64> {
    let lambda = (0.000594 * mass - 0.03091).max(1e-6);
    let mut weights = Vec::with_capacity(n);
    let mut w = (-lambda).exp();
    for k in 0..n {
        if k > 0 {
            w *= lambda / k as f64;
        }
        weights.push(w);
    }
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        weights.iter_mut().for_each(|w| *w /= total);
    }
    weights
}

/// Index of the unclaimed peak closest to `target`, within `tolerance`.
fn find_isotope(
    peaks: &[Peak],
    claimed: &[bool],
    after: usize,
    target: f64,
    tolerance: f64,
) -> Option<usize> {
    let lo = peaks.partition_point(|p| p.x < target - tolerance);
    let hi = peaks.partition_point(|p| p.x <= target + tolerance);
    (lo.max(after + 1)..hi)
        .filter(|&j| !claimed[j])
        .min_by(|&a, &b| {
            let da = (peaks[a].x - target).abs();
            let db = (peaks[b].x - target).abs();
            da.total_cmp(&db)
        })
}

fn isotope_series(
    peaks: &[Peak],
    claimed: &[bool],
    origin: usize,
    charge: u8,
    tolerance: f64,
    max_distance: usize,
) -> IsotopeSeries {
    let mut series = IsotopeSeries::new();
    series.push(origin);
    let step = ISOTOPE_SPACING / charge as f64;
    for k in 1..=max_distance {
        let target = peaks[origin].x + k as f64 * step;
        match find_isotope(peaks, claimed, origin, target, tolerance) {
            Some(j) if !series.contains(&j) => series.push(j),
            _ => break,
        }
    }
    series
}

fn envelope_score(peaks: &[Peak], series: &IsotopeSeries, charge: u8) -> f64 {
    let observed: Vec<f64> = series.iter().map(|&j| peaks[j].intensity).collect();
    let mass = peaks[series[0]].x * charge as f64;
    let expected = averagine_envelope(mass, observed.len());
    cosine_similarity(&observed, &expected).unwrap_or(f64::NAN)
}

/// Collapses isotope clusters into their monoisotopic peak.
///
/// Peaks are scanned by ascending coordinate. For each peak not yet claimed by
/// a cluster, every charge is tried: isotopes are looked for at
/// `x + k * 1.00335 / z` (within `tolerance`, `k = 1..=max_distance`) until the
/// first one is missing. The charge whose intensity pattern best matches the
/// averagine envelope wins, if its cosine similarity exceeds
/// `min_correlation`, and its isotopes are removed from further candidacy.
/// Peaks without such a cluster are kept as singletons.
///
/// The returned list holds one peak per cluster, sorted by coordinate, and is
/// never longer than the input.
pub fn group_monoisotopic(
    peaks: &[Peak],
    charges: &[u8],
    min_correlation: f64,
    tolerance: f64,
    max_distance: usize,
) -> Vec<Peak> {
    if peaks.is_empty() {
        return Vec::new();
    }
    let max_distance = if max_distance >= MAX_ISOTOPES {
        warn!(
            "Isotope distance {} exceeds the max of {}, clamping",
            max_distance,
            MAX_ISOTOPES - 1
        );
        MAX_ISOTOPES - 1
    } else {
        max_distance
    };

    let mut sorted = peaks.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x));
    let mut claimed = vec![false; sorted.len()];
    let mut out = Vec::new();

    for origin in 0..sorted.len() {
        if claimed[origin] {
            continue;
        }
        claimed[origin] = true;
        out.push(sorted[origin]);

        let mut best: Option<(f64, IsotopeSeries)> = None;
        for &z in charges.iter().filter(|&&z| z > 0) {
            let series = isotope_series(&sorted, &claimed, origin, z, tolerance, max_distance);
            if series.len() < 2 {
                continue;
            }
            let score = envelope_score(&sorted, &series, z);
            if !(score > min_correlation) {
                continue;
            }
            let improves = match &best {
                Some((best_score, _)) => score > *best_score,
                None => true,
            };
            if improves {
                best = Some((score, series));
            }
        }
        if let Some((_, series)) = best {
            for &j in series.iter().skip(1) {
                claimed[j] = true;
            }
        }
    }
    out
}
