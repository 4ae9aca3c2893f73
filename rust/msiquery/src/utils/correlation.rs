use crate::errors::{
    DataProcessingError,
    Result,
};

/// Calculates the cosine similarity between two vectors of the same size.
///
/// Returns `NaN` when either vector has zero magnitude.
///
/// # Example
///
/// ```
/// use msiquery::utils::correlation::cosine_similarity;
///
/// let a = vec![1.0, 2.0, 3.0];
/// let b = vec![4.0, 5.0, 6.0];
/// let result = cosine_similarity(&a, &b).unwrap();
/// assert!((result - 0.974631846).abs() < 1e-6);
/// ```
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    if a.len() != b.len() || a.is_empty() {
        return Err(DataProcessingError::ExpectedSlicesSameLength {
            expected: a.len(),
            other: b.len(),
            context: "cosine_similarity",
        }
        .into());
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let magnitude_a: f64 = a.iter().map(|&x| x * x).sum::<f64>().sqrt();
    let magnitude_b: f64 = b.iter().map(|&x| x * x).sum::<f64>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(f64::NAN);
    }

    // Numerical error can push this a hair above 1
    Ok((dot_product / (magnitude_a * magnitude_b)).min(1.0))
}
