/// Finds the index range of elements in a sorted slice whose keys fall within the
/// closed interval `[range.start(), range.end()]`.
///
/// The slice must be sorted by `key_fn`. The result can be used directly to slice
/// the input and is empty when nothing matches.
///
/// # Examples
///
/// ```
/// use msiquery::utils::{binary_search_range_by_key, TupleRange};
///
/// let xs = [100.0, 101.0, 102.0, 103.0, 104.0];
/// let range = TupleRange::try_new(100.5, 103.0).unwrap();
/// let idx = binary_search_range_by_key(&xs, range, |x| *x);
/// assert_eq!(idx, 1..4);
///
/// let outside = TupleRange::try_new(200.0, 300.0).unwrap();
/// assert!(binary_search_range_by_key(&xs, outside, |x| *x).is_empty());
/// ```
pub fn binary_search_range_by_key<T, K, F>(
    slice: &[T],
    range: TupleRange<K>,
    key_fn: F,
) -> std::ops::Range<usize>
where
    F: Fn(&T) -> K,
    K: Copy + PartialOrd,
{
    let start_idx = slice.partition_point(|x| key_fn(x) < range.start());
    let end_idx = start_idx + slice[start_idx..].partition_point(|x| key_fn(x) <= range.end());

    start_idx..end_idx
}

/// TupleRange represents a range defined by a tuple of two elements (T, T).
///
/// It represents a range as closed-closed [a, b], meaning both endpoints are inclusive.
/// The first element is always less than or equal to the second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TupleRange<T: Copy + PartialOrd>(T, T);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TupleRangeError<T: Copy + PartialOrd + std::fmt::Debug> {
    ExpectedOrderedRange(T, T),
}

impl<T: Copy + PartialOrd + std::fmt::Debug> std::fmt::Display for TupleRangeError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExpectedOrderedRange(a, b) => write!(
                f,
                "Expected the first element to be less than or equal to the second, got ({:?}, {:?})",
                a, b
            ),
        }
    }
}

impl<T: Copy + PartialOrd + std::fmt::Debug> TupleRange<T> {
    pub fn try_new(left: T, right: T) -> Result<Self, TupleRangeError<T>> {
        if left > right {
            Err(TupleRangeError::ExpectedOrderedRange(left, right))
        } else {
            Ok(Self(left, right))
        }
    }
}

impl<T: Copy + PartialOrd> TupleRange<T> {
    pub fn as_tuple(&self) -> (T, T) {
        (self.0, self.1)
    }

    pub fn contains(&self, x: T) -> bool {
        self.0 <= x && x <= self.1
    }

    pub fn start(&self) -> T {
        self.0
    }

    pub fn end(&self) -> T {
        self.1
    }
}

impl TupleRange<f64> {
    /// Closed range `[center - half_width, center + half_width]`.
    ///
    /// The sign of `half_width` is ignored so the range is always ordered.
    pub fn around(center: f64, half_width: f64) -> Self {
        let w = half_width.abs();
        Self(center - w, center + w)
    }

    pub fn width(&self) -> f64 {
        self.1 - self.0
    }
}

impl<T: Copy + PartialOrd + std::fmt::Debug> TryFrom<(T, T)> for TupleRange<T> {
    type Error = TupleRangeError<T>;

    fn try_from(value: (T, T)) -> Result<Self, Self::Error> {
        Self::try_new(value.0, value.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unordered() {
        assert!(TupleRange::try_new(2.0, 1.0).is_err());
        assert!(TupleRange::try_new(1.0, 1.0).is_ok());
    }

    #[test]
    fn test_around_is_symmetric() {
        let r = TupleRange::around(100.0, -0.5);
        assert_eq!(r.as_tuple(), (99.5, 100.5));
        assert_eq!(r.width(), 1.0);
        assert!(r.contains(100.5));
        assert!(!r.contains(100.6));
    }

    #[test]
    fn test_search_closed_interval() {
        let xs = [1.0, 2.0, 2.0, 3.0];
        let r = TupleRange::try_new(2.0, 2.0).unwrap();
        assert_eq!(binary_search_range_by_key(&xs, r, |x| *x), 1..3);
    }
}
