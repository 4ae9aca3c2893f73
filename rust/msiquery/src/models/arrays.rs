use crate::errors::{
    DataProcessingError,
    Result,
};

/// Dense row-major 2D array.
///
/// Values that belong to the same row are adjacent in memory. Used for
/// per-interval intensity matrices, where each row is one m/z interval and each
/// column one spectrum.
#[derive(Debug, Clone, PartialEq)]
pub struct Array2D<T: Copy> {
    values: Vec<T>,
    ncols: usize,
    nrows: usize,
}

impl<T: Copy> Array2D<T> {
    pub fn from_flat_vector(values: Vec<T>, nrows: usize, ncols: usize) -> Result<Array2D<T>> {
        if values.len() != nrows * ncols {
            return Err(DataProcessingError::ExpectedVectorLength {
                real: values.len(),
                expected: nrows * ncols,
                context: "Array2D::from_flat_vector",
            }
            .into());
        }
        Ok(Array2D {
            values,
            ncols,
            nrows,
        })
    }

    pub fn get_row(&self, index: usize) -> Option<&[T]> {
        if index >= self.nrows {
            return None;
        }
        let start = index * self.ncols;
        Some(&self.values[start..start + self.ncols])
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn into_flat_vector(self) -> Vec<T> {
        self.values
    }

    pub fn transpose(self) -> Array2D<T> {
        let mut result = Vec::with_capacity(self.values.len());
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                result.push(self.values[i * self.ncols + j]);
            }
        }
        Array2D {
            values: result,
            ncols: self.nrows,
            nrows: self.ncols,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flat_vector() -> Result<()> {
        let array = Array2D::from_flat_vector(vec![1, 2, 3, 4, 5, 6], 2, 3)?;

        assert_eq!(array.ncols(), 3);
        assert_eq!(array.nrows(), 2);
        // Values in the same row are adjacent
        assert_eq!(array.get_row(1), Some([4, 5, 6].as_ref()));
        assert_eq!(array.get_row(2), None);
        Ok(())
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        assert!(Array2D::from_flat_vector(vec![1.0f32; 5], 2, 3).is_err());
    }

    #[test]
    fn test_transpose() {
        let array = Array2D::from_flat_vector(vec![1, 2, 3, 4, 5, 6], 2, 3).unwrap();
        let t = array.transpose();
        assert_eq!((t.nrows(), t.ncols()), (3, 2));
        assert_eq!(t.as_slice(), &[1, 4, 2, 5, 3, 6]);
        assert_eq!(t.into_flat_vector(), vec![1, 4, 2, 5, 3, 6]);
    }

    #[test]
    fn test_empty_transpose() {
        let array = Array2D::<f32>::from_flat_vector(Vec::new(), 0, 4).unwrap();
        let t = array.transpose();
        assert_eq!((t.nrows(), t.ncols()), (4, 0));
        assert_eq!(t.get_row(3).map(|r| r.len()), Some(0));
    }
}
