use crate::errors::Result;

/// Per-spectrum access to raw, unprocessed data.
///
/// Spectra are addressed by their id (ingestion order) and a source index.
/// Datasets backed by a single source only accept source index 0 and return
/// [`crate::errors::DataProcessingError::UnknownSource`] for any other value.
///
/// # Example
///
/// ```
/// use msiquery::models::{ImageGeometry, PixelIndex, Spectrum, SpectrumFormat, SpectrumImage};
/// use msiquery::traits::SpectrumDataAccess;
///
/// let image = SpectrumImage::new(
///     SpectrumFormat::ContinuousProfile,
///     ImageGeometry::new([1, 1, 1]),
///     vec![100.0, 200.0],
///     vec![Spectrum::new(PixelIndex::new(0, 0, 0), vec![3.0, 4.0])],
/// )
/// .unwrap();
///
/// let (mzs, ints) = image.grab_spectrum(0, 0).unwrap();
/// assert_eq!(mzs, vec![100.0, 200.0]);
/// assert_eq!(ints, vec![3.0, 4.0]);
/// assert!(image.grab_spectrum(0, 1).is_err());
/// ```
pub trait SpectrumDataAccess {
    fn num_spectra(&self) -> usize;

    fn grab_intensity(&self, id: usize, source_index: usize) -> Result<Vec<f32>>;

    /// Axis of a spectrum: the shared axis in continuous formats, the
    /// spectrum's own one in processed formats.
    fn grab_mass(&self, id: usize, source_index: usize) -> Result<Vec<f64>>;

    fn grab_spectrum(&self, id: usize, source_index: usize) -> Result<(Vec<f64>, Vec<f32>)> {
        let mzs = self.grab_mass(id, source_index)?;
        let intensities = self.grab_intensity(id, source_index)?;
        Ok((mzs, intensities))
    }
}
