use serde::{
    Deserialize,
    Serialize,
};

use super::image::PixelIndex;
use crate::errors::{
    DataProcessingError,
    Result,
};

/// Storage layout of the spectra in a dataset.
///
/// Continuous formats share one axis across every pixel; processed formats
/// carry their own axis per spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpectrumFormat {
    ContinuousProfile,
    ProcessedProfile,
    ContinuousCentroid,
    ProcessedCentroid,
}

impl SpectrumFormat {
    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::ContinuousProfile | Self::ContinuousCentroid)
    }

    pub fn is_processed(&self) -> bool {
        !self.is_continuous()
    }

    pub fn is_centroid(&self) -> bool {
        matches!(self, Self::ContinuousCentroid | Self::ProcessedCentroid)
    }
}

/// Kinds of whole-image aggregate spectra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OverviewSpectrumType {
    Skyline,
    Sum,
    Mean,
    PeakIndicators,
}

/// One pixel's spectrum as handed over by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub index: PixelIndex,
    pub intensities: Vec<f32>,
    /// Per-spectrum axis, only present in processed formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mzs: Option<Vec<f64>>,
}

impl Spectrum {
    pub fn new(index: PixelIndex, intensities: Vec<f32>) -> Self {
        Self {
            index,
            intensities,
            mzs: None,
        }
    }

    pub fn with_mzs(index: PixelIndex, mzs: Vec<f64>, intensities: Vec<f32>) -> Result<Self> {
        if mzs.len() != intensities.len() {
            return Err(DataProcessingError::ExpectedSlicesSameLength {
                expected: mzs.len(),
                other: intensities.len(),
                context: "spectrum mzs vs intensities",
            }
            .into());
        }
        Ok(Self {
            index,
            intensities,
            mzs: Some(mzs),
        })
    }

    pub fn len(&self) -> usize {
        self.intensities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensities.is_empty()
    }

    /// Writes the intensities, widened to f64, into `buf`.
    pub fn copy_intensities_into(&self, buf: &mut Vec<f64>) {
        buf.clear();
        buf.extend(self.intensities.iter().map(|&y| y as f64));
    }
}
