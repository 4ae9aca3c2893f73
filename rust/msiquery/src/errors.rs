use std::fmt::Display;

use crate::models::image::PixelIndex;

#[derive(Debug)]
pub enum MsiQueryError {
    DataProcessingError(DataProcessingError),
    ConfigError(ConfigError),
    Other(String),
}

impl Display for MsiQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataProcessingError(e) => write!(f, "Data processing error: {}", e),
            Self::ConfigError(e) => write!(f, "Configuration error: {}", e),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MsiQueryError {}

impl MsiQueryError {
    pub fn custom(msg: impl Display) -> Self {
        Self::Other(msg.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidThreadCount(usize),
    InvalidBinCount(usize),
    InvalidTolerance(f64),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidThreadCount(x) => write!(f, "Thread count must be > 0, got {}", x),
            Self::InvalidBinCount(x) => write!(f, "Number of bins must be > 0, got {}", x),
            Self::InvalidTolerance(x) => {
                write!(f, "Tolerance must be finite and >= 0, got {}", x)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataProcessingError {
    ExpectedVectorLength {
        real: usize,
        expected: usize,
        context: &'static str,
    },
    ExpectedNonEmptyData {
        context: &'static str,
    },
    ExpectedSlicesSameLength {
        expected: usize,
        other: usize,
        context: &'static str,
    },
    SpectrumIndexOutOfBounds {
        index: usize,
        len: usize,
    },
    PixelOutOfBounds {
        pixel: PixelIndex,
        dims: [usize; 3],
    },
    DuplicatePixel {
        pixel: PixelIndex,
        first: usize,
        second: usize,
    },
    ImageShapeMismatch {
        dims: [usize; 3],
        components: usize,
        expected: [usize; 3],
        context: &'static str,
    },
    UnknownSource(usize),
    MissingArtifact(String),
    ArtifactExists(String),
    ArtifactTypeMismatch {
        key: String,
        expected: &'static str,
    },
    NotInitialized(&'static str),
    /// Errors raised by individual blocks of a parallel map, keyed by block id.
    BlockFailures(Vec<(usize, DataProcessingError)>),
}

impl Display for DataProcessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExpectedVectorLength {
                real,
                expected,
                context,
            } => write!(
                f,
                "Expected a vector of length {} but got {} ({})",
                expected, real, context
            ),
            Self::ExpectedNonEmptyData { context } => {
                write!(f, "Expected non-empty data ({})", context)
            }
            Self::ExpectedSlicesSameLength {
                expected,
                other,
                context,
            } => write!(
                f,
                "Expected slices of the same length, got {} and {} ({})",
                expected, other, context
            ),
            Self::SpectrumIndexOutOfBounds { index, len } => write!(
                f,
                "Spectrum index {} out of bounds for {} spectra",
                index, len
            ),
            Self::PixelOutOfBounds { pixel, dims } => write!(
                f,
                "Pixel {:?} out of bounds for image of size {:?}",
                pixel, dims
            ),
            Self::DuplicatePixel {
                pixel,
                first,
                second,
            } => write!(
                f,
                "Spectra {} and {} share the pixel {:?}",
                first, second, pixel
            ),
            Self::ImageShapeMismatch {
                dims,
                components,
                expected,
                context,
            } => write!(
                f,
                "Expected a single component image of size {:?} but got {:?} with {} components ({})",
                expected, dims, components, context
            ),
            Self::UnknownSource(x) => write!(f, "Unknown source index {}", x),
            Self::MissingArtifact(k) => write!(f, "No image artifact named '{}'", k),
            Self::ArtifactExists(k) => write!(f, "An image artifact named '{}' already exists", k),
            Self::ArtifactTypeMismatch { key, expected } => write!(
                f,
                "Image artifact '{}' does not hold {} pixels",
                key, expected
            ),
            Self::NotInitialized(what) => write!(f, "{} has not been initialized", what),
            Self::BlockFailures(failures) => {
                write!(f, "{} block(s) failed:", failures.len())?;
                for (block, e) in failures {
                    write!(f, " [block {}: {}]", block, e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for DataProcessingError {}

impl From<DataProcessingError> for MsiQueryError {
    fn from(e: DataProcessingError) -> Self {
        MsiQueryError::DataProcessingError(e)
    }
}

impl From<ConfigError> for MsiQueryError {
    fn from(e: ConfigError) -> Self {
        MsiQueryError::ConfigError(e)
    }
}

pub type Result<T> = std::result::Result<T, MsiQueryError>;
