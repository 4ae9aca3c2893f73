#![doc = include_str!("../README.md")]

// Re-export main structures
pub use crate::models::{
    Array2D,
    Image,
    ImageArtifact,
    ImageGeometry,
    IonImageReference,
    MzTolerance,
    OverviewSpectrumType,
    Peak,
    PeakPickingConfig,
    PixelIndex,
    ProcessingConfig,
    Spectrum,
    SpectrumFormat,
    SpectrumImage,
};
pub use crate::signal::{
    BaselineCorrectionStrategy,
    NormalizationStrategy,
    RangePoolingStrategy,
    SmoothingStrategy,
};

// Re-export traits
pub use crate::traits::SpectrumDataAccess;

// Declare modules
pub mod errors;
pub mod models;
pub mod peaks;
pub mod process;
pub mod signal;
pub mod traits;
pub mod utils;
pub use crate::utils::TupleRange;

// Re-export errors
pub use crate::errors::{
    ConfigError,
    DataProcessingError,
    MsiQueryError,
};
