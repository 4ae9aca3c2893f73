pub mod arrays;
pub mod config;
pub mod image;
pub mod peak;
pub mod spectrum;
pub mod spectrum_image;
pub mod tolerance;

pub use arrays::Array2D;
pub use config::{
    PeakPickingConfig,
    ProcessingConfig,
};
pub use image::{
    DisplayPixel,
    Image,
    ImageArtifact,
    ImageGeometry,
    IndexPixel,
    MaskPixel,
    NormPixel,
    PixelIndex,
};
pub use peak::{
    Interval,
    IonImageReference,
    Peak,
};
pub use spectrum::{
    OverviewSpectrumType,
    Spectrum,
    SpectrumFormat,
};
pub use spectrum_image::{
    SpectrumImage,
    SpectrumImageProperties,
    INDEX_KEY,
    MASK_KEY,
    NORMALIZATION_KEY,
};
pub use tolerance::MzTolerance;
