//! Peak detection on overview spectra.

pub mod local_maxima;
pub mod monoisotopic;

pub use local_maxima::{
    detect_peaks,
    local_maxima,
    LocalMaxima,
};
pub use monoisotopic::{
    averagine_envelope,
    group_monoisotopic,
    DEFAULT_CHARGES,
    ISOTOPE_SPACING,
};
