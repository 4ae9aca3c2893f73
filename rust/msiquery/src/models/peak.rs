use serde::{
    Deserialize,
    Serialize,
};

/// A position on a spectrum axis with its intensity.
///
/// `index` points into the axis the peak was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub index: usize,
    pub x: f64,
    pub intensity: f64,
}

/// Intervals share the peak layout: an axis index, a center and a value.
pub type Interval = Peak;

/// Parameters of an extracted ion image, linking it to its artifact key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IonImageReference {
    pub center: f64,
    pub tolerance: f64,
    pub name: String,
}

impl IonImageReference {
    pub fn new(center: f64, tolerance: f64, name: impl Into<String>) -> Self {
        Self {
            center,
            tolerance,
            name: name.into(),
        }
    }

    /// Default artifact key, `"{center:.4} ± {tolerance:.4}"`.
    pub fn default_name(center: f64, tolerance: f64) -> String {
        format!("{:.4} ± {:.4}", center, tolerance)
    }
}
