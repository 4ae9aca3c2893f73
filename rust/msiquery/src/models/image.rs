//! Pixel buffers backing ion images and the auxiliary per-pixel images.
//!
//! An [`Image`] is a dense 3D grid (x fastest, then y, then z) with an optional
//! number of components per pixel. [`ImageArtifact`] wraps the scalar types the
//! engine uses so artifacts of different types can share one map; the type is
//! resolved once when the artifact is inserted, never per pixel access.

use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::{
    DataProcessingError,
    Result,
};

/// Mask image pixel type, 0 marks an invalid pixel.
pub type MaskPixel = u16;
/// Index image pixel type, holds the spectrum id of each pixel.
pub type IndexPixel = u32;
/// Normalization image pixel type.
pub type NormPixel = f64;
/// Ion image pixel type.
pub type DisplayPixel = f32;

/// Grid coordinate of a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelIndex {
    pub x: u32,
    pub y: u32,
    #[serde(default)]
    pub z: u32,
}

impl PixelIndex {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

impl From<(u32, u32, u32)> for PixelIndex {
    fn from(v: (u32, u32, u32)) -> Self {
        Self::new(v.0, v.1, v.2)
    }
}

/// Size and placement of the pixel grid.
///
/// Origin and spacing are carried through to every image the engine allocates
/// but are never interpreted by the numeric pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub dims: [usize; 3],
    #[serde(default)]
    pub origin: [f64; 3],
    #[serde(default = "default_spacing")]
    pub spacing: [f64; 3],
}

fn default_spacing() -> [f64; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for ImageGeometry {
    fn default() -> Self {
        Self {
            dims: [1, 1, 1],
            origin: [0.0; 3],
            spacing: default_spacing(),
        }
    }
}

impl ImageGeometry {
    pub fn new(dims: [usize; 3]) -> Self {
        Self {
            dims,
            ..Default::default()
        }
    }

    pub fn num_pixels(&self) -> usize {
        self.dims.iter().product()
    }

    /// Linear pixel offset of `pixel` (x fastest).
    pub fn offset(&self, pixel: PixelIndex) -> Result<usize> {
        let [nx, ny, nz] = self.dims;
        let (x, y, z) = (pixel.x as usize, pixel.y as usize, pixel.z as usize);
        if x >= nx || y >= ny || z >= nz {
            return Err(DataProcessingError::PixelOutOfBounds {
                pixel,
                dims: self.dims,
            }
            .into());
        }
        Ok(x + nx * (y + ny * z))
    }
}

/// Dense image with `components` values per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T: Copy> {
    geometry: ImageGeometry,
    components: usize,
    data: Vec<T>,
}

impl<T: Copy> Image<T> {
    pub fn new(geometry: ImageGeometry, fill: T) -> Self {
        Self::with_components(geometry, 1, fill)
    }

    pub fn with_components(geometry: ImageGeometry, components: usize, fill: T) -> Self {
        let components = components.max(1);
        Self {
            geometry,
            components,
            data: vec![fill; geometry.num_pixels() * components],
        }
    }

    /// Wraps an existing buffer, which must hold `num_pixels * components` values.
    pub fn from_vec(geometry: ImageGeometry, components: usize, data: Vec<T>) -> Result<Self> {
        let components = components.max(1);
        let expected = geometry.num_pixels() * components;
        if data.len() != expected {
            return Err(DataProcessingError::ExpectedVectorLength {
                real: data.len(),
                expected,
                context: "Image::from_vec",
            }
            .into());
        }
        Ok(Self {
            geometry,
            components,
            data,
        })
    }

    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    pub fn dims(&self) -> [usize; 3] {
        self.geometry.dims
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn num_pixels(&self) -> usize {
        self.geometry.num_pixels()
    }

    pub fn offset(&self, pixel: PixelIndex) -> Result<usize> {
        self.geometry.offset(pixel)
    }

    pub fn get(&self, pixel: PixelIndex) -> Result<T> {
        self.get_component(pixel, 0)
    }

    pub fn set(&mut self, pixel: PixelIndex, value: T) -> Result<()> {
        self.set_component(pixel, 0, value)
    }

    pub fn get_component(&self, pixel: PixelIndex, component: usize) -> Result<T> {
        let offset = self.component_offset(pixel, component)?;
        Ok(self.data[offset])
    }

    pub fn set_component(&mut self, pixel: PixelIndex, component: usize, value: T) -> Result<()> {
        let offset = self.component_offset(pixel, component)?;
        self.data[offset] = value;
        Ok(())
    }

    fn component_offset(&self, pixel: PixelIndex, component: usize) -> Result<usize> {
        if component >= self.components {
            return Err(DataProcessingError::ExpectedVectorLength {
                real: component,
                expected: self.components,
                context: "image component",
            }
            .into());
        }
        Ok(self.offset(pixel)? * self.components + component)
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

/// Type-erased image stored in the artifact map.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageArtifact {
    U16(Image<u16>),
    U32(Image<u32>),
    F32(Image<f32>),
    F64(Image<f64>),
}

macro_rules! artifact_variant {
    ($variant:ident, $t:ty, $as_ref:ident, $as_mut:ident) => {
        impl From<Image<$t>> for ImageArtifact {
            fn from(x: Image<$t>) -> Self {
                ImageArtifact::$variant(x)
            }
        }

        impl ImageArtifact {
            pub fn $as_ref(&self) -> Option<&Image<$t>> {
                match self {
                    ImageArtifact::$variant(x) => Some(x),
                    _ => None,
                }
            }

            pub fn $as_mut(&mut self) -> Option<&mut Image<$t>> {
                match self {
                    ImageArtifact::$variant(x) => Some(x),
                    _ => None,
                }
            }
        }
    };
}

artifact_variant!(U16, u16, as_u16, as_u16_mut);
artifact_variant!(U32, u32, as_u32, as_u32_mut);
artifact_variant!(F32, f32, as_f32, as_f32_mut);
artifact_variant!(F64, f64, as_f64, as_f64_mut);

impl ImageArtifact {
    pub fn pixel_type(&self) -> &'static str {
        match self {
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
        }
    }

    pub fn dims(&self) -> [usize; 3] {
        match self {
            Self::U16(x) => x.dims(),
            Self::U32(x) => x.dims(),
            Self::F32(x) => x.dims(),
            Self::F64(x) => x.dims(),
        }
    }

    pub fn components(&self) -> usize {
        match self {
            Self::U16(x) => x.components(),
            Self::U32(x) => x.components(),
            Self::F32(x) => x.components(),
            Self::F64(x) => x.components(),
        }
    }

    /// Reads the first component of a pixel, widened to f64.
    pub fn get_f64(&self, pixel: PixelIndex) -> Result<f64> {
        Ok(match self {
            Self::U16(x) => x.get(pixel)? as f64,
            Self::U32(x) => x.get(pixel)? as f64,
            Self::F32(x) => x.get(pixel)? as f64,
            Self::F64(x) => x.get(pixel)?,
        })
    }

    /// Writes the first component of a pixel, casting to the stored type.
    pub fn set_f64(&mut self, pixel: PixelIndex, value: f64) -> Result<()> {
        match self {
            Self::U16(x) => x.set(pixel, value as u16),
            Self::U32(x) => x.set(pixel, value as u32),
            Self::F32(x) => x.set(pixel, value as f32),
            Self::F64(x) => x.set(pixel, value),
        }
    }
}
