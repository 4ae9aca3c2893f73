//! The dataset and its processing pipeline.
//!
//! A [`SpectrumImage`] owns the raw spectra of every pixel, the auxiliary
//! images (`mask`, `index`, `NormalizationImage`), named image artifacts and the
//! aggregate spectra. Raw intensities are never mutated: every operation copies
//! a spectrum into a per-block buffer, runs normalization, smoothing and
//! baseline correction on the copy, and then either pools an m/z window into a
//! pixel value or folds the buffer into the aggregates.
//!
//! Operations that only read the dataset take `&self` and may run concurrently.
//! The auxiliary images are only written by `&mut self` operations, which do all
//! of their work into local buffers and publish them once every block has
//! succeeded.

use std::collections::{
    BTreeMap,
    HashMap,
};
use std::time::Instant;

use tracing::{
    debug,
    info,
    instrument,
    warn,
};

use super::arrays::Array2D;
use super::config::{
    PeakPickingConfig,
    ProcessingConfig,
};
use super::image::{
    DisplayPixel,
    Image,
    ImageArtifact,
    ImageGeometry,
    IndexPixel,
    MaskPixel,
    NormPixel,
};
use super::peak::{
    Interval,
    IonImageReference,
    Peak,
};
use super::spectrum::{
    OverviewSpectrumType,
    Spectrum,
    SpectrumFormat,
};
use crate::errors::{
    DataProcessingError,
    Result,
};
use crate::peaks::{
    detect_peaks,
    group_monoisotopic,
};
use crate::process::map_blocks;
use crate::signal::normalization::divide_guarded;
use crate::signal::{
    subrange,
    BaselineCorrectionStrategy,
    BaselineCorrector,
    NormalizationStrategy,
    Normalizer,
    Smoother,
};
use crate::traits::SpectrumDataAccess;
use crate::utils::TupleRange;

pub const MASK_KEY: &str = "mask";
pub const INDEX_KEY: &str = "index";
pub const NORMALIZATION_KEY: &str = "NormalizationImage";

/// Per-block processing state: the resolved transforms and a scratch buffer.
struct PixelPipeline<'a> {
    smoother: Smoother,
    baseline: BaselineCorrector,
    normalization: Option<&'a [NormPixel]>,
    buf: Vec<f64>,
    skipped_divisions: usize,
}

impl<'a> PixelPipeline<'a> {
    fn new(config: &ProcessingConfig, normalization: Option<&'a [NormPixel]>) -> Self {
        Self {
            smoother: Smoother::new(config.smoothing, config.smoothing_half_window),
            baseline: BaselineCorrector::new(
                config.baseline_correction,
                config.baseline_half_window,
            ),
            normalization,
            buf: Vec::new(),
            skipped_divisions: 0,
        }
    }

    /// True when samples can be processed independently of their neighbours.
    fn is_pointwise(&self) -> bool {
        matches!(self.smoother, Smoother::Identity)
            && self.baseline.strategy() == BaselineCorrectionStrategy::None
    }

    fn run(&mut self, intensities: &[f32], pixel_offset: usize) -> &[f64] {
        self.buf.clear();
        self.buf.extend(intensities.iter().map(|&y| y as f64));
        if let Some(norm) = self.normalization {
            if !divide_guarded(&mut self.buf, norm[pixel_offset]) {
                self.skipped_divisions += 1;
            }
        }
        self.smoother.apply(&mut self.buf);
        self.baseline.apply(&mut self.buf);
        &self.buf
    }
}

fn warn_skipped_divisions(skipped: usize, context: &str) {
    if skipped > 0 {
        warn!(
            "Skipped normalization of {} spectra with a zero or non-finite divisor ({})",
            skipped, context
        );
    }
}

/// Equal-width binning of `[lo, hi]`, used as the overview axis of
/// processed datasets.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Binning {
    lo: f64,
    width: f64,
    bins: usize,
}

impl Binning {
    fn new(lo: f64, hi: f64, bins: usize) -> Self {
        let width = if hi > lo {
            (hi - lo) / bins as f64
        } else {
            1.0
        };
        Self { lo, width, bins }
    }

    fn centers(&self) -> Vec<f64> {
        (0..self.bins)
            .map(|i| self.lo + (i as f64 + 0.5) * self.width)
            .collect()
    }

    fn bin_of(&self, x: f64) -> usize {
        let i = ((x - self.lo) / self.width).floor();
        if i <= 0.0 {
            0
        } else {
            (i as usize).min(self.bins - 1)
        }
    }
}

/// Partial aggregates of one block.
struct BlockAggregate {
    sum: Vec<f64>,
    skyline: Vec<f64>,
    skipped_divisions: usize,
}

/// Properties recorded by [`SpectrumImage::initialize_image_access`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpectrumImageProperties {
    pub spectral_depth: usize,
    pub x_range: Option<TupleRange<f64>>,
    pub valid_pixels: usize,
}

#[derive(Debug, Clone)]
pub struct SpectrumImage {
    format: SpectrumFormat,
    geometry: ImageGeometry,
    /// Axis of the aggregate spectra. For continuous formats this is also the
    /// axis of every spectrum; for processed formats it is the binned overview
    /// axis, filled on initialization.
    x_axis: Vec<f64>,
    spectra: Vec<Spectrum>,
    pixel_offsets: Vec<usize>,
    config: ProcessingConfig,
    artifacts: BTreeMap<String, ImageArtifact>,
    overview: BTreeMap<OverviewSpectrumType, Vec<f64>>,
    peaks: Vec<Peak>,
    ion_image_references: Vec<IonImageReference>,
    current_ion_image: Option<IonImageReference>,
    display_image: Option<Image<DisplayPixel>>,
    properties: SpectrumImageProperties,
    metadata: BTreeMap<String, serde_json::Value>,
    access_initialized: bool,
}

impl SpectrumImage {
    /// Builds a dataset from ingested spectra.
    ///
    /// Every spectrum must sit on a distinct pixel inside `geometry`. In
    /// continuous formats every spectrum must match the length of `axis`; in
    /// processed formats every spectrum must carry its own axis and `axis` is
    /// ignored.
    pub fn new(
        format: SpectrumFormat,
        geometry: ImageGeometry,
        axis: Vec<f64>,
        spectra: Vec<Spectrum>,
    ) -> Result<Self> {
        let mut pixel_offsets = Vec::with_capacity(spectra.len());
        let mut seen: HashMap<usize, usize> = HashMap::with_capacity(spectra.len());
        for (id, spectrum) in spectra.iter().enumerate() {
            let offset = geometry.offset(spectrum.index)?;
            if let Some(first) = seen.insert(offset, id) {
                return Err(DataProcessingError::DuplicatePixel {
                    pixel: spectrum.index,
                    first,
                    second: id,
                }
                .into());
            }
            pixel_offsets.push(offset);

            if format.is_continuous() {
                if spectrum.len() != axis.len() {
                    return Err(DataProcessingError::ExpectedVectorLength {
                        real: spectrum.len(),
                        expected: axis.len(),
                        context: "continuous spectrum vs shared axis",
                    }
                    .into());
                }
            } else {
                let Some(mzs) = spectrum.mzs.as_ref() else {
                    return Err(DataProcessingError::ExpectedNonEmptyData {
                        context: "processed spectrum axis",
                    }
                    .into());
                };
                if mzs.len() != spectrum.len() {
                    return Err(DataProcessingError::ExpectedSlicesSameLength {
                        expected: mzs.len(),
                        other: spectrum.len(),
                        context: "processed spectrum mzs vs intensities",
                    }
                    .into());
                }
            }
        }
        let x_axis = if format.is_continuous() {
            axis
        } else {
            if !axis.is_empty() {
                debug!("Ignoring shared axis of a processed dataset");
            }
            Vec::new()
        };

        Ok(Self {
            format,
            geometry,
            x_axis,
            spectra,
            pixel_offsets,
            config: ProcessingConfig::default(),
            artifacts: BTreeMap::new(),
            overview: BTreeMap::new(),
            peaks: Vec::new(),
            ion_image_references: Vec::new(),
            current_ion_image: None,
            display_image: None,
            properties: SpectrumImageProperties::default(),
            metadata: BTreeMap::new(),
            access_initialized: false,
        })
    }

    pub fn with_config(mut self, config: ProcessingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn format(&self) -> SpectrumFormat {
        self.format
    }

    pub fn geometry(&self) -> &ImageGeometry {
        &self.geometry
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ProcessingConfig {
        &mut self.config
    }

    pub fn spectra(&self) -> &[Spectrum] {
        &self.spectra
    }

    /// Axis of the aggregate spectra.
    pub fn x_axis(&self) -> &[f64] {
        &self.x_axis
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut BTreeMap<String, serde_json::Value> {
        &mut self.metadata
    }

    pub fn properties(&self) -> &SpectrumImageProperties {
        &self.properties
    }

    pub fn spectral_depth(&self) -> usize {
        self.properties.spectral_depth
    }

    pub fn x_range(&self) -> Option<TupleRange<f64>> {
        self.properties.x_range
    }

    pub fn is_access_initialized(&self) -> bool {
        self.access_initialized
    }

    /// Half-width of the configured tolerance window at `x`.
    pub fn apply_tolerance(&self, x: f64) -> f64 {
        self.config.tolerance.apply(x)
    }

    /// Axis of one spectrum as stored, shared or per pixel.
    fn spectrum_axis(&self, id: usize) -> &[f64] {
        match self.spectra[id].mzs.as_deref() {
            Some(mzs) if self.format.is_processed() => mzs,
            _ => &self.x_axis,
        }
    }

    fn check_spectrum_id(&self, id: usize) -> std::result::Result<(), DataProcessingError> {
        if id >= self.spectra.len() {
            return Err(DataProcessingError::SpectrumIndexOutOfBounds {
                index: id,
                len: self.spectra.len(),
            });
        }
        Ok(())
    }

    /// Images addressed by pixel offset must match the dataset grid exactly
    /// and hold one component per pixel.
    fn check_layout<T: Copy>(&self, image: &Image<T>, context: &'static str) -> Result<()> {
        if image.dims() != self.geometry.dims || image.components() != 1 {
            return Err(DataProcessingError::ImageShapeMismatch {
                dims: image.dims(),
                components: image.components(),
                expected: self.geometry.dims,
                context,
            }
            .into());
        }
        Ok(())
    }

    // ---- Image artifacts ----

    /// Adds a named image.
    ///
    /// The image must cover the dataset geometry. Existing keys are never
    /// replaced, except for the reserved auxiliary images (`mask`, `index`,
    /// `NormalizationImage`) which must keep their pixel type.
    pub fn insert_image_artifact(
        &mut self,
        key: impl Into<String>,
        artifact: impl Into<ImageArtifact>,
    ) -> Result<()> {
        let key = key.into();
        let artifact = artifact.into();
        if artifact.dims() != self.geometry.dims {
            return Err(DataProcessingError::ExpectedVectorLength {
                real: artifact.dims().iter().product(),
                expected: self.geometry.num_pixels(),
                context: "image artifact pixel count",
            }
            .into());
        }
        let reserved_type = match key.as_str() {
            MASK_KEY => Some("u16"),
            INDEX_KEY => Some("u32"),
            NORMALIZATION_KEY => Some("f64"),
            _ => None,
        };
        match reserved_type {
            Some(expected) if artifact.pixel_type() != expected || artifact.components() != 1 => {
                return Err(DataProcessingError::ArtifactTypeMismatch { key, expected }.into());
            }
            Some(_) => {}
            None if self.artifacts.contains_key(&key) => {
                return Err(DataProcessingError::ArtifactExists(key).into());
            }
            None => {}
        }
        debug!("Inserting image artifact '{}'", key);
        self.artifacts.insert(key, artifact);
        Ok(())
    }

    pub fn image_artifact(&self, key: &str) -> Option<&ImageArtifact> {
        self.artifacts.get(key)
    }

    pub fn artifact_keys(&self) -> impl Iterator<Item = &str> {
        self.artifacts.keys().map(|k| k.as_str())
    }

    pub fn mask_image(&self) -> Option<&Image<MaskPixel>> {
        self.artifacts.get(MASK_KEY).and_then(|a| a.as_u16())
    }

    pub fn index_image(&self) -> Option<&Image<IndexPixel>> {
        self.artifacts.get(INDEX_KEY).and_then(|a| a.as_u32())
    }

    pub fn normalization_image(&self) -> Option<&Image<NormPixel>> {
        self.artifacts.get(NORMALIZATION_KEY).and_then(|a| a.as_f64())
    }

    pub fn display_image(&self) -> Option<&Image<DisplayPixel>> {
        self.display_image.as_ref()
    }

    // ---- Initialization ----

    /// Allocates the display image and the auxiliary images.
    ///
    /// `index` and `mask` start at 0 and `NormalizationImage` at 1. A mask or
    /// normalization image inserted beforehand is kept when the matching
    /// `use_external_*` flag is set.
    pub fn initialize_geometry(&mut self) {
        let geometry = self.geometry;
        self.display_image = Some(Image::new(geometry, 0.0));
        self.artifacts
            .insert(INDEX_KEY.to_string(), Image::new(geometry, 0 as IndexPixel).into());
        if !(self.config.use_external_mask && self.mask_image().is_some()) {
            self.artifacts
                .insert(MASK_KEY.to_string(), Image::new(geometry, 0 as MaskPixel).into());
        }
        if !(self.config.use_external_normalization && self.normalization_image().is_some()) {
            self.artifacts.insert(
                NORMALIZATION_KEY.to_string(),
                Image::new(geometry, 1.0 as NormPixel).into(),
            );
        }
        debug!("Initialized geometry {:?}", geometry.dims);
    }

    fn overview_binning(&self) -> Option<Binning> {
        let (lo, hi) = self
            .spectra
            .iter()
            .filter_map(|s| s.mzs.as_ref())
            .flat_map(|mzs| mzs.first().into_iter().chain(mzs.last()))
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        if lo.is_finite() && hi.is_finite() {
            Some(Binning::new(lo, hi, self.config.number_of_bins()))
        } else {
            None
        }
    }

    /// Computes the aggregate spectra and fills the auxiliary images.
    ///
    /// Pass 1 runs every unmasked spectrum through the pipeline and folds it
    /// into per-block sum and skyline spectra, which are reduced after the
    /// barrier. Pass 2 writes the spectrum id of each pixel into `index` and,
    /// unless an external mask is used, marks the pixel as valid. The mean is
    /// the sum divided by the number of valid pixels.
    ///
    /// Nothing is published unless both passes succeed.
    #[instrument(skip_all)]
    pub fn initialize_image_access(&mut self) -> Result<()> {
        let st = Instant::now();
        if self.index_image().is_none() {
            self.initialize_geometry();
        }
        self.config.validate()?;
        let threads = self.config.threads();
        let use_external_mask = self.config.use_external_mask;
        let use_external_normalization = self.config.use_external_normalization;

        let binning = if self.format.is_processed() {
            self.overview_binning()
        } else {
            None
        };
        let x_axis = match &binning {
            Some(b) => b.centers(),
            None if self.format.is_processed() => Vec::new(),
            None => self.x_axis.clone(),
        };
        let depth = x_axis.len();

        let mask = self
            .mask_image()
            .ok_or(DataProcessingError::NotInitialized("mask image"))?
            .clone();
        let norm = self
            .normalization_image()
            .ok_or(DataProcessingError::NotInitialized("normalization image"))?
            .clone();

        // Pass 1
        let partials = {
            let mask_slice = mask.as_slice();
            let norm_slice = if use_external_normalization {
                Some(norm.as_slice())
            } else {
                None
            };
            map_blocks(self.spectra.len(), threads, |_, start, end| {
                let mut pipeline = PixelPipeline::new(&self.config, norm_slice);
                let mut agg = BlockAggregate {
                    sum: vec![0.0; depth],
                    skyline: vec![0.0; depth],
                    skipped_divisions: 0,
                };
                for id in start..end {
                    let offset = self.pixel_offsets[id];
                    if use_external_mask && mask_slice[offset] == 0 {
                        continue;
                    }
                    let ys = pipeline.run(&self.spectra[id].intensities, offset);
                    match &binning {
                        Some(b) => {
                            for (x, y) in self.spectrum_axis(id).iter().zip(ys.iter()) {
                                let i = b.bin_of(*x);
                                agg.sum[i] += y;
                                agg.skyline[i] = agg.skyline[i].max(*y);
                            }
                        }
                        None => {
                            for ((s, k), y) in
                                agg.sum.iter_mut().zip(agg.skyline.iter_mut()).zip(ys.iter())
                            {
                                *s += y;
                                *k = k.max(*y);
                            }
                        }
                    }
                }
                agg.skipped_divisions = pipeline.skipped_divisions;
                Ok(agg)
            })?
        };

        let mut sum = vec![0.0f64; depth];
        let mut skyline = vec![0.0f64; depth];
        let mut skipped = 0;
        for agg in partials {
            for (s, x) in sum.iter_mut().zip(agg.sum.iter()) {
                *s += x;
            }
            for (k, x) in skyline.iter_mut().zip(agg.skyline.iter()) {
                *k = k.max(*x);
            }
            skipped += agg.skipped_divisions;
        }
        warn_skipped_divisions(skipped, "image access initialization");

        // Pass 2
        let assignments = map_blocks(self.spectra.len(), threads, |_, start, end| {
            let mut out = Vec::with_capacity(end - start);
            for id in start..end {
                let index = IndexPixel::try_from(id).map_err(|_| {
                    DataProcessingError::SpectrumIndexOutOfBounds {
                        index: id,
                        len: IndexPixel::MAX as usize,
                    }
                })?;
                out.push((self.pixel_offsets[id], index));
            }
            Ok(out)
        })?;

        let mut index_image = Image::new(self.geometry, 0 as IndexPixel);
        let mut mask = mask;
        for (offset, id) in assignments.into_iter().flatten() {
            index_image.as_mut_slice()[offset] = id;
            if !use_external_mask {
                mask.as_mut_slice()[offset] = 1;
            }
        }
        let mut norm = norm;
        if !use_external_normalization {
            norm.fill(1.0);
        }

        let valid_pixels = mask.as_slice().iter().filter(|&&m| m > 0).count();
        let mean: Vec<f64> = if valid_pixels == 0 {
            vec![0.0; depth]
        } else {
            sum.iter().map(|s| s / valid_pixels as f64).collect()
        };

        // Publish
        self.artifacts.insert(INDEX_KEY.to_string(), index_image.into());
        self.artifacts.insert(MASK_KEY.to_string(), mask.into());
        self.artifacts.insert(NORMALIZATION_KEY.to_string(), norm.into());
        self.properties = SpectrumImageProperties {
            spectral_depth: depth,
            x_range: match (x_axis.first(), x_axis.last()) {
                (Some(&lo), Some(&hi)) => TupleRange::try_new(lo, hi).ok(),
                _ => None,
            },
            valid_pixels,
        };
        self.x_axis = x_axis;
        self.overview.insert(OverviewSpectrumType::Sum, sum);
        self.overview.insert(OverviewSpectrumType::Skyline, skyline);
        self.overview.insert(OverviewSpectrumType::Mean, mean);
        self.overview
            .insert(OverviewSpectrumType::PeakIndicators, vec![0.0; depth]);
        self.access_initialized = true;

        info!(
            "Initialized image access for {} spectra ({} valid pixels, depth {}) in {:#?}",
            self.spectra.len(),
            valid_pixels,
            depth,
            st.elapsed()
        );
        Ok(())
    }

    /// Fills the normalization image with the configured strategy's
    /// per-spectrum divisor, computed on the raw intensities.
    ///
    /// `None` resets the image to 1 and `InFile` leaves it untouched.
    #[instrument(skip_all)]
    pub fn compute_normalization_image(&mut self) -> Result<()> {
        let strategy = self.config.normalization;
        let mut norm = self
            .normalization_image()
            .ok_or(DataProcessingError::NotInitialized("normalization image"))?
            .clone();
        match strategy {
            NormalizationStrategy::InFile => {
                debug!("Keeping the stored normalization image");
                return Ok(());
            }
            NormalizationStrategy::None => norm.fill(1.0),
            NormalizationStrategy::TIC | NormalizationStrategy::Median => {
                let normalizer = Normalizer::new(strategy);
                let factors = map_blocks(self.spectra.len(), self.config.threads(), |_, start, end| {
                    let mut buf = Vec::new();
                    Ok((start..end)
                        .map(|id| {
                            self.spectra[id].copy_intensities_into(&mut buf);
                            normalizer.factor(&buf).unwrap_or(1.0)
                        })
                        .collect::<Vec<f64>>())
                })?;
                let mut zeros = 0;
                for (id, factor) in factors.into_iter().flatten().enumerate() {
                    if factor == 0.0 {
                        zeros += 1;
                    }
                    norm.as_mut_slice()[self.pixel_offsets[id]] = factor;
                }
                if zeros > 0 {
                    warn!("{} spectra have a zero {} normalization factor", zeros, strategy);
                }
            }
        }
        self.artifacts.insert(NORMALIZATION_KEY.to_string(), norm.into());
        Ok(())
    }

    // ---- Ion images ----

    /// Pools `[center - tolerance, center + tolerance]` of every processed
    /// spectrum into `dest`.
    ///
    /// `dest` is zero-filled and every pixel is written once. Pixels whose mask
    /// value is 0 (from `mask`, or else the dataset mask once initialized) get 0
    /// without any processing. Normalization divides by the normalization image
    /// unless the strategy is `None`.
    #[instrument(skip(self, mask, dest))]
    pub fn grab_ion_image(
        &self,
        center: f64,
        tolerance: f64,
        mask: Option<&Image<MaskPixel>>,
        dest: &mut Image<DisplayPixel>,
    ) -> Result<()> {
        self.check_layout(dest, "ion image destination")?;
        let mask = match mask {
            Some(m) => {
                self.check_layout(m, "ion image mask")?;
                Some(m)
            }
            None if self.access_initialized => self.mask_image(),
            None => None,
        };
        let norm = if self.config.normalization == NormalizationStrategy::None {
            None
        } else {
            Some(
                self.normalization_image()
                    .ok_or(DataProcessingError::NotInitialized("normalization image"))?,
            )
        };
        let mask_slice = mask.map(|m| m.as_slice());
        let norm_slice = norm.map(|n| n.as_slice());
        let (lo, hi) = (center - tolerance.abs(), center + tolerance.abs());
        let shared_range = if self.format.is_continuous() {
            Some(subrange(&self.x_axis, lo, hi))
        } else {
            None
        };
        let pooling = self.config.range_pooling;

        let blocks = map_blocks(self.spectra.len(), self.config.threads(), |_, start, end| {
            let mut pipeline = PixelPipeline::new(&self.config, norm_slice);
            let mut values = Vec::with_capacity(end - start);
            for id in start..end {
                let offset = self.pixel_offsets[id];
                if mask_slice.is_some_and(|m| m[offset] == 0) {
                    values.push(0.0);
                    continue;
                }
                let (first, count) = match shared_range {
                    Some(r) => r,
                    None => subrange(self.spectrum_axis(id), lo, hi),
                };
                let intensities = &self.spectra[id].intensities;
                let value = if pipeline.is_pointwise() {
                    let ys = pipeline.run(&intensities[first..first + count], offset);
                    pooling.pool(ys)
                } else {
                    let ys = pipeline.run(intensities, offset);
                    pooling.pool(&ys[first..first + count])
                };
                values.push(value as DisplayPixel);
            }
            Ok((values, pipeline.skipped_divisions))
        })?;

        dest.fill(0.0);
        let out = dest.as_mut_slice();
        let mut id = 0;
        let mut skipped = 0;
        for (values, skipped_block) in blocks {
            skipped += skipped_block;
            for v in values {
                out[self.pixel_offsets[id]] = v;
                id += 1;
            }
        }
        warn_skipped_divisions(skipped, "ion image");
        Ok(())
    }

    /// Extracts an ion image into the display image and makes it current.
    ///
    /// The tolerance defaults to the configured one at `center`.
    pub fn show_ion_image(
        &mut self,
        center: f64,
        tolerance: Option<f64>,
    ) -> Result<&Image<DisplayPixel>> {
        let tolerance = tolerance.unwrap_or_else(|| self.apply_tolerance(center));
        let mut dest = self
            .display_image
            .take()
            .unwrap_or_else(|| Image::new(self.geometry, 0.0));
        if let Err(e) = self.grab_ion_image(center, tolerance, None, &mut dest) {
            self.display_image = Some(dest);
            return Err(e);
        }
        self.current_ion_image = Some(IonImageReference::new(
            center,
            tolerance,
            IonImageReference::default_name(center, tolerance),
        ));
        Ok(self.display_image.insert(dest))
    }

    /// Extracts an ion image and stores it as a named artifact.
    ///
    /// The tolerance defaults to the configured one at `center`, the name to
    /// [`IonImageReference::default_name`]. Fails without side effects if the
    /// name is already taken.
    pub fn store_ion_image(
        &mut self,
        center: f64,
        tolerance: Option<f64>,
        name: Option<String>,
    ) -> Result<IonImageReference> {
        let tolerance = tolerance.unwrap_or_else(|| self.apply_tolerance(center));
        let name = name.unwrap_or_else(|| IonImageReference::default_name(center, tolerance));
        if self.artifacts.contains_key(&name) {
            return Err(DataProcessingError::ArtifactExists(name).into());
        }
        let mut dest = Image::new(self.geometry, 0.0 as DisplayPixel);
        self.grab_ion_image(center, tolerance, None, &mut dest)?;
        self.insert_image_artifact(name.clone(), dest)?;
        let reference = IonImageReference::new(center, tolerance, name);
        self.ion_image_references.push(reference.clone());
        self.current_ion_image = Some(reference.clone());
        Ok(reference)
    }

    pub fn ion_image_references(&self) -> &[IonImageReference] {
        &self.ion_image_references
    }

    pub fn current_ion_image(&self) -> Option<&IonImageReference> {
        self.current_ion_image.as_ref()
    }

    // ---- Aggregate spectra ----

    pub fn overview_spectrum(&self, kind: OverviewSpectrumType) -> Result<&[f64]> {
        self.overview
            .get(&kind)
            .map(|v| v.as_slice())
            .ok_or_else(|| DataProcessingError::NotInitialized("image access").into())
    }

    pub fn skyline_spectrum(&self) -> Result<&[f64]> {
        self.overview_spectrum(OverviewSpectrumType::Skyline)
    }

    pub fn sum_spectrum(&self) -> Result<&[f64]> {
        self.overview_spectrum(OverviewSpectrumType::Sum)
    }

    pub fn mean_spectrum(&self) -> Result<&[f64]> {
        self.overview_spectrum(OverviewSpectrumType::Mean)
    }

    pub fn peak_indicators(&self) -> Result<&[f64]> {
        self.overview_spectrum(OverviewSpectrumType::PeakIndicators)
    }

    // ---- Peaks ----

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    /// Picks peaks on an overview spectrum and stores them as the dataset's
    /// peak list, marking their positions in the `PeakIndicators` spectrum.
    ///
    /// In centroid formats every axis position is a peak.
    #[instrument(skip_all)]
    pub fn pick_peaks(&mut self, config: &PeakPickingConfig) -> Result<&[Peak]> {
        if !self.access_initialized {
            return Err(DataProcessingError::NotInitialized("image access").into());
        }
        let overview = match config.overview {
            OverviewSpectrumType::PeakIndicators => {
                warn!("Cannot pick peaks on the peak indicators, using the skyline spectrum");
                OverviewSpectrumType::Skyline
            }
            x => x,
        };
        let ys = self.overview_spectrum(overview)?;
        let peaks = if self.format.is_centroid() {
            self.x_axis
                .iter()
                .zip(ys.iter())
                .enumerate()
                .map(|(index, (&x, &intensity))| Peak {
                    index,
                    x,
                    intensity,
                })
                .collect()
        } else {
            let found = detect_peaks(ys, &self.x_axis, config.half_window, config.snr)?;
            if config.monoisotopic {
                group_monoisotopic(
                    &found,
                    &config.charges,
                    config.min_correlation,
                    config.isotope_tolerance,
                    config.max_isotope_distance,
                )
            } else {
                found
            }
        };

        let mut indicators = vec![0.0; self.x_axis.len()];
        for p in peaks.iter() {
            if let Some(x) = indicators.get_mut(p.index) {
                *x = 1.0;
            }
        }
        info!("Picked {} peaks on the {:?} spectrum", peaks.len(), overview);
        self.overview
            .insert(OverviewSpectrumType::PeakIndicators, indicators);
        self.peaks = peaks;
        Ok(&self.peaks)
    }

    // ---- Intensity matrix ----

    pub fn get_intensity_data_shape(&self, intervals: &[Interval]) -> [usize; 2] {
        [intervals.len(), self.spectra.len()]
    }

    /// Pooled, processed intensities of every spectrum for every interval.
    ///
    /// Row-major `[#intervals x #spectra]`: row `i` holds the values of
    /// interval `i` for the spectra in id order. Each interval is centered on
    /// its `x` with the configured tolerance. Masked pixels contribute 0.
    #[instrument(skip_all, fields(intervals = intervals.len()))]
    pub fn get_intensity_data(&self, intervals: &[Interval]) -> Result<Vec<f32>> {
        let n = self.spectra.len();
        if intervals.is_empty() || n == 0 {
            return Ok(Vec::new());
        }
        let windows: Vec<(f64, f64)> = intervals
            .iter()
            .map(|iv| {
                let tol = self.apply_tolerance(iv.x);
                (iv.x - tol, iv.x + tol)
            })
            .collect();
        let shared: Option<Vec<(usize, usize)>> = if self.format.is_continuous() {
            Some(
                windows
                    .iter()
                    .map(|&(lo, hi)| subrange(&self.x_axis, lo, hi))
                    .collect(),
            )
        } else {
            None
        };
        let norm = if self.config.normalization == NormalizationStrategy::None {
            None
        } else {
            Some(
                self.normalization_image()
                    .ok_or(DataProcessingError::NotInitialized("normalization image"))?
                    .as_slice(),
            )
        };
        let mask = if self.access_initialized {
            self.mask_image().map(|m| m.as_slice())
        } else {
            None
        };
        let pooling = self.config.range_pooling;

        // Block results are spectrum-major, transposed below.
        let blocks = map_blocks(n, self.config.threads(), |_, start, end| {
            let mut pipeline = PixelPipeline::new(&self.config, norm);
            let mut values = Vec::with_capacity((end - start) * windows.len());
            for id in start..end {
                let offset = self.pixel_offsets[id];
                if mask.is_some_and(|m| m[offset] == 0) {
                    values.extend(std::iter::repeat(0.0).take(windows.len()));
                    continue;
                }
                let ys = pipeline.run(&self.spectra[id].intensities, offset);
                for (w, &(lo, hi)) in windows.iter().enumerate() {
                    let (first, count) = match &shared {
                        Some(r) => r[w],
                        None => subrange(self.spectrum_axis(id), lo, hi),
                    };
                    values.push(pooling.pool(&ys[first..first + count]) as f32);
                }
            }
            Ok(values)
        })?;

        let by_spectrum: Vec<f32> = blocks.into_iter().flatten().collect();
        let matrix = Array2D::from_flat_vector(by_spectrum, n, intervals.len())?;
        Ok(matrix.transpose().into_flat_vector())
    }

    /// [`Self::get_intensity_data`] as a `[#intervals x #spectra]` array.
    pub fn intensity_matrix(&self, intervals: &[Interval]) -> Result<Array2D<f32>> {
        let [rows, cols] = self.get_intensity_data_shape(intervals);
        let data = self.get_intensity_data(intervals)?;
        Array2D::from_flat_vector(data, rows, cols)
    }
}

impl SpectrumDataAccess for SpectrumImage {
    fn num_spectra(&self) -> usize {
        self.spectra.len()
    }

    fn grab_intensity(&self, id: usize, source_index: usize) -> Result<Vec<f32>> {
        if source_index != 0 {
            return Err(DataProcessingError::UnknownSource(source_index).into());
        }
        self.check_spectrum_id(id)?;
        Ok(self.spectra[id].intensities.clone())
    }

    fn grab_mass(&self, id: usize, source_index: usize) -> Result<Vec<f64>> {
        if source_index != 0 {
            return Err(DataProcessingError::UnknownSource(source_index).into());
        }
        self.check_spectrum_id(id)?;
        if self.format.is_continuous() {
            Ok(self.x_axis.clone())
        } else {
            Ok(self.spectrum_axis(id).to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MsiQueryError;
    use crate::models::image::PixelIndex;
    use crate::signal::RangePoolingStrategy;

    fn two_pixel_image(mask: [MaskPixel; 2]) -> SpectrumImage {
        let geometry = ImageGeometry::new([2, 1, 1]);
        let spectra = vec![
            Spectrum::new(PixelIndex::new(0, 0, 0), vec![10.0, 1.0, 2.0]),
            Spectrum::new(PixelIndex::new(1, 0, 0), vec![5.0, 5.0, 5.0]),
        ];
        let mut img = SpectrumImage::new(
            SpectrumFormat::ContinuousProfile,
            geometry,
            vec![100.0, 101.0, 102.0],
            spectra,
        )
        .unwrap();
        img.config_mut().set_normalization(NormalizationStrategy::None);
        img.config_mut().set_use_external_mask(true);
        img.initialize_geometry();
        let mut m = Image::new(geometry, 0 as MaskPixel);
        m.as_mut_slice().copy_from_slice(&mask);
        img.insert_image_artifact(MASK_KEY, m).unwrap();
        img
    }

    #[test]
    fn test_masked_pixel_gets_zero() {
        let img = two_pixel_image([1, 0]);
        let mut dest = Image::new(*img.geometry(), 0.0);
        let mask = img.mask_image().unwrap().clone();
        img.grab_ion_image(100.0, 0.1, Some(&mask), &mut dest).unwrap();
        assert_eq!(dest.as_slice(), &[10.0, 0.0]);
    }

    #[test]
    fn test_no_mask_processes_every_spectrum() {
        let img = two_pixel_image([1, 0]);
        let mut dest = Image::new(*img.geometry(), 0.0);
        // Access not initialized, so the dataset mask is not applied
        img.grab_ion_image(101.0, 1.0, None, &mut dest).unwrap();
        assert_eq!(dest.as_slice(), &[13.0, 15.0]);
    }

    #[test]
    fn test_duplicate_and_out_of_bounds_pixels() {
        let geometry = ImageGeometry::new([2, 1, 1]);
        let dup = vec![
            Spectrum::new(PixelIndex::new(0, 0, 0), vec![1.0]),
            Spectrum::new(PixelIndex::new(0, 0, 0), vec![1.0]),
        ];
        let res = SpectrumImage::new(SpectrumFormat::ContinuousProfile, geometry, vec![1.0], dup);
        assert!(matches!(
            res,
            Err(MsiQueryError::DataProcessingError(
                DataProcessingError::DuplicatePixel { first: 0, second: 1, .. }
            ))
        ));
        let oob = vec![Spectrum::new(PixelIndex::new(2, 0, 0), vec![1.0])];
        let res = SpectrumImage::new(SpectrumFormat::ContinuousProfile, geometry, vec![1.0], oob);
        assert!(res.is_err());
    }

    #[test]
    fn test_axis_length_mismatch() {
        let geometry = ImageGeometry::new([1, 1, 1]);
        let spectra = vec![Spectrum::new(PixelIndex::new(0, 0, 0), vec![1.0, 2.0])];
        let res = SpectrumImage::new(SpectrumFormat::ContinuousProfile, geometry, vec![1.0], spectra);
        assert!(matches!(
            res,
            Err(MsiQueryError::DataProcessingError(
                DataProcessingError::ExpectedVectorLength { real: 2, expected: 1, .. }
            ))
        ));
    }

    #[test]
    fn test_reserved_keys_can_be_replaced() {
        let mut img = two_pixel_image([1, 1]);
        let geometry = *img.geometry();
        img.insert_image_artifact("ion", Image::new(geometry, 0.0f32)).unwrap();
        assert!(img.insert_image_artifact("ion", Image::new(geometry, 1.0f32)).is_err());
        assert!(img.insert_image_artifact(MASK_KEY, Image::new(geometry, 1u16)).is_ok());
        assert!(matches!(
            img.insert_image_artifact(MASK_KEY, Image::new(geometry, 1.0f32)),
            Err(MsiQueryError::DataProcessingError(
                DataProcessingError::ArtifactTypeMismatch { .. }
            ))
        ));
        let wrong = Image::new(ImageGeometry::new([3, 1, 1]), 0.0f32);
        assert!(img.insert_image_artifact("other", wrong).is_err());
        let transposed = Image::new(ImageGeometry::new([1, 2, 1]), 1u16);
        assert!(img.insert_image_artifact(MASK_KEY, transposed).is_err());
        let two_components = Image::with_components(geometry, 2, 1u16);
        assert!(img.insert_image_artifact(MASK_KEY, two_components).is_err());
        assert_eq!(img.mask_image().unwrap().as_slice(), &[1, 1]);
    }

    #[test]
    fn test_initialize_image_access_with_external_mask() {
        let mut img = two_pixel_image([1, 0]);
        img.initialize_image_access().unwrap();
        assert_eq!(img.sum_spectrum().unwrap(), &[10.0, 1.0, 2.0]);
        assert_eq!(img.skyline_spectrum().unwrap(), &[10.0, 1.0, 2.0]);
        assert_eq!(img.mean_spectrum().unwrap(), &[10.0, 1.0, 2.0]);
        assert_eq!(img.index_image().unwrap().as_slice(), &[0, 1]);
        // External mask is left as is
        assert_eq!(img.mask_image().unwrap().as_slice(), &[1, 0]);
        assert_eq!(img.spectral_depth(), 3);
        assert_eq!(img.x_range().unwrap().as_tuple(), (100.0, 102.0));
    }

    #[test]
    fn test_pooling_strategies_on_ion_image() {
        let mut img = two_pixel_image([1, 1]);
        img.config_mut().set_range_pooling(RangePoolingStrategy::Maximum);
        let mut dest = Image::new(*img.geometry(), 0.0);
        img.grab_ion_image(101.5, 0.5, None, &mut dest).unwrap();
        assert_eq!(dest.as_slice(), &[2.0, 5.0]);
    }

    #[test]
    fn test_wrong_destination_dims() {
        let img = two_pixel_image([1, 1]);
        let mut dest = Image::new(ImageGeometry::new([3, 1, 1]), 0.0);
        assert!(img.grab_ion_image(100.0, 0.1, None, &mut dest).is_err());
    }

    #[test]
    fn test_transposed_destination_is_rejected() {
        // Same pixel count, different grid
        let img = two_pixel_image([1, 1]);
        let mut dest = Image::new(ImageGeometry::new([1, 2, 1]), 0.0);
        let res = img.grab_ion_image(100.0, 0.1, None, &mut dest);
        assert!(matches!(
            res,
            Err(MsiQueryError::DataProcessingError(
                DataProcessingError::ImageShapeMismatch {
                    dims: [1, 2, 1],
                    expected: [2, 1, 1],
                    ..
                }
            ))
        ));
        assert_eq!(dest.as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_multi_component_images_are_rejected() {
        let img = two_pixel_image([1, 1]);
        let geometry = *img.geometry();

        let mut dest = Image::with_components(geometry, 2, 0.0);
        assert!(matches!(
            img.grab_ion_image(100.0, 0.1, None, &mut dest),
            Err(MsiQueryError::DataProcessingError(
                DataProcessingError::ImageShapeMismatch { components: 2, .. }
            ))
        ));

        let mut mask = Image::with_components(geometry, 2, 0 as MaskPixel);
        mask.set_component(PixelIndex::new(1, 0, 0), 0, 1).unwrap();
        let mut dest = Image::new(geometry, 0.0);
        assert!(matches!(
            img.grab_ion_image(100.0, 0.1, Some(&mask), &mut dest),
            Err(MsiQueryError::DataProcessingError(
                DataProcessingError::ImageShapeMismatch { components: 2, .. }
            ))
        ));
    }

    #[test]
    fn test_binning() {
        let b = Binning::new(100.0, 110.0, 5);
        assert_eq!(b.centers(), vec![101.0, 103.0, 105.0, 107.0, 109.0]);
        assert_eq!(b.bin_of(100.0), 0);
        assert_eq!(b.bin_of(103.9), 1);
        assert_eq!(b.bin_of(110.0), 4);
        assert_eq!(b.bin_of(99.0), 0);
    }

    #[test]
    fn test_unknown_source_and_id() {
        let img = two_pixel_image([1, 1]);
        assert!(matches!(
            img.grab_intensity(0, 1),
            Err(MsiQueryError::DataProcessingError(DataProcessingError::UnknownSource(1)))
        ));
        assert!(img.grab_mass(5, 0).is_err());
        assert_eq!(img.grab_mass(1, 0).unwrap(), vec![100.0, 101.0, 102.0]);
    }
}
