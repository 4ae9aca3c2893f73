use indicatif::{
    ProgressIterator,
    ProgressStyle,
};
use msiquery::models::{
    DisplayPixel,
    Image,
};
use msiquery::{
    IonImageReference,
    OverviewSpectrumType,
    Peak,
    SpectrumImage,
};
use serde::Serialize;
use std::io::Write;
use std::time::Instant;
use tracing::{
    debug,
    info,
    instrument,
};

use crate::commands::JsonStreamSerializer;
use crate::config::{
    Config,
    DatasetInput,
    IonImageTarget,
};
use crate::error::CliError;

/// Builds the dataset and runs the bulk initialization passes.
#[instrument(skip_all)]
pub fn prepare_image(input: DatasetInput, config: &Config) -> Result<SpectrumImage, CliError> {
    let start = Instant::now();
    let mut image = input.into_spectrum_image(config.processing.clone())?;
    image.initialize_image_access()?;
    if !config.processing.use_external_normalization {
        image.compute_normalization_image()?;
    }
    info!(
        "Prepared {} spectra (depth {}) in {:?}",
        image.properties().valid_pixels,
        image.spectral_depth(),
        start.elapsed()
    );
    Ok(image)
}

#[derive(Debug, Serialize)]
pub struct OverviewRecord<'a> {
    pub axis: &'a [f64],
    pub skyline: &'a [f64],
    pub sum: &'a [f64],
    pub mean: &'a [f64],
    pub peak_indicators: &'a [f64],
}

impl<'a> OverviewRecord<'a> {
    pub fn from_image(image: &'a SpectrumImage) -> Result<Self, CliError> {
        Ok(Self {
            axis: image.x_axis(),
            skyline: image.overview_spectrum(OverviewSpectrumType::Skyline)?,
            sum: image.overview_spectrum(OverviewSpectrumType::Sum)?,
            mean: image.overview_spectrum(OverviewSpectrumType::Mean)?,
            peak_indicators: image.overview_spectrum(OverviewSpectrumType::PeakIndicators)?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct IonImageRecord<'a> {
    #[serde(flatten)]
    pub reference: IonImageReference,
    pub dims: [usize; 3],
    pub values: &'a [DisplayPixel],
}

pub fn targets_from_peaks(peaks: &[Peak]) -> Vec<IonImageTarget> {
    peaks
        .iter()
        .map(|p| IonImageTarget {
            center: p.x,
            tolerance: None,
            name: None,
        })
        .collect()
}

/// Extracts every target into one reused buffer and serializes it.
pub fn export_ion_images(
    image: &SpectrumImage,
    targets: &[IonImageTarget],
    ser: &mut JsonStreamSerializer<impl Write>,
) -> Result<usize, CliError> {
    let start = Instant::now();
    let mut dest = Image::new(*image.geometry(), 0.0 as DisplayPixel);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )?;

    let mut nwritten = 0;
    for target in targets.iter().progress_with_style(style) {
        let tolerance = target
            .tolerance
            .unwrap_or_else(|| image.apply_tolerance(target.center));
        let name = target
            .name
            .clone()
            .unwrap_or_else(|| IonImageReference::default_name(target.center, tolerance));
        image.grab_ion_image(target.center, tolerance, None, &mut dest)?;
        debug!("Extracted ion image {}", name);
        ser.serialize(&IonImageRecord {
            reference: IonImageReference::new(target.center, tolerance, name),
            dims: dest.dims(),
            values: dest.as_slice(),
        })?;
        nwritten += 1;
    }
    info!("Extracted {} ion images in {:?}", nwritten, start.elapsed());
    Ok(nwritten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::SerializationFormat;
    use msiquery::{
        NormalizationStrategy,
        PixelIndex,
        Spectrum,
        SpectrumFormat,
    };
    use msiquery::models::ImageGeometry;

    fn two_pixel_input() -> DatasetInput {
        DatasetInput {
            format: SpectrumFormat::ContinuousProfile,
            geometry: ImageGeometry::new([2, 1, 1]),
            axis: vec![100.0, 101.0, 102.0],
            spectra: vec![
                Spectrum::new(PixelIndex::new(0, 0, 0), vec![1.0, 10.0, 1.0]),
                Spectrum::new(PixelIndex::new(1, 0, 0), vec![0.0, 0.0, 0.0]),
            ],
            mask: None,
            normalization: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_export_ion_images() {
        let mut config = Config::default();
        config.processing.set_normalization(NormalizationStrategy::None);
        let image = prepare_image(two_pixel_input(), &config).unwrap();
        let targets = vec![IonImageTarget {
            center: 101.0,
            tolerance: Some(0.1),
            name: Some("target".to_string()),
        }];

        let mut buf = Vec::new();
        let mut ser = JsonStreamSerializer::new(&mut buf, SerializationFormat::Json);
        let n = export_ion_images(&image, &targets, &mut ser).unwrap();
        ser.finish().unwrap();
        assert_eq!(n, 1);

        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed[0]["name"], "target");
        assert_eq!(parsed[0]["values"], serde_json::json!([10.0, 0.0]));
    }

    #[test]
    fn test_overview_record_lengths() {
        let mut config = Config::default();
        config.processing.set_normalization(NormalizationStrategy::None);
        let image = prepare_image(two_pixel_input(), &config).unwrap();
        let record = OverviewRecord::from_image(&image).unwrap();
        assert_eq!(record.axis.len(), 3);
        assert_eq!(record.sum, &[1.0, 10.0, 1.0]);
        assert_eq!(record.peak_indicators, &[0.0, 0.0, 0.0]);
    }
}
