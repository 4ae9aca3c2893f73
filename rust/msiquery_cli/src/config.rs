use msiquery::models::{
    Image,
    ImageGeometry,
    MASK_KEY,
    NORMALIZATION_KEY,
};
use msiquery::{
    PeakPickingConfig,
    ProcessingConfig,
    Spectrum,
    SpectrumFormat,
    SpectrumImage,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;
use std::path::{
    Path,
    PathBuf,
};
use tracing::info;

use crate::cli::DatasetArgs;
use crate::error::CliError;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub processing: ProcessingConfig,
    pub peak_picking: PeakPickingConfig,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OutputConfig {
    pub directory: PathBuf,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        let config: Config = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        Ok(config)
    }

    /// Loads the config file (or the defaults) and applies the command line
    /// overrides on top.
    pub fn with_cli_args(args: &DatasetArgs) -> Result<Self, CliError> {
        let mut config = match &args.config_path {
            Some(path) => Config::from_path(path)?,
            None => Config::default(),
        };
        if let Some(threads) = args.threads {
            config.processing.set_threads(threads)?;
        }
        if let Some(directory) = &args.output_path {
            config.output = Some(OutputConfig {
                directory: directory.clone(),
            });
        }
        Ok(config)
    }

    pub fn output_directory(&self) -> Result<&Path, CliError> {
        self.output
            .as_ref()
            .map(|x| x.directory.as_path())
            .ok_or_else(|| {
                CliError::DataReading(
                    "No output directory given in the config or the command line".to_string(),
                )
            })
    }
}

/// JSON stand-in for an ingested dataset.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatasetInput {
    pub format: SpectrumFormat,
    pub geometry: ImageGeometry,
    /// Shared axis of continuous formats.
    #[serde(default)]
    pub axis: Vec<f64>,
    pub spectra: Vec<Spectrum>,
    /// Flat mask in grid order, used with `use_external_mask`.
    #[serde(default)]
    pub mask: Option<Vec<u16>>,
    /// Flat normalization divisors in grid order, used with
    /// `use_external_normalization`.
    #[serde(default)]
    pub normalization: Option<Vec<f64>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl DatasetInput {
    pub fn from_path(path: &Path) -> Result<Self, CliError> {
        info!("Loading dataset from {}", path.display());
        let input: DatasetInput = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        info!(
            "Loaded {} spectra on a {:?} grid",
            input.spectra.len(),
            input.geometry.dims
        );
        Ok(input)
    }

    pub fn into_spectrum_image(self, config: ProcessingConfig) -> Result<SpectrumImage, CliError> {
        let geometry = self.geometry;
        let mut image = SpectrumImage::new(self.format, geometry, self.axis, self.spectra)?
            .with_config(config);
        image.metadata_mut().extend(self.metadata);
        if let Some(mask) = self.mask {
            image.insert_image_artifact(MASK_KEY, Image::from_vec(geometry, 1, mask)?)?;
        }
        if let Some(norm) = self.normalization {
            image.insert_image_artifact(NORMALIZATION_KEY, Image::from_vec(geometry, 1, norm)?)?;
        }
        Ok(image)
    }
}

/// One requested ion image.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IonImageTarget {
    pub center: f64,
    /// Half width of the window, the configured tolerance when missing.
    #[serde(default)]
    pub tolerance: Option<f64>,
    #[serde(default)]
    pub name: Option<String>,
}

pub fn read_targets(path: &Path) -> Result<Vec<IonImageTarget>, CliError> {
    match serde_json::from_str(&std::fs::read_to_string(path)?) {
        Ok(targets) => Ok(targets),
        Err(e) => Err(CliError::DataReading(format!(
            "Failed to read ion image targets from {}: {:?}",
            path.display(),
            e
        ))),
    }
}
