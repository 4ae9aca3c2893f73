use serde::Serialize;
use std::fs::File;
use std::io::{
    self,
    BufWriter,
    Write,
};
use std::path::Path;
use std::time::Instant;

use msiquery::Peak;
use tracing::{
    info,
    instrument,
    warn,
};

use crate::cli::{
    IonImagesArgs,
    PickPeaksArgs,
    SerializationFormat,
    WriteTemplateArgs,
};
use crate::config::{
    read_targets,
    Config,
    DatasetInput,
};
use crate::error::CliError;
use crate::processing::{
    export_ion_images,
    prepare_image,
    targets_from_peaks,
    OverviewRecord,
};

/// Main function for the 'pick-peaks' subcommand.
#[instrument]
pub fn main_pick_peaks(args: PickPeaksArgs) -> Result<(), CliError> {
    let mut config = Config::with_cli_args(&args.dataset)?;
    if args.monoisotopic {
        config.peak_picking.monoisotopic = true;
    }
    info!("Using processing settings: {:#?}", config.processing);
    info!("Using peak picking settings: {:#?}", config.peak_picking);
    let output_path = config.output_directory()?.to_path_buf();
    std::fs::create_dir_all(&output_path)?;

    let input = DatasetInput::from_path(&args.dataset.input_path)?;
    let mut image = prepare_image(input, &config)?;
    let peaks = image.pick_peaks(&config.peak_picking)?.to_vec();
    info!("Picked {} peaks", peaks.len());

    let peaks_path = output_path.join("peaks.json");
    write_all(&peaks, args.dataset.format, &peaks_path)?;

    let overview_path = output_path.join("overview.json");
    let overview = OverviewRecord::from_image(&image)?;
    let writer = BufWriter::new(File::create(&overview_path)?);
    serde_json::to_writer(writer, &overview)?;
    println!(
        "Wrote to:\n- {}\n- {}",
        peaks_path.display(),
        overview_path.display()
    );
    Ok(())
}

/// Main function for the 'ion-images' subcommand.
#[instrument]
pub fn main_ion_images(args: IonImagesArgs) -> Result<(), CliError> {
    let config = Config::with_cli_args(&args.dataset)?;
    info!("Using processing settings: {:#?}", config.processing);
    let output_path = config.output_directory()?.to_path_buf();
    std::fs::create_dir_all(&output_path)?;

    let input = DatasetInput::from_path(&args.dataset.input_path)?;
    let mut image = prepare_image(input, &config)?;
    let targets = match &args.targets_path {
        Some(path) => read_targets(path)?,
        None => {
            info!("No targets given, using the picked peaks");
            targets_from_peaks(image.pick_peaks(&config.peak_picking)?)
        }
    };
    if targets.is_empty() {
        warn!("No ion image targets, writing an empty result");
    }

    let start = Instant::now();
    let put_path = output_path.join("ion_images.json");
    let writer = BufWriter::new(File::create(&put_path)?);
    let mut ser = JsonStreamSerializer::new(writer, args.dataset.format);
    let nwritten = export_ion_images(&image, &targets, &mut ser)?;
    ser.finish()?;
    println!("Wrote {} ion images to {}", nwritten, put_path.display());

    if args.matrix {
        let intervals: Vec<Peak> = targets
            .iter()
            .enumerate()
            .map(|(index, t)| Peak {
                index,
                x: t.center,
                intensity: 0.0,
            })
            .collect();
        let matrix = IntensityMatrixRecord {
            shape: image.get_intensity_data_shape(&intervals),
            values: image.get_intensity_data(&intervals)?,
        };
        let matrix_path = output_path.join("intensity_matrix.json");
        let writer = BufWriter::new(File::create(&matrix_path)?);
        serde_json::to_writer(writer, &matrix)?;
        println!("Wrote intensity matrix to {}", matrix_path.display());
    }
    println!("Total processing and serialization took {:#?}", start.elapsed());
    Ok(())
}

#[derive(Debug, Serialize)]
struct IntensityMatrixRecord {
    shape: [usize; 2],
    values: Vec<f32>,
}

fn write_all<T: Serialize>(
    items: &[T],
    format: SerializationFormat,
    path: &Path,
) -> Result<(), CliError> {
    let writer = BufWriter::new(File::create(path)?);
    let mut ser = JsonStreamSerializer::new(writer, format);
    for item in items {
        ser.serialize(item)?;
    }
    ser.finish()?;
    Ok(())
}

const PROCESSING_TEMPLATE: &str = r#"{
  "processing": {
    "normalization": "TIC",
    "smoothing": "SavitzkyGolay",
    "smoothing_half_window": 4,
    "baseline_correction": "TopHat",
    "baseline_half_window": 100,
    "range_pooling": "Sum",
    "tolerance": { "ppm": 10.0 },
    "use_external_mask": false,
    "use_external_normalization": false
  },
  "peak_picking": {
    "overview": "Skyline",
    "half_window": 5,
    "snr": 3.0,
    "monoisotopic": true,
    "charges": [1, 2, 3],
    "min_correlation": 0.9,
    "isotope_tolerance": 0.01,
    "max_isotope_distance": 3
  },
  "output": { "directory": "msiquery_output" }
}"#;

const DATASET_TEMPLATE: &str = r#"{
  "format": "ContinuousProfile",
  "geometry": { "dims": [2, 1, 1] },
  "axis": [500.0, 500.5, 501.0, 501.5, 502.0],
  "spectra": [
    { "index": { "x": 0, "y": 0 }, "intensities": [0.0, 4.0, 9.0, 4.0, 0.0] },
    { "index": { "x": 1, "y": 0 }, "intensities": [1.0, 2.0, 3.0, 2.0, 1.0] }
  ],
  "metadata": { "instrument": "example" }
}"#;

const TARGETS_TEMPLATE: &str = r#"[
  { "center": 501.0 },
  { "center": 500.5, "tolerance": 0.05, "name": "shoulder" }
]"#;

/// Main function for the 'write-template' subcommand.
pub fn main_write_template(args: WriteTemplateArgs) -> Result<(), CliError> {
    let target_dir = args.output_path;
    std::fs::create_dir_all(&target_dir)?;

    let config_path = target_dir.join("config_template.json");
    let dataset_path = target_dir.join("dataset_template.json");
    let targets_path = target_dir.join("targets_template.json");
    std::fs::write(&config_path, PROCESSING_TEMPLATE)?;
    std::fs::write(&dataset_path, DATASET_TEMPLATE)?;
    std::fs::write(&targets_path, TARGETS_TEMPLATE)?;
    println!(
        "Wrote templates to:\n- {}\n- {}\n- {}",
        config_path.display(),
        dataset_path.display(),
        targets_path.display()
    );
    Ok(())
}

pub struct JsonStreamSerializer<W: Write> {
    writer: W,
    format: SerializationFormat,
    is_first: bool,
}

impl<W: Write> JsonStreamSerializer<W> {
    pub fn new(writer: W, format: SerializationFormat) -> Self {
        Self {
            writer,
            format,
            is_first: true,
        }
    }

    /// Serializes an item based on the selected format.
    pub fn serialize<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        match self.format {
            SerializationFormat::Ndjson => {
                serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
                self.writer.write_all(b"\n")?;
            }
            SerializationFormat::Json | SerializationFormat::PrettyJson => {
                if self.is_first {
                    self.writer.write_all(b"[")?;
                    self.is_first = false;
                } else {
                    self.writer.write_all(b",")?;
                }

                if matches!(self.format, SerializationFormat::PrettyJson) {
                    serde_json::to_writer_pretty(&mut self.writer, item)
                } else {
                    serde_json::to_writer(&mut self.writer, item)
                }
                .map_err(io::Error::other)?;
            }
        }
        Ok(())
    }

    /// Closes the JSON array and flushes.
    pub fn finish(mut self) -> io::Result<()> {
        match self.format {
            SerializationFormat::Json | SerializationFormat::PrettyJson => {
                if self.is_first {
                    self.writer.write_all(b"[]")?;
                } else {
                    self.writer.write_all(b"]")?;
                }
            }
            SerializationFormat::Ndjson => {}
        }
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IonImageTarget;
    use msiquery::{
        MzTolerance,
        PeakPickingConfig,
        SmoothingStrategy,
        SpectrumFormat,
    };

    #[test]
    fn test_templates_deserializable() {
        let config: Config = serde_json::from_str(PROCESSING_TEMPLATE).unwrap();
        assert_eq!(config.processing.smoothing, SmoothingStrategy::SavitzkyGolay);
        assert_eq!(config.processing.tolerance, MzTolerance::Ppm(10.0));
        assert_eq!(config.peak_picking.charges, vec![1, 2, 3]);
        assert!(config.output.is_some());

        let dataset: DatasetInput = serde_json::from_str(DATASET_TEMPLATE).unwrap();
        assert_eq!(dataset.format, SpectrumFormat::ContinuousProfile);
        assert_eq!(dataset.spectra.len(), 2);
        assert!(dataset.into_spectrum_image(config.processing).is_ok());

        let targets: Vec<IonImageTarget> = serde_json::from_str(TARGETS_TEMPLATE).unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].tolerance, None);
        assert_eq!(targets[1].name.as_deref(), Some("shoulder"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.processing.number_of_bins(), 2000);
        assert_eq!(config.peak_picking, PeakPickingConfig::default());
        assert!(config.output_directory().is_err());
    }

    #[test]
    fn test_serializer_formats() {
        let mut buf = Vec::new();
        JsonStreamSerializer::new(&mut buf, SerializationFormat::Json)
            .finish()
            .unwrap();
        assert_eq!(buf, b"[]");

        let mut buf = Vec::new();
        let mut ser = JsonStreamSerializer::new(&mut buf, SerializationFormat::Ndjson);
        ser.serialize(&1).unwrap();
        ser.serialize(&2).unwrap();
        ser.finish().unwrap();
        assert_eq!(buf, b"1\n2\n");

        let mut buf = Vec::new();
        let mut ser = JsonStreamSerializer::new(&mut buf, SerializationFormat::Json);
        ser.serialize(&1).unwrap();
        ser.serialize(&2).unwrap();
        ser.finish().unwrap();
        assert_eq!(buf, b"[1,2]");
    }
}
