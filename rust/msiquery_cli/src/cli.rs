use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pick peaks on an overview spectrum of a dataset.
    PickPeaks(PickPeaksArgs),
    /// Extract ion images from a dataset.
    IonImages(IonImagesArgs),
    /// Write template configuration files.
    WriteTemplate(WriteTemplateArgs),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum SerializationFormat {
    Json,
    #[default]
    PrettyJson,
    Ndjson,
}

/// Arguments shared by every subcommand that loads a dataset.
#[derive(Parser, Debug, Clone)]
pub struct DatasetArgs {
    /// The path to the json file with the dataset.
    #[arg(short, long)]
    pub input_path: PathBuf,

    /// The path to the json file with the processing configuration.
    #[arg(short, long)]
    pub config_path: Option<PathBuf>,

    /// The path to the output directory, overrides the config file.
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// Number of worker threads, overrides the config file.
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// The format to use for the output
    #[arg(short, long, default_value_t, value_enum)]
    pub format: SerializationFormat,
}

#[derive(Parser, Debug, Clone)]
pub struct PickPeaksArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// Group the picked peaks into monoisotopic clusters.
    #[arg(short, long)]
    pub monoisotopic: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct IonImagesArgs {
    #[command(flatten)]
    pub dataset: DatasetArgs,

    /// The path to a json list of ion image targets.
    /// When missing, the picked peaks are used as targets.
    #[arg(long)]
    pub targets_path: Option<PathBuf>,

    /// Also write the intensity matrix of every target.
    #[arg(long)]
    pub matrix: bool,
}

#[derive(Parser, Debug)]
pub struct WriteTemplateArgs {
    /// The path to the output files.
    #[arg(short, long)]
    pub output_path: PathBuf,
}
