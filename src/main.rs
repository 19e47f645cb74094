#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args as ClapArgs, Parser};
use env_logger::Env;
use log::info;
use readsutils::context::{ErrorContext, FileProvenance, ObjectRef, Side};
use readsutils::convert::{FileHandle, LibraryKind, LocalProvider, ReadLibrary, ReadsConverter};
use readsutils::io::{deinterleave_file, interleave_files};
use readsutils::upload::{UploadParams, UploadPreparer};
use readsutils::validate::{FastaValidator, FastqValidationParams, FastqValidator};
use readsutils::{Config, ConversionRequest, ReadStatistics, ReadsError, Ternary};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(styles = STYLES, version)]
struct Args {
    #[command(flatten)]
    global: GlobalOptions,

    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[derive(ClapArgs, Debug)]
struct GlobalOptions {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Scratch directory, overriding the configuration
    #[arg(long, global = true)]
    scratch: Option<PathBuf>,
}

impl GlobalOptions {
    fn load(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_path(path).with_context(|| format!("loading {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(scratch) = &self.scratch {
            config.scratch = scratch.clone();
        }
        Ok(config)
    }
}

#[derive(clap::Subcommand, Debug)]
enum Subcommand {
    /// Validate FASTQ files, removing blank lines in place
    #[command(display_order = 1)]
    ValidateFastq(ValidateFastq),
    /// Validate a FASTA file
    #[command(display_order = 2)]
    ValidateFasta(ValidateFasta),
    /// Merge forward and reverse files into one interleaved file
    #[command(display_order = 3)]
    Interleave(Interleave),
    /// Split an interleaved file into forward and reverse files
    #[command(display_order = 4)]
    Deinterleave(Deinterleave),
    /// Compute read statistics
    #[command(display_order = 5)]
    Stats(Stats),
    /// Lay out a local read library in the requested shape
    #[command(display_order = 6)]
    Convert(Convert),
    /// Interleave, validate and summarize files before upload
    #[command(display_order = 7)]
    PrepareUpload(PrepareUpload),
}

/// Implemented by every subcommand
trait Command {
    fn execute(&self, config: &Config) -> Result<()>;
}

impl Command for Subcommand {
    fn execute(&self, config: &Config) -> Result<()> {
        match self {
            Self::ValidateFastq(c) => c.execute(config),
            Self::ValidateFasta(c) => c.execute(config),
            Self::Interleave(c) => c.execute(config),
            Self::Deinterleave(c) => c.execute(config),
            Self::Stats(c) => c.execute(config),
            Self::Convert(c) => c.execute(config),
            Self::PrepareUpload(c) => c.execute(config),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(ClapArgs, Debug)]
struct ValidateFastq {
    /// FASTQ files to validate
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Files hold interleaved pairs
    #[arg(long)]
    interleaved: bool,
}

impl Command for ValidateFastq {
    fn execute(&self, config: &Config) -> Result<()> {
        let params: Vec<FastqValidationParams> = self
            .files
            .iter()
            .map(|f| FastqValidationParams {
                file_path: Some(f.clone()),
                interleaved: self.interleaved,
            })
            .collect();
        let outcomes = FastqValidator::from_config(config).validate_many(&params)?;
        print_json(&outcomes)
    }
}

#[derive(ClapArgs, Debug)]
struct ValidateFasta {
    /// FASTA file to validate
    file: PathBuf,
}

#[derive(Serialize)]
struct FastaOutcome {
    valid: bool,
}

impl Command for ValidateFasta {
    fn execute(&self, config: &Config) -> Result<()> {
        let valid = FastaValidator::from_config(config).validate(&self.file)?;
        print_json(&FastaOutcome { valid })
    }
}

#[derive(ClapArgs, Debug)]
struct Interleave {
    /// Forward reads
    #[arg(long)]
    fwd: PathBuf,
    /// Reverse reads
    #[arg(long)]
    rev: PathBuf,
    /// Interleaved output, gzip/bzip2 compressed by extension
    #[arg(short, long)]
    output: PathBuf,
}

impl Command for Interleave {
    fn execute(&self, _config: &Config) -> Result<()> {
        let context = ErrorContext::new()
            .with_side(Side::Forward, FileProvenance::new().with_local_path(&self.fwd))
            .with_side(Side::Reverse, FileProvenance::new().with_local_path(&self.rev));
        let pairs = interleave_files(&self.fwd, &self.rev, &self.output, &context)?;
        info!("Wrote {} pairs to {}", pairs, self.output.display());
        Ok(())
    }
}

#[derive(ClapArgs, Debug)]
struct Deinterleave {
    /// Interleaved reads
    #[arg(short, long)]
    input: PathBuf,
    /// Forward output
    #[arg(long)]
    fwd: PathBuf,
    /// Reverse output
    #[arg(long)]
    rev: PathBuf,
}

impl Command for Deinterleave {
    fn execute(&self, _config: &Config) -> Result<()> {
        let context = ErrorContext::new().with_file(FileProvenance::new().with_local_path(&self.input));
        let lines = deinterleave_file(&self.input, &self.fwd, &self.rev, &context)?;
        info!("Split {} records from {}", lines / 4, self.input.display());
        Ok(())
    }
}

#[derive(ClapArgs, Debug)]
struct Stats {
    /// FASTQ file, optionally compressed
    file: PathBuf,
}

impl Command for Stats {
    fn execute(&self, _config: &Config) -> Result<()> {
        print_json(&ReadStatistics::from_path(&self.file)?)
    }
}

#[derive(ClapArgs, Debug)]
struct Convert {
    /// Forward (or only) reads file
    #[arg(long)]
    fwd: PathBuf,
    /// Reverse reads file of a paired library
    #[arg(long)]
    rev: Option<PathBuf>,
    /// The forward file holds interleaved pairs
    #[arg(long, conflicts_with = "rev")]
    interleaved_input: bool,
    /// Requested layout: "true" to interleave, "false" to deinterleave
    #[arg(long)]
    interleave: Option<String>,
    /// Workspace reference of the library
    #[arg(long, default_value = "local")]
    reference: String,
    /// Workspace object name of the library
    #[arg(long)]
    name: Option<String>,
    /// Workspace type of the library, e.g. KBaseAssembly.PairedEndLibrary
    #[arg(long = "type")]
    type_name: Option<String>,
    /// JSON file with the library's descriptive fields
    #[arg(long)]
    metadata: Option<PathBuf>,
}

impl Command for Convert {
    fn execute(&self, config: &Config) -> Result<()> {
        let request = ConversionRequest::from(Ternary::parse("interleaved", self.interleave.as_deref())?);
        let mut object = ObjectRef::new(&self.reference);
        if let Some(name) = &self.name {
            object = object.with_name(name);
        }
        let fwd = FileHandle::local(&self.fwd);
        let kind = match (&self.rev, self.interleaved_input) {
            (Some(rev), _) => LibraryKind::PairedSeparate {
                forward: fwd,
                reverse: FileHandle::local(rev),
            },
            (None, true) => LibraryKind::PairedInterleaved(fwd),
            (None, false) => LibraryKind::Single(fwd),
        };
        let mut library = ReadLibrary::new(object, kind);
        if let Some(type_name) = &self.type_name {
            library = library.with_type_name(type_name);
        }
        if let Some(path) = &self.metadata {
            library = library.with_metadata(read_json(path)?);
        }
        let result = ReadsConverter::new(config, LocalProvider::new()).download(&library, request)?;
        print_json(&result)
    }
}

#[derive(ClapArgs, Debug)]
struct PrepareUpload {
    /// JSON file of upload parameters; the options below override it
    #[arg(long)]
    params: Option<PathBuf>,
    /// Forward (or only) reads file
    #[arg(long)]
    fwd: Option<PathBuf>,
    /// Reverse reads file
    #[arg(long)]
    rev: Option<PathBuf>,
    /// The forward file holds interleaved pairs
    #[arg(long, conflicts_with = "rev")]
    interleaved: bool,
    /// Sequencing technology
    #[arg(long)]
    sequencing_tech: Option<String>,
    /// The reads come from a metagenome
    #[arg(long)]
    metagenome: bool,
    /// Mean fragment size
    #[arg(long)]
    insert_size_mean: Option<f64>,
    /// Fragment size standard deviation
    #[arg(long)]
    insert_size_std_dev: Option<f64>,
    /// Paired reads point away from each other
    #[arg(long)]
    outward: bool,
}

impl PrepareUpload {
    fn upload_params(&self) -> Result<UploadParams> {
        let mut params: UploadParams = match &self.params {
            Some(path) => read_json(path)?,
            None => UploadParams::default(),
        };
        if let Some(fwd) = &self.fwd {
            params.fwd_file = Some(fwd.clone());
        }
        if let Some(rev) = &self.rev {
            params.rev_file = Some(rev.clone());
        }
        if let Some(tech) = &self.sequencing_tech {
            params.sequencing_tech = Some(tech.clone());
        }
        if self.insert_size_mean.is_some() {
            params.insert_size_mean = self.insert_size_mean;
        }
        if self.insert_size_std_dev.is_some() {
            params.insert_size_std_dev = self.insert_size_std_dev;
        }
        params.interleaved |= self.interleaved;
        params.read_orientation_outward |= self.outward;
        if self.metagenome {
            params.single_genome = Some(false);
        }
        Ok(params)
    }
}

impl Command for PrepareUpload {
    fn execute(&self, config: &Config) -> Result<()> {
        let params = self.upload_params()?;
        let prepared = UploadPreparer::from_config(config).prepare_params(&params, |node| {
            Err(ReadsError::InvalidParameter(format!(
                "Shock node {node} cannot be fetched from the command line"
            )))
        })?;
        print_json(&prepared)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("creating scratch directory {}", path.display()))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.global.load()?;
    ensure_dir(&config.scratch)?;

    info!("Running readsutils version {}", readsutils::VERSION);
    args.subcommand.execute(&config)
}
