//! Preparing reads files for upload
//!
//! Before reads are stored they are put into their stored shape, validated
//! and summarized. A forward/reverse pair is interleaved into one scratch
//! file first; compressed single files are decompressed into scratch. When
//! validation fails the error names every input the user supplied, so the
//! message points back at the staging file, URL or shock node rather than
//! at a scratch path the user never saw.
//!
//! [`UploadParams`] is the request as submitted: where the files are plus
//! the descriptive fields stored with the library. Checking it yields the
//! [`UploadMetadata`] saved alongside the prepared file.

use crate::config::Config;
use crate::context::{ErrorContext, FileProvenance, Side};
use crate::error::{ReadsError, Result};
use crate::io::{decompress_to_path, interleave_files, CompressedReader, CompressionFormat, DataSource};
use crate::stats::ReadStatistics;
use crate::types::ReadsShape;
use crate::validate::{CommandChecker, FastqValidator, SyntaxChecker};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Where an upload file came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadSource {
    /// A file on the local file system
    Local,
    /// A file in the user's staging area, by subdirectory path
    Staging(String),
    /// A file downloaded from a URL
    Url(String),
    /// A file fetched from a shock node
    Shock {
        /// Node id
        node: String,
        /// Name stored on the node, when known
        filename: Option<String>,
    },
}

impl UploadSource {
    fn kind(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Staging(_) => "staging",
            Self::Url(_) => "URL",
            Self::Shock { .. } => "shock",
        }
    }
}

/// One input file, already fetched to a local path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    /// Local copy of the file
    pub path: PathBuf,
    /// Where it came from
    pub source: UploadSource,
}

impl UploadFile {
    /// A local file
    pub fn local<P: AsRef<Path>>(path: P) -> Self {
        Self::new(path, UploadSource::Local)
    }

    /// A fetched file of any origin
    pub fn new<P: AsRef<Path>>(path: P, source: UploadSource) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    fn provenance(&self) -> FileProvenance {
        let provenance = FileProvenance::new();
        match &self.source {
            UploadSource::Local => provenance.with_local_path(&self.path),
            UploadSource::Staging(name) => provenance.with_staging_path(name.clone()),
            UploadSource::Url(url) => provenance.with_file_url(url.clone()),
            UploadSource::Shock { node, filename } => provenance
                .with_shock_node(node.clone())
                .with_optional_shock_filename(filename.clone()),
        }
    }
}

/// Files to prepare for one upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Forward (or only) reads
    pub fwd: UploadFile,
    /// Reverse reads of a pair
    pub rev: Option<UploadFile>,
    /// Whether `fwd` alone already holds interleaved pairs
    pub interleaved: bool,
}

impl UploadRequest {
    /// Request for a single file
    pub fn single(fwd: UploadFile) -> Self {
        Self {
            fwd,
            rev: None,
            interleaved: false,
        }
    }

    /// Request for a forward/reverse pair
    pub fn paired(fwd: UploadFile, rev: UploadFile) -> Self {
        Self {
            fwd,
            rev: Some(rev),
            interleaved: false,
        }
    }

    /// Mark the forward file as interleaved
    pub fn with_interleaved(mut self, interleaved: bool) -> Self {
        self.interleaved = interleaved;
        self
    }

    fn context(&self) -> ErrorContext {
        match &self.rev {
            Some(rev) => ErrorContext::new()
                .with_side(Side::Forward, self.fwd.provenance())
                .with_side(Side::Reverse, rev.provenance()),
            None => ErrorContext::new().with_file(self.fwd.provenance()),
        }
    }
}

/// Upload parameters as submitted
///
/// The forward reads come either from a local file or from a shock node,
/// never both. A reverse file must come from the same kind of place.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct UploadParams {
    /// Shock node holding the forward reads
    pub fwd_id: Option<String>,
    /// Local file holding the forward reads
    pub fwd_file: Option<PathBuf>,
    /// Shock node holding the reverse reads
    pub rev_id: Option<String>,
    /// Local file holding the reverse reads
    pub rev_file: Option<PathBuf>,
    /// Whether the forward file holds interleaved pairs
    pub interleaved: bool,
    /// Sequencing technology, required
    pub sequencing_tech: Option<String>,
    /// `false` for metagenomes; absent means single genome
    pub single_genome: Option<bool>,
    /// Organism strain
    pub strain: Option<serde_json::Value>,
    /// Source of the reads
    pub source: Option<serde_json::Value>,
    /// Mean fragment size, positive when given
    pub insert_size_mean: Option<f64>,
    /// Fragment size standard deviation, positive when given
    pub insert_size_std_dev: Option<f64>,
    /// Whether paired reads point away from each other
    pub read_orientation_outward: bool,
}

impl UploadParams {
    /// Check the parameters and derive the stored metadata
    pub fn check(&self) -> Result<UploadMetadata> {
        if self.fwd_id.is_some() == self.fwd_file.is_some() {
            return Err(invalid(
                "Exactly one of a file or shock id containing a forwards reads file must be specified",
            ));
        }
        let shock = self.fwd_id.is_some();
        if self.rev_id.is_some() && self.rev_file.is_some() {
            return Err(invalid(
                "Specified both a local file and a shock node for the reverse reads file",
            ));
        }
        if shock && self.rev_file.is_some() {
            return Err(invalid(
                "Cannot specify a local reverse reads file with a forward reads file in shock",
            ));
        }
        if !shock && self.rev_id.is_some() {
            return Err(invalid(
                "Cannot specify a reverse reads file in shock with a local forward reads file",
            ));
        }
        let has_reverse = self.rev_id.is_some() || self.rev_file.is_some();

        let sequencing_tech = match self.sequencing_tech.as_deref() {
            Some(tech) if !tech.is_empty() => tech.to_string(),
            _ => return Err(invalid("The sequencing technology must be provided")),
        };
        check_positive(self.insert_size_mean, "insert_size_mean")?;
        check_positive(self.insert_size_std_dev, "insert_size_std_dev")?;

        let paired = (self.interleaved || has_reverse).then(|| PairedMetadata {
            insert_size_mean: self.insert_size_mean,
            insert_size_std_dev: self.insert_size_std_dev,
            interleaved: true,
            read_orientation_outward: self.read_orientation_outward,
        });
        Ok(UploadMetadata {
            sequencing_tech,
            single_genome: self.single_genome != Some(false),
            strain: self.strain.clone().filter(is_set),
            source: self.source.clone().filter(is_set),
            paired,
        })
    }

    /// Files to prepare, fetching shock nodes through `fetch_node`
    pub fn request<F>(&self, mut fetch_node: F) -> Result<UploadRequest>
    where
        F: FnMut(&str) -> Result<UploadFile>,
    {
        let fwd = match (&self.fwd_id, &self.fwd_file) {
            (Some(node), _) => fetch_node(node)?,
            (None, Some(path)) => UploadFile::local(path),
            (None, None) => return Err(invalid("No forward reads file given")),
        };
        let rev = match (&self.rev_id, &self.rev_file) {
            (Some(node), _) => Some(fetch_node(node)?),
            (None, Some(path)) => Some(UploadFile::local(path)),
            (None, None) => None,
        };
        Ok(match rev {
            Some(rev) => UploadRequest::paired(fwd, rev),
            None => UploadRequest::single(fwd).with_interleaved(self.interleaved),
        })
    }
}

fn invalid(message: &str) -> ReadsError {
    ReadsError::InvalidParameter(message.to_string())
}

fn check_positive(value: Option<f64>, name: &str) -> Result<()> {
    match value {
        Some(v) if v.is_nan() || v <= 0.0 => Err(ReadsError::InvalidParameter(format!("{name} must be > 0"))),
        _ => Ok(()),
    }
}

/// Empty strings and objects count as not given
fn is_set(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null | serde_json::Value::Bool(false) => false,
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        _ => true,
    }
}

/// Fields stored only on paired-end libraries
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedMetadata {
    /// Mean fragment size
    pub insert_size_mean: Option<f64>,
    /// Fragment size standard deviation
    pub insert_size_std_dev: Option<f64>,
    /// Paired uploads are always stored interleaved
    pub interleaved: bool,
    /// Whether reads point away from each other
    pub read_orientation_outward: bool,
}

/// Descriptive fields stored with an uploaded library
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadMetadata {
    /// Sequencing technology
    pub sequencing_tech: String,
    /// `false` for metagenomes
    pub single_genome: bool,
    /// Organism strain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strain: Option<serde_json::Value>,
    /// Source of the reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<serde_json::Value>,
    /// Paired-end fields, absent for single-end reads
    #[serde(flatten)]
    pub paired: Option<PairedMetadata>,
}

impl UploadMetadata {
    /// Workspace type the library is stored as
    pub fn library_type(&self) -> &'static str {
        if self.paired.is_some() {
            "KBaseFile.PairedEndLibrary"
        } else {
            "KBaseFile.SingleEndLibrary"
        }
    }
}

/// A prepared file together with the metadata to store with it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedLibrary {
    /// Workspace type of the library
    #[serde(rename = "type")]
    pub library_type: &'static str,
    /// Descriptive fields
    pub metadata: UploadMetadata,
    /// The validated file and its statistics
    pub upload: PreparedUpload,
}

/// A validated file ready to be stored
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedUpload {
    /// File to store
    pub path: PathBuf,
    /// Layout of the stored file
    #[serde(rename = "type")]
    pub shape: ReadsShape,
    /// Statistics computed from the file
    pub stats: ReadStatistics,
}

/// Interleaves, validates and summarizes upload inputs
pub struct UploadPreparer<C: SyntaxChecker> {
    scratch: PathBuf,
    validator: FastqValidator<C>,
}

impl UploadPreparer<CommandChecker> {
    /// Preparer using the configured FASTQ checker
    pub fn from_config(config: &Config) -> Self {
        Self::new(config, FastqValidator::from_config(config))
    }
}

impl<C: SyntaxChecker> UploadPreparer<C> {
    /// Preparer writing to the configured scratch directory
    pub fn new(config: &Config, validator: FastqValidator<C>) -> Self {
        Self {
            scratch: config.scratch.clone(),
            validator,
        }
    }

    /// Prepare one upload
    pub fn prepare(&self, request: &UploadRequest) -> Result<PreparedUpload> {
        check_file(&request.fwd)?;
        if let Some(rev) = &request.rev {
            check_file(rev)?;
            if rev.source.kind() != request.fwd.source.kind() {
                return Err(ReadsError::InvalidParameter(format!(
                    "Cannot specify a {} reverse reads file with a {} forward reads file",
                    rev.source.kind(),
                    request.fwd.source.kind()
                )));
            }
        }
        let context = request.context();

        let (path, shape) = match &request.rev {
            Some(rev) => {
                let target = self.scratch_file("inter.fastq");
                interleave_files(&request.fwd.path, &rev.path, &target, &context)?;
                (target, ReadsShape::Interleaved)
            }
            None => {
                let shape = if request.interleaved {
                    ReadsShape::Interleaved
                } else {
                    ReadsShape::Single
                };
                (self.uncompressed(&request.fwd.path)?, shape)
            }
        };

        info!("Validating {} for upload", path.display());
        let outcome = self.validator.validate(&path, shape == ReadsShape::Interleaved)?;
        if !outcome.validated {
            return Err(ReadsError::InvalidFastq(
                context.render(&format!("Invalid FASTQ file - Path: {}.", path.display())),
            ));
        }

        let stats = ReadStatistics::from_path(&path)?;
        info!("{} reads, {} bases in {}", stats.read_count, stats.total_bases, path.display());
        Ok(PreparedUpload { path, shape, stats })
    }

    /// Check `params`, then prepare the files they name
    ///
    /// Parameter errors are reported before any file is touched.
    pub fn prepare_params<F>(&self, params: &UploadParams, fetch_node: F) -> Result<PreparedLibrary>
    where
        F: FnMut(&str) -> Result<UploadFile>,
    {
        let metadata = params.check()?;
        let upload = self.prepare(&params.request(fetch_node)?)?;
        Ok(PreparedLibrary {
            library_type: metadata.library_type(),
            metadata,
            upload,
        })
    }

    /// Plain-text version of `path`, decompressed into scratch if needed
    fn uncompressed(&self, path: &Path) -> Result<PathBuf> {
        let format = CompressedReader::new(DataSource::from_path(path))?.format();
        if format == CompressionFormat::None {
            return Ok(path.to_path_buf());
        }
        let target = self.scratch_file("fastq");
        info!("Decompressing {} to {}", path.display(), target.display());
        decompress_to_path(path, &target)?;
        Ok(target)
    }

    fn scratch_file(&self, extension: &str) -> PathBuf {
        self.scratch.join(Uuid::new_v4().to_string()).with_extension(extension)
    }
}

fn check_file(file: &UploadFile) -> Result<()> {
    if !file.path.is_file() {
        return Err(ReadsError::NoSuchFile(file.path.display().to_string()));
    }
    Ok(())
}
