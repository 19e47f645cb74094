//! Read library conversion
//!
//! A read library is one workspace object describing either a single-end
//! file, a pair of forward/reverse files or one interleaved file. Conversion
//! fetches the physical files into the scratch directory and lays them out
//! in the requested shape:
//!
//! | library            | request            | result                               |
//! |--------------------|--------------------|--------------------------------------|
//! | single             | any                | `{file}.single.fastq`                |
//! | paired, two files  | `ForceInterleaved` | `{scratch}/{uuid}.inter.fastq`       |
//! | paired, two files  | otherwise          | `{fwd}.fwd.fastq`, `{rev}.rev.fastq` |
//! | interleaved        | `ForceDeinterleaved` | `{scratch}/{uuid}.fwd.fastq`, `{scratch}/{uuid}.rev.fastq` |
//! | interleaved        | otherwise          | `{file}.inter.fastq`                 |
//!
//! Fetching goes through a [`ReadsProvider`], so the object store and the
//! workspace stay outside this crate. [`LocalProvider`] serves libraries
//! backed by local files.

use crate::config::Config;
use crate::context::{ErrorContext, FileProvenance, ObjectRef, Side};
use crate::error::{ReadsError, Result};
use crate::io::{decompress_to_path, deinterleave_file, interleave_files};
use crate::types::{ReadsShape, Ternary};
use crate::validate::fastq_filename_ok;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One physical file of a read library
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHandle {
    /// File type declared on the workspace object, e.g. `fq` or `.fastq.gz`
    pub declared_type: Option<String>,
    /// File name recorded on the handle
    pub declared_filename: Option<String>,
    /// Where the file lives
    pub provenance: FileProvenance,
}

impl FileHandle {
    /// Handle for a file with the given provenance
    pub fn new(provenance: FileProvenance) -> Self {
        Self {
            provenance,
            ..Self::default()
        }
    }

    /// Handle for a local file, named after it
    pub fn local<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        Self::new(FileProvenance::new().with_local_path(path))
            .with_declared_filename(path.file_name().map(|n| n.to_string_lossy().into_owned()))
    }

    /// Set the declared file type
    pub fn with_declared_type(mut self, file_type: Option<String>) -> Self {
        self.declared_type = file_type;
        self
    }

    /// Set the declared file name
    pub fn with_declared_filename(mut self, filename: Option<String>) -> Self {
        self.declared_filename = filename;
        self
    }
}

/// The files making up a read library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryKind {
    /// Single-end reads
    Single(FileHandle),
    /// Paired-end reads in two files
    PairedSeparate {
        /// Forward reads
        forward: FileHandle,
        /// Reverse reads
        reverse: FileHandle,
    },
    /// Paired-end reads interleaved in one file
    PairedInterleaved(FileHandle),
}

/// Workspace modules whose read library types are understood
const LIBRARY_MODULES: [&str; 2] = ["KBaseFile", "KBaseAssembly"];

/// Read library type names, without module or version
const LIBRARY_TYPES: [&str; 2] = ["SingleEndLibrary", "PairedEndLibrary"];

/// Descriptive fields stored on a read library object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryMetadata {
    /// `false` for metagenomes
    pub single_genome: Option<bool>,
    /// Whether paired reads point away from each other
    pub read_orientation_outward: Option<bool>,
    /// Mean fragment size
    pub insert_size_mean: Option<f64>,
    /// Standard deviation of the fragment size
    pub insert_size_std_dev: Option<f64>,
    /// Where the reads came from, passed through as stored
    pub source: Option<serde_json::Value>,
    /// Organism strain, passed through as stored
    pub strain: Option<serde_json::Value>,
    /// Sequencing technology
    pub sequencing_tech: Option<String>,
    /// Number of reads
    pub read_count: Option<u64>,
    /// Total bases
    pub read_size: Option<u64>,
    /// GC fraction between 0 and 1
    pub gc_content: Option<f64>,
}

/// A read library as stored in the workspace
#[derive(Debug, Clone, PartialEq)]
pub struct ReadLibrary {
    /// Owning workspace object
    pub object: ObjectRef,
    /// Workspace type string, e.g. `KBaseFile.PairedEndLibrary-2.1`
    pub type_name: String,
    /// Physical layout
    pub kind: LibraryKind,
    /// Descriptive fields
    pub metadata: LibraryMetadata,
}

impl ReadLibrary {
    /// Create a `KBaseFile` library description without metadata
    pub fn new(object: ObjectRef, kind: LibraryKind) -> Self {
        let type_name = match kind {
            LibraryKind::Single(_) => "KBaseFile.SingleEndLibrary",
            _ => "KBaseFile.PairedEndLibrary",
        };
        Self {
            object,
            type_name: type_name.to_string(),
            kind,
            metadata: LibraryMetadata::default(),
        }
    }

    /// Set the workspace type string
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Attach descriptive metadata
    pub fn with_metadata(mut self, metadata: LibraryMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check the workspace type, returning whether it is a `KBaseFile` type
    ///
    /// The version suffix after `-` is ignored.
    pub fn check_type(&self) -> Result<bool> {
        let bare = self.type_name.split('-').next().unwrap_or_default();
        let known = bare
            .split_once('.')
            .filter(|(module, name)| LIBRARY_MODULES.contains(module) && LIBRARY_TYPES.contains(name));
        match known {
            Some((module, _)) => Ok(module == LIBRARY_MODULES[0]),
            None => {
                let supported: Vec<String> = LIBRARY_MODULES
                    .iter()
                    .flat_map(|m| LIBRARY_TYPES.iter().map(move |t| format!("{m}.{t}")))
                    .collect();
                let object = match &self.object.name {
                    Some(name) => format!("{} ({name})", self.object.reference),
                    None => self.object.reference.clone(),
                };
                Err(ReadsError::InvalidLibrary(format!(
                    "Invalid type for object {object}. Supported types: {}",
                    supported.join(" ")
                )))
            }
        }
    }

    /// Shape of the stored data
    pub fn shape(&self) -> ReadsShape {
        match self.kind {
            LibraryKind::Single(_) => ReadsShape::Single,
            LibraryKind::PairedSeparate { .. } => ReadsShape::Paired,
            LibraryKind::PairedInterleaved(_) => ReadsShape::Interleaved,
        }
    }
}

/// Desired layout of paired output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionRequest {
    /// Merge paired files into one interleaved file
    ForceInterleaved,
    /// Split an interleaved file into two
    ForceDeinterleaved,
    /// Keep whatever layout the library has
    #[default]
    LeaveAsIs,
}

impl From<Ternary> for ConversionRequest {
    fn from(value: Ternary) -> Self {
        match value {
            Ternary::True => Self::ForceInterleaved,
            Ternary::False => Self::ForceDeinterleaved,
            Ternary::Unknown => Self::LeaveAsIs,
        }
    }
}

/// Files produced for one library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionResult {
    /// Forward (or only) file
    pub fwd: PathBuf,
    /// Original name of the forward file
    pub fwd_name: Option<String>,
    /// Reverse file, set only when the output is two files
    pub rev: Option<PathBuf>,
    /// Original name of the reverse file
    pub rev_name: Option<String>,
    /// Shape of the library as stored
    #[serde(rename = "otype")]
    pub original_shape: ReadsShape,
    /// Shape of the output
    #[serde(rename = "type")]
    pub shape: ReadsShape,
}

/// One converted library with its descriptive fields
///
/// Fields the library does not carry are reported as null.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadedLibrary {
    /// Workspace reference of the library
    #[serde(rename = "ref")]
    pub reference: String,
    /// Converted files
    pub files: ConversionResult,
    /// Unknown for `KBaseAssembly` libraries, true unless stored as false otherwise
    pub single_genome: Ternary,
    /// Unknown for single-end libraries
    pub read_orientation_outward: Ternary,
    /// Mean fragment size
    pub insert_size_mean: Option<f64>,
    /// Standard deviation of the fragment size
    pub insert_size_std_dev: Option<f64>,
    /// Source information
    pub source: Option<serde_json::Value>,
    /// Strain information
    pub strain: Option<serde_json::Value>,
    /// Sequencing technology
    pub sequencing_tech: Option<String>,
    /// Number of reads
    pub read_count: Option<u64>,
    /// Total bases
    pub read_size: Option<u64>,
    /// GC fraction
    pub gc_content: Option<f64>,
}

impl DownloadedLibrary {
    fn new(library: &ReadLibrary, kbase_file: bool, files: ConversionResult) -> Self {
        let metadata = library.metadata.clone();
        let single_genome = if !kbase_file {
            Ternary::Unknown
        } else {
            Ternary::from(metadata.single_genome != Some(false))
        };
        let read_orientation_outward = match (library.shape(), metadata.read_orientation_outward) {
            (ReadsShape::Single, _) => Ternary::Unknown,
            (_, Some(outward)) => Ternary::from(outward),
            (_, None) if kbase_file => Ternary::False,
            (_, None) => Ternary::Unknown,
        };
        Self {
            reference: library.object.reference.clone(),
            files,
            single_genome,
            read_orientation_outward,
            insert_size_mean: metadata.insert_size_mean,
            insert_size_std_dev: metadata.insert_size_std_dev,
            source: metadata.source,
            strain: metadata.strain,
            sequencing_tech: metadata.sequencing_tech,
            read_count: metadata.read_count,
            read_size: metadata.read_size,
            gc_content: metadata.gc_content,
        }
    }
}

/// A file fetched into the scratch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// Local, uncompressed copy
    pub path: PathBuf,
    /// File name reported by the store
    pub filename: Option<String>,
}

/// Access to read library metadata and file contents
pub trait ReadsProvider {
    /// Look up the library stored under a workspace reference
    fn fetch_library(&self, reference: &str) -> Result<ReadLibrary>;

    /// Fetch one file, uncompressed, into `scratch`
    fn materialize(&self, handle: &FileHandle, scratch: &Path) -> Result<Materialized>;
}

/// Provider serving libraries whose files are on the local file system
#[derive(Debug, Clone, Default)]
pub struct LocalProvider {
    libraries: BTreeMap<String, ReadLibrary>,
}

impl LocalProvider {
    /// Provider with no registered libraries
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library under its object reference
    pub fn with_library(mut self, library: ReadLibrary) -> Self {
        self.libraries.insert(library.object.reference.clone(), library);
        self
    }
}

impl ReadsProvider for LocalProvider {
    fn fetch_library(&self, reference: &str) -> Result<ReadLibrary> {
        self.libraries
            .get(reference)
            .cloned()
            .ok_or_else(|| ReadsError::InvalidParameter(format!("No reads library found for {reference}")))
    }

    fn materialize(&self, handle: &FileHandle, scratch: &Path) -> Result<Materialized> {
        let source = handle.provenance.local_path.as_deref().ok_or_else(|| {
            let context = ErrorContext::new().with_file(handle.provenance.clone());
            ReadsError::InvalidLibrary(context.render("File handle has no local path"))
        })?;
        if !source.is_file() {
            return Err(ReadsError::NoSuchFile(source.display().to_string()));
        }

        let stem = match &handle.provenance.shock_node {
            Some(node) => format!("{node}.{}", Uuid::new_v4()),
            None => Uuid::new_v4().to_string(),
        };
        let dest = scratch.join(stem);
        let format = decompress_to_path(source, &dest)?;
        debug!("Materialized {} at {} ({:?})", source.display(), dest.display(), format);

        Ok(Materialized {
            path: dest,
            filename: source.file_name().map(|n| n.to_string_lossy().into_owned()),
        })
    }
}

/// Lays read libraries out on disk in the requested shape
pub struct ReadsConverter<P: ReadsProvider> {
    scratch: PathBuf,
    provider: P,
}

impl<P: ReadsProvider> ReadsConverter<P> {
    /// Converter writing into the configured scratch directory
    pub fn new(config: &Config, provider: P) -> Self {
        Self {
            scratch: config.scratch.clone(),
            provider,
        }
    }

    /// Fetch and convert several libraries by workspace reference
    ///
    /// Duplicate references are converted once. The result maps each
    /// reference to its files and metadata.
    pub fn download_reads(
        &self,
        references: &[String],
        interleaved: Ternary,
    ) -> Result<BTreeMap<String, DownloadedLibrary>> {
        if references.is_empty() {
            return Err(ReadsError::InvalidParameter(
                "At least one reads library must be provided".to_string(),
            ));
        }
        let unique: BTreeSet<&String> = references.iter().collect();
        if let Some(bad) = unique.iter().find(|r| r.trim().is_empty()) {
            return Err(ReadsError::InvalidParameter(format!("Invalid workspace object name: {bad}")));
        }

        let request = ConversionRequest::from(interleaved);
        let mut output = BTreeMap::new();
        for reference in unique {
            info!("=== processing read library {} ===", reference);
            let library = self.provider.fetch_library(reference)?;
            output.insert(reference.clone(), self.download(&library, request)?);
        }
        Ok(output)
    }

    /// Check the library's type, convert it and report its metadata
    pub fn download(&self, library: &ReadLibrary, request: ConversionRequest) -> Result<DownloadedLibrary> {
        let kbase_file = library.check_type()?;
        info!("Type: {}", library.type_name);
        let files = self.convert(library, request)?;
        Ok(DownloadedLibrary::new(library, kbase_file, files))
    }

    /// Convert one library
    pub fn convert(&self, library: &ReadLibrary, request: ConversionRequest) -> Result<ConversionResult> {
        let object = &library.object;
        match &library.kind {
            LibraryKind::Single(handle) => {
                let file = self.fetch(object, handle)?;
                let path = suffixed(&file.path, ".single.fastq");
                move_file(&file.path, &path)?;
                Ok(ConversionResult {
                    fwd: path,
                    fwd_name: file.filename,
                    rev: None,
                    rev_name: None,
                    original_shape: ReadsShape::Single,
                    shape: ReadsShape::Single,
                })
            }
            LibraryKind::PairedSeparate { forward, reverse } => {
                let fwd = self.fetch(object, forward)?;
                let rev = self.fetch(object, reverse)?;
                if request == ConversionRequest::ForceInterleaved {
                    let target = self.scratch_prefix().with_extension("inter.fastq");
                    let context = ErrorContext::new()
                        .with_object(object.clone())
                        .with_side(Side::Forward, fetched_provenance(forward, &fwd))
                        .with_side(Side::Reverse, fetched_provenance(reverse, &rev));
                    interleave_files(&fwd.path, &rev.path, &target, &context)?;
                    Ok(ConversionResult {
                        fwd: target,
                        fwd_name: fwd.filename,
                        rev: None,
                        rev_name: rev.filename,
                        original_shape: ReadsShape::Paired,
                        shape: ReadsShape::Interleaved,
                    })
                } else {
                    let fwd_path = suffixed(&fwd.path, ".fwd.fastq");
                    let rev_path = suffixed(&rev.path, ".rev.fastq");
                    move_file(&fwd.path, &fwd_path)?;
                    move_file(&rev.path, &rev_path)?;
                    Ok(ConversionResult {
                        fwd: fwd_path,
                        fwd_name: fwd.filename,
                        rev: Some(rev_path),
                        rev_name: rev.filename,
                        original_shape: ReadsShape::Paired,
                        shape: ReadsShape::Paired,
                    })
                }
            }
            LibraryKind::PairedInterleaved(handle) => {
                let file = self.fetch(object, handle)?;
                if request == ConversionRequest::ForceDeinterleaved {
                    let prefix = self.scratch_prefix();
                    let fwd_path = prefix.with_extension("fwd.fastq");
                    let rev_path = prefix.with_extension("rev.fastq");
                    let context = ErrorContext::new()
                        .with_object(object.clone())
                        .with_file(fetched_provenance(handle, &file));
                    deinterleave_file(&file.path, &fwd_path, &rev_path, &context)?;
                    Ok(ConversionResult {
                        fwd: fwd_path,
                        fwd_name: file.filename,
                        rev: Some(rev_path),
                        rev_name: None,
                        original_shape: ReadsShape::Interleaved,
                        shape: ReadsShape::Paired,
                    })
                } else {
                    let path = suffixed(&file.path, ".inter.fastq");
                    move_file(&file.path, &path)?;
                    Ok(ConversionResult {
                        fwd: path,
                        fwd_name: file.filename,
                        rev: None,
                        rev_name: None,
                        original_shape: ReadsShape::Interleaved,
                        shape: ReadsShape::Interleaved,
                    })
                }
            }
        }
    }

    /// Materialize a file and check that everything known about its name
    /// says FASTQ
    fn fetch(&self, object: &ObjectRef, handle: &FileHandle) -> Result<Materialized> {
        let file = self.provider.materialize(handle, &self.scratch)?;
        let declared_type = handle.declared_type.as_deref().filter(|t| !t.is_empty()).map(|t| {
            if t.starts_with('.') {
                t.to_string()
            } else {
                format!(".{t}")
            }
        });

        let candidates = [
            ("Shock file name", file.filename.clone()),
            ("Handle file name from reads Workspace object", handle.declared_filename.clone()),
            ("File type from reads Workspace object", declared_type),
        ];
        let mut checked = false;
        for (what, value) in candidates {
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                continue;
            };
            if !fastq_filename_ok(&value) {
                return Err(ReadsError::InvalidLibrary(format!(
                    "{what} is illegal: {value}. Expected FASTQ file. {}",
                    library_location(object, handle)
                )));
            }
            checked = true;
        }
        if !checked {
            return Err(ReadsError::InvalidLibrary(format!(
                "Unable to determine file type from Shock or Workspace data. {}",
                library_location(object, handle)
            )));
        }

        match &file.filename {
            Some(name) => info!("Filename from store: {}", name),
            None => info!("No filename available from store"),
        }
        Ok(file)
    }

    fn scratch_prefix(&self) -> PathBuf {
        self.scratch.join(Uuid::new_v4().to_string())
    }
}

/// `Reads object {name} ({ref}). Shock node {id}`, leaving out what is unknown
fn library_location(object: &ObjectRef, handle: &FileHandle) -> String {
    let mut out = match &object.name {
        Some(name) => format!("Reads object {name} ({})", object.reference),
        None => format!("Reads object {}", object.reference),
    };
    if let Some(node) = &handle.provenance.shock_node {
        out.push_str(&format!(". Shock node {node}"));
    }
    out
}

fn fetched_provenance(handle: &FileHandle, file: &Materialized) -> FileProvenance {
    let mut provenance = handle.provenance.clone();
    if file.filename.is_some() {
        provenance.shock_filename = file.filename.clone();
    }
    provenance
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    info!("Moving {} to {}", from.display(), to.display());
    fs::rename(from, to)?;
    Ok(())
}
