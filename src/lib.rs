//! readsutils: FASTQ validation and paired/interleaved conversion
//!
//! # Overview
//!
//! readsutils moves sequencing reads files in and out of a data store. It
//! reads FASTQ as a stream of 4-line records, checks files for structural
//! problems, and converts losslessly between paired (forward + reverse
//! files) and interleaved (one file, alternating mates) layouts while keeping
//! exact record correspondence.
//!
//! ## Key Features
//!
//! - **Streaming**: single pass, one record in memory at a time
//! - **Tolerant parsing**: blank lines anywhere are skipped
//! - **Provenance-aware errors**: failures name the workspace object, shock
//!   node, staging file, URL or path they came from
//! - **Transparent compression**: gzip and bzip2 inputs are detected by
//!   content
//!
//! ## Quick Start
//!
//! ```no_run
//! use readsutils::io::interleave_files;
//! use readsutils::context::ErrorContext;
//! use std::path::Path;
//!
//! # fn main() -> readsutils::Result<()> {
//! let pairs = interleave_files(
//!     Path::new("reads_1.fq.gz"),
//!     Path::new("reads_2.fq.gz"),
//!     Path::new("reads.inter.fastq"),
//!     &ErrorContext::new(),
//! )?;
//! println!("{pairs} pairs written");
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`io`]: record reader, interleave/deinterleave, compression
//! - [`validate`]: FASTQ and FASTA validation
//! - [`convert`]: read library conversion to a requested layout
//! - [`upload`]: interleaving, validation and statistics before upload
//! - [`stats`]: per-file read statistics
//! - [`context`]: provenance-aware error messages
//! - [`config`]: runtime configuration

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod io;
pub mod stats;
pub mod types;
pub mod upload;
pub mod validate;

// Re-export commonly used types
pub use config::Config;
pub use context::{ErrorContext, FileProvenance, ObjectRef};
pub use convert::{
    ConversionRequest, ConversionResult, DownloadedLibrary, LibraryMetadata, ReadLibrary, ReadsConverter, ReadsProvider,
};
pub use error::{ReadsError, Result};
pub use io::{PairedRecords, RecordReader};
pub use stats::ReadStatistics;
pub use types::{FastqRecord, ReadsShape, Ternary};
pub use upload::{UploadMetadata, UploadParams, UploadPreparer, UploadRequest};
pub use validate::{FastaValidator, FastqValidator, ValidationOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
