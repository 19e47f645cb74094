//! Output destinations for streaming writes
//!
//! `DataSink` is the write counterpart to `DataSource`. The compression of
//! the output follows from the file extension.
//!
//! # Example
//!
//! ```no_run
//! use readsutils::io::{CompressionFormat, DataSink};
//!
//! let sink = DataSink::from_path("output.inter.fastq.gz");
//! assert_eq!(sink.compression(), CompressionFormat::Gzip);
//! ```

use crate::io::compression::CompressionFormat;
use std::path::{Path, PathBuf};

/// Local file a writer streams into
///
/// `.gz`/`.gzip` paths are gzip compressed, `.bz`/`.bzip`/`.bz2`/`.bzip2`
/// paths bzip2 compressed, anything else is plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSink {
    path: PathBuf,
}

impl DataSink {
    /// Create a sink from a file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path written to
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|s| s.to_str())
    }

    /// Compression implied by the sink's extension
    pub fn compression(&self) -> CompressionFormat {
        match self.extension() {
            Some("gz") | Some("gzip") => CompressionFormat::Gzip,
            Some("bz") | Some("bzip") | Some("bz2") | Some("bzip2") => CompressionFormat::Bzip2,
            _ => CompressionFormat::None,
        }
    }
}
