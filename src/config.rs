//! Runtime configuration
//!
//! Loaded from a JSON file; any key left out takes its default.
//!
//! ```json
//! {
//!   "scratch": "/kb/module/work/tmp",
//!   "fastq_validator": "fastQValidator",
//!   "fastq_max_errors": 10,
//!   "fasta_validator": ["java", "-classpath", "/opt/lib/FastaValidator-1.0.jar", "FVTester"]
//! }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Default FASTQ syntax checker executable
pub const DEFAULT_FASTQ_VALIDATOR: &str = "fastQValidator";

/// Default error threshold passed to the FASTQ syntax checker
pub const DEFAULT_FASTQ_MAX_ERRORS: u32 = 10;

/// Default FASTA checker JAR
pub const DEFAULT_FASTA_JAR: &str = "/opt/lib/FastaValidator-1.0.jar";

/// Settings shared by validation and conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory for materialized and converted files
    pub scratch: PathBuf,
    /// FASTQ syntax checker executable
    pub fastq_validator: String,
    /// `--maxErrors` value for the FASTQ syntax checker
    pub fastq_max_errors: u32,
    /// FASTA checker command line, program first; the file path is appended
    pub fasta_validator: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scratch: std::env::temp_dir(),
            fastq_validator: DEFAULT_FASTQ_VALIDATOR.to_string(),
            fastq_max_errors: DEFAULT_FASTQ_MAX_ERRORS,
            fasta_validator: vec![
                "java".to_string(),
                "-classpath".to_string(),
                DEFAULT_FASTA_JAR.to_string(),
                "FVTester".to_string(),
            ],
        }
    }
}

impl Config {
    /// Defaults with a specific scratch directory
    pub fn with_scratch<P: AsRef<Path>>(scratch: P) -> Self {
        Self {
            scratch: scratch.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
