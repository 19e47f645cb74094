//! Error types for readsutils

use thiserror::Error;

/// Result type alias for readsutils operations
pub type Result<T> = std::result::Result<T, ReadsError>;

/// Error types that can occur in readsutils
///
/// Input errors carry the offending path or value. Structural errors carry a
/// fully rendered diagnostic built by [`ErrorContext`](crate::context::ErrorContext),
/// so their `Display` output is exactly that message.
#[derive(Debug, Error)]
pub enum ReadsError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input file does not exist (or no path was given)
    #[error("No such file: {0}")]
    NoSuchFile(String),

    /// Input file does not carry a FASTQ extension
    #[error("File {0} is not a FASTQ file")]
    NotFastq(String),

    /// Input file does not carry a FASTA extension
    #[error("File {0} is not a FASTA file")]
    NotFasta(String),

    /// A ternary parameter was neither "true", "false" nor null
    #[error("Illegal value for ternary parameter {name}: {value}. Allowed values are \"true\", \"false\", and null.")]
    InvalidTernary {
        /// Parameter name
        name: String,
        /// Rejected value
        value: String,
    },

    /// A request parameter was missing or malformed
    #[error("{0}")]
    InvalidParameter(String),

    /// A read library description could not be used (bad type, bad file name)
    #[error("{0}")]
    InvalidLibrary(String),

    /// EOF was reached part way through a 4-line record
    #[error("{0}")]
    RecordStructure(String),

    /// Forward and reverse files hold different numbers of records
    #[error("{0}")]
    CountMismatch(String),

    /// Interleaved file line count is not a multiple of eight
    #[error("{0}")]
    Deinterleave(String),

    /// A file prepared for upload failed validation
    #[error("{0}")]
    InvalidFastq(String),

    /// Compression/decompression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// The external syntax checker could not be started
    #[error("Failed to run syntax checker {program}: {source}")]
    Checker {
        /// Program that failed to start
        program: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}
