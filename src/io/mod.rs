//! I/O module: record streams, paired conversion and compression
//!
//! Everything here is single-pass and synchronous. Files are opened at the
//! start of an operation and closed when the owning reader or writer drops,
//! whichever way the operation ends.

pub mod compression;
mod fastq;
mod paired;
pub mod sink;

pub use compression::{decompress_to_path, CompressedReader, CompressedWriter, CompressionFormat, DataSource};
pub use fastq::{RecordReader, RECORD_STRUCTURE_MSG};
pub use paired::{
    deinterleave, deinterleave_file, interleave, interleave_files, PairedRecords, COUNT_MISMATCH_MSG,
    DEINTERLEAVE_MSG,
};
pub use sink::DataSink;

pub(crate) use fastq::is_blank;
