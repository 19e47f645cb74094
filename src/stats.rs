//! Per-file read statistics
//!
//! Computed in a single pass over the records: read and base counts, read
//! length mean and standard deviation, quality score summary, duplicate
//! sequences and base composition.
//!
//! Quality scores are decoded with a Phred offset detected from the data:
//! 64 when every quality character is at least `@` (64) and at least one is
//! above `J` (74), which Phred+33 data cannot produce; 33 otherwise.
//!
//! # Example
//!
//! ```
//! use readsutils::stats::ReadStatistics;
//! use std::io::Cursor;
//!
//! # fn main() -> readsutils::Result<()> {
//! let data = b"@r1\nACGT\n+\nIIII\n@r2\nGGCC\n+\n!!!!\n";
//! let stats = ReadStatistics::from_reader(Cursor::new(&data[..]))?;
//!
//! assert_eq!(stats.read_count, 2);
//! assert_eq!(stats.total_bases, 8);
//! assert_eq!(stats.phred_type, "33");
//! assert!((stats.gc_content - 0.75).abs() < 1e-9);
//! # Ok(())
//! # }
//! ```

use crate::context::{ErrorContext, FileProvenance};
use crate::error::Result;
use crate::io::RecordReader;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;
use std::path::Path;

/// Lowest quality byte that rules out Phred+33 when it is the minimum
const PHRED64_FLOOR: u8 = 64;

/// Phred+64 data must contain at least one quality above this byte
const PHRED64_MARKER: u8 = 74;

/// Summary statistics for one reads file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadStatistics {
    /// Number of records
    pub read_count: u64,
    /// Sum of all sequence lengths
    pub total_bases: u64,
    /// Mean sequence length
    pub read_length_mean: f64,
    /// Sample standard deviation of sequence length
    pub read_length_stdev: f64,
    /// `"33"` or `"64"`
    pub phred_type: String,
    /// Records whose sequence already occurred earlier in the file
    pub number_of_duplicates: u64,
    /// Lowest decoded quality score
    pub qual_min: f64,
    /// Highest decoded quality score
    pub qual_max: f64,
    /// Mean decoded quality score
    pub qual_mean: f64,
    /// Sample standard deviation of decoded quality scores
    pub qual_stdev: f64,
    /// Percentage of all bases taken by each (upper-cased) base letter
    pub base_percentages: BTreeMap<String, f64>,
    /// Fraction of bases that are G or C
    pub gc_content: f64,
}

/// Running mean and variance (Welford)
#[derive(Debug, Default)]
struct Moments {
    n: u64,
    mean: f64,
    m2: f64,
}

impl Moments {
    fn push(&mut self, x: f64) {
        self.push_weighted(x, 1);
    }

    /// Add `count` observations of `x`
    fn push_weighted(&mut self, x: f64, count: u64) {
        if count == 0 {
            return;
        }
        let n_a = self.n as f64;
        let n_b = count as f64;
        let n = n_a + n_b;
        let delta = x - self.mean;
        self.mean += delta * n_b / n;
        self.m2 += delta * delta * n_a * n_b / n;
        self.n += count;
    }

    fn sample_stdev(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            (self.m2 / (self.n - 1) as f64).sqrt()
        }
    }
}

impl ReadStatistics {
    /// Compute statistics for a (possibly compressed) FASTQ file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let context = ErrorContext::new().with_file(FileProvenance::new().with_local_path(path));
        let reader = RecordReader::from_path(path, context)?;
        Self::from_records(reader)
    }

    /// Compute statistics for an uncompressed FASTQ stream
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        Self::from_records(RecordReader::new(reader))
    }

    fn from_records<R: BufRead>(mut reader: RecordReader<R>) -> Result<Self> {
        let mut lengths = Moments::default();
        let mut base_counts = [0u64; 256];
        let mut qual_counts = [0u64; 256];
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        let mut duplicates = 0u64;

        while let Some(record) = reader.read_record()? {
            let sequence = record.sequence();
            lengths.push(sequence.len() as f64);
            for &base in sequence {
                base_counts[base.to_ascii_uppercase() as usize] += 1;
            }
            for &q in record.quality() {
                qual_counts[q as usize] += 1;
            }
            if !seen.insert(sequence.to_vec()) {
                duplicates += 1;
            }
        }

        let total_bases: u64 = base_counts.iter().sum();
        let base_percentages: BTreeMap<String, f64> = base_counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(base, count)| {
                let letter = (base as u8 as char).to_string();
                (letter, 100.0 * *count as f64 / total_bases as f64)
            })
            .collect();
        let gc_content = (base_percentages.get("G").copied().unwrap_or(0.0)
            + base_percentages.get("C").copied().unwrap_or(0.0))
            / 100.0;

        let offset = detect_phred_offset(&qual_counts);
        let mut quals = Moments::default();
        let mut qual_min = None;
        let mut qual_max = None;
        for (byte, &count) in qual_counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let score = byte as f64 - offset as f64;
            qual_min.get_or_insert(score);
            qual_max = Some(score);
            quals.push_weighted(score, count);
        }

        Ok(Self {
            read_count: reader.records_read(),
            total_bases,
            read_length_mean: lengths.mean,
            read_length_stdev: lengths.sample_stdev(),
            phred_type: offset.to_string(),
            number_of_duplicates: duplicates,
            qual_min: qual_min.unwrap_or(0.0),
            qual_max: qual_max.unwrap_or(0.0),
            qual_mean: quals.mean,
            qual_stdev: quals.sample_stdev(),
            base_percentages,
            gc_content,
        })
    }
}

/// Phred offset implied by a histogram of quality bytes
fn detect_phred_offset(qual_counts: &[u64; 256]) -> u8 {
    let present = |b: &usize| qual_counts[*b] > 0;
    let min = (0..256).find(present);
    let max = (0..256).rev().find(present);
    match (min, max) {
        (Some(min), Some(max)) if min >= PHRED64_FLOOR as usize && max > PHRED64_MARKER as usize => 64,
        _ => 33,
    }
}
