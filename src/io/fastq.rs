//! FASTQ record reader
//!
//! Records are read as four non-blank lines. Empty lines (nothing but a
//! `\n` or `\r\n` terminator) anywhere in the stream are skipped and never
//! count towards a record, so files with stray empty lines between (or
//! inside) records still line up. A line of spaces is record content. Running
//! out of input part way through a record is a structural error naming the
//! file's provenance.
//!
//! # Example
//!
//! ```
//! use readsutils::io::RecordReader;
//! use std::io::Cursor;
//!
//! # fn main() -> readsutils::Result<()> {
//! let data = b"@r1\nACGT\n+\nIIII\n\n@r2\nGGCC\n+\nIIII\n";
//! let mut reader = RecordReader::new(Cursor::new(&data[..]));
//!
//! let first = reader.read_record()?.unwrap();
//! assert_eq!(first.header(), b"@r1");
//! assert!(reader.read_record()?.is_some());
//! assert!(reader.read_record()?.is_none());
//! # Ok(())
//! # }
//! ```

use crate::context::ErrorContext;
use crate::error::{ReadsError, Result};
use crate::io::compression::{CompressedReader, DataSource};
use crate::types::FastqRecord;
use std::io::{self, BufRead};
use std::path::Path;

/// Message for a record cut short by EOF
pub const RECORD_STRUCTURE_MSG: &str =
    "Reading FASTQ record failed - non-blank lines are not a multiple of four.";

/// Whether a line holds nothing but whitespace and its terminator
///
/// Line-oriented passes (deinterleaving, validation) drop these.
pub(crate) fn is_blank(line: &[u8]) -> bool {
    line.iter().all(|b| b.is_ascii_whitespace())
}

/// Whether a line is a bare terminator
///
/// The record reader skips only these.
pub(crate) fn is_empty_line(line: &[u8]) -> bool {
    line == b"\n" || line == b"\r\n"
}

/// Read the next line `skip` does not reject into `buf`
///
/// The line always ends in `\n` (one is added to an unterminated final line).
/// Returns `false` at EOF.
pub(crate) fn read_kept_line<R: BufRead + ?Sized>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    skip: fn(&[u8]) -> bool,
) -> io::Result<bool> {
    loop {
        buf.clear();
        if reader.read_until(b'\n', buf)? == 0 {
            return Ok(false);
        }
        if skip(buf) {
            continue;
        }
        if !buf.ends_with(b"\n") {
            buf.push(b'\n');
        }
        return Ok(true);
    }
}

/// Reads FASTQ records one at a time from a buffered stream
pub struct RecordReader<R: BufRead> {
    reader: R,
    context: ErrorContext,
    line: Vec<u8>,
    records_read: u64,
}

impl<R: BufRead> RecordReader<R> {
    /// Create a reader with no provenance attached
    pub fn new(reader: R) -> Self {
        Self::with_context(reader, ErrorContext::new())
    }

    /// Create a reader whose errors are annotated with `context`
    pub fn with_context(reader: R, context: ErrorContext) -> Self {
        Self {
            reader,
            context,
            line: Vec::with_capacity(256),
            records_read: 0,
        }
    }

    /// Number of complete records read so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Provenance used for this reader's errors
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Read one record
    ///
    /// Returns `Ok(None)` at a clean end of stream and
    /// [`ReadsError::RecordStructure`] if the stream ends after one to three
    /// lines of a record.
    pub fn read_record(&mut self) -> Result<Option<FastqRecord>> {
        let mut block = Vec::with_capacity(512);
        let mut line_ends = [0usize; 4];

        for (i, end) in line_ends.iter_mut().enumerate() {
            if !read_kept_line(&mut self.reader, &mut self.line, is_empty_line)? {
                if i == 0 {
                    return Ok(None);
                }
                return Err(ReadsError::RecordStructure(self.context.render(RECORD_STRUCTURE_MSG)));
            }
            block.extend_from_slice(&self.line);
            *end = block.len();
        }

        self.records_read += 1;
        Ok(Some(FastqRecord::from_block(block, line_ends)))
    }
}

impl RecordReader<CompressedReader> {
    /// Open a (possibly compressed) FASTQ file
    pub fn from_path<P: AsRef<Path>>(path: P, context: ErrorContext) -> Result<Self> {
        let reader = CompressedReader::new(DataSource::from_path(path))?;
        Ok(Self::with_context(reader, context))
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<FastqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FileProvenance;
    use std::io::Cursor;

    fn reader(data: &[u8]) -> RecordReader<Cursor<Vec<u8>>> {
        RecordReader::new(Cursor::new(data.to_vec()))
    }

    #[test]
    fn test_read_single_record() {
        let mut stream = reader(b"@SEQ_ID\nGATTACA\n+\n!!!!!!!\n");
        let record = stream.read_record().unwrap().unwrap();
        assert_eq!(record.as_bytes(), b"@SEQ_ID\nGATTACA\n+\n!!!!!!!\n");
        assert!(stream.read_record().unwrap().is_none());
        assert_eq!(stream.records_read(), 1);
    }

    #[test]
    fn test_empty_stream_is_clean_end() {
        assert!(reader(b"").read_record().unwrap().is_none());
        assert!(reader(b"\n\n\n").read_record().unwrap().is_none());
    }

    #[test]
    fn test_blank_lines_skipped() {
        let data = b"\n@r1\n\nACGT\n+\n\r\nIIII\n\n\n@r2\nAC\n+\nII\n\n";
        let records: Vec<_> = reader(data).collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].as_bytes(), b"@r1\nACGT\n+\nIIII\n");
        assert_eq!(records[1].as_bytes(), b"@r2\nAC\n+\nII\n");
    }

    #[test]
    fn test_whitespace_line_is_record_content() {
        let mut stream = reader(b"@r1\n  \n+\n  \n");
        let record = stream.read_record().unwrap().unwrap();
        assert_eq!(record.sequence(), b"  ");
        assert_eq!(record.quality(), b"  ");
        assert!(stream.read_record().unwrap().is_none());

        let spaced_separator = reader(b"@r1\nACGT\n \nIIII\n").read_record().unwrap().unwrap();
        assert_eq!(spaced_separator.line(2), b" ");
        assert!(is_empty_line(b"\r\n"));
        assert!(!is_empty_line(b" \n"));
        assert!(is_blank(b" \t\r\n"));
    }

    #[test]
    fn test_unterminated_last_line() {
        let mut stream = reader(b"@r1\nACGT\n+\nIIII");
        let record = stream.read_record().unwrap().unwrap();
        assert_eq!(record.as_bytes(), b"@r1\nACGT\n+\nIIII\n");
    }

    #[test]
    fn test_truncated_record_is_fatal() {
        for data in [&b"@r1\n"[..], &b"@r1\nACGT\n"[..], &b"@r1\nACGT\n+\n\n"[..]] {
            let err = reader(data).read_record().unwrap_err();
            match err {
                ReadsError::RecordStructure(msg) => assert_eq!(msg, RECORD_STRUCTURE_MSG),
                other => panic!("Expected RecordStructure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_truncated_record_names_provenance() {
        let context = ErrorContext::new().with_file(
            FileProvenance::new()
                .with_shock_node("node1")
                .with_shock_filename("missing_line.fastq"),
        );
        let mut stream = RecordReader::with_context(Cursor::new(b"@r1\nAC\n+\nII\n@r2\nAC\n".to_vec()), context);
        assert!(stream.read_record().unwrap().is_some());
        let err = stream.read_record().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Reading FASTQ record failed - non-blank lines are not a multiple of four. \
             Shock node node1, Shock filename missing_line.fastq."
        );
    }

    use proptest::prelude::*;

    proptest! {
        /// Blank lines inserted anywhere never change the records read
        #[test]
        fn test_blank_line_tolerance(
            count in 0..10usize,
            blanks in proptest::collection::vec(0..3usize, 40),
        ) {
            let mut clean = Vec::new();
            let mut noisy = Vec::new();
            for i in 0..count {
                let lines = [format!("@read_{i}"), "ACGT".repeat(i + 1), "+".to_string(), "I".repeat(4 * (i + 1))];
                for (j, line) in lines.iter().enumerate() {
                    clean.extend_from_slice(line.as_bytes());
                    clean.push(b'\n');
                    for _ in 0..blanks[(i * 4 + j) % blanks.len()] {
                        noisy.push(b'\n');
                    }
                    noisy.extend_from_slice(line.as_bytes());
                    noisy.push(b'\n');
                }
            }
            let a: Vec<_> = reader(&clean).collect::<Result<Vec<_>>>().unwrap();
            let b: Vec<_> = reader(&noisy).collect::<Result<Vec<_>>>().unwrap();
            prop_assert_eq!(a.len(), count);
            prop_assert_eq!(a, b);
        }

        /// A line count that is not a multiple of four always fails
        #[test]
        fn test_partial_record_detected(records in 0..5usize, extra in 1..4usize) {
            let mut data = Vec::new();
            for i in 0..(records * 4 + extra) {
                data.extend_from_slice(format!("line{i}\n").as_bytes());
            }
            let result: Result<Vec<_>> = reader(&data).collect();
            prop_assert!(matches!(result, Err(ReadsError::RecordStructure(_))));
        }
    }
}
