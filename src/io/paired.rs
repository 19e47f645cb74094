//! Paired-end conversion: interleaving and deinterleaving
//!
//! # Overview
//!
//! Paired-end sequencing produces two files (forward and reverse) where
//! records at the same position come from the same DNA fragment. An
//! interleaved file stores the same data in one file, alternating forward
//! and reverse records.
//!
//! - [`PairedRecords`] walks two streams in lockstep and fails when one runs
//!   out before the other.
//! - [`interleave`] writes each forward record followed by its mate.
//! - [`deinterleave`] splits an interleaved stream on an 8-line cycle.
//!
//! Neither direction inspects record content: records are copied byte for
//! byte, so `deinterleave(interleave(F, R)) == (F, R)` for blank-free input.
//!
//! # Example
//!
//! ```
//! use readsutils::context::ErrorContext;
//! use readsutils::io::{deinterleave, interleave};
//! use std::io::Cursor;
//!
//! # fn main() -> readsutils::Result<()> {
//! let fwd = b"@r1/1\nACGT\n+\nIIII\n";
//! let rev = b"@r1/2\nTTGG\n+\nIIII\n";
//!
//! let mut inter = Vec::new();
//! interleave(Cursor::new(&fwd[..]), Cursor::new(&rev[..]), &mut inter, &ErrorContext::new())?;
//!
//! let (mut f, mut r) = (Vec::new(), Vec::new());
//! deinterleave(Cursor::new(&inter[..]), &mut f, &mut r, &ErrorContext::new())?;
//! assert_eq!((f.as_slice(), r.as_slice()), (&fwd[..], &rev[..]));
//! # Ok(())
//! # }
//! ```

use crate::context::{ErrorContext, Side};
use crate::error::{ReadsError, Result};
use crate::io::compression::{CompressedReader, CompressedWriter, DataSource};
use crate::io::fastq::{is_blank, read_kept_line, RecordReader};
use crate::io::DataSink;
use crate::types::FastqRecord;
use log::info;
use std::io::{BufRead, Write};
use std::path::Path;

/// Message for forward/reverse files of different lengths
pub const COUNT_MISMATCH_MSG: &str =
    "Interleave failed - reads files do not have an equal number of records.";

/// Message for interleaved input that does not split into whole pairs
pub const DEINTERLEAVE_MSG: &str = "Deinterleave failed - line count is not divisible by 8.";

/// Lockstep iterator over two record streams
///
/// Yields `(forward, reverse)` pairs. Returns a
/// [`ReadsError::CountMismatch`] naming both files when one stream ends
/// before the other, and each side's read errors carry that side's
/// provenance only.
pub struct PairedRecords<F: BufRead, R: BufRead> {
    forward: RecordReader<F>,
    reverse: RecordReader<R>,
    context: ErrorContext,
    pairs: u64,
    done: bool,
}

impl<F: BufRead, R: BufRead> PairedRecords<F, R> {
    /// Pair two streams; `context` describes the object and both sides
    pub fn new(forward: F, reverse: R, context: ErrorContext) -> Self {
        Self {
            forward: RecordReader::with_context(forward, context.side(Side::Forward)),
            reverse: RecordReader::with_context(reverse, context.side(Side::Reverse)),
            context,
            pairs: 0,
            done: false,
        }
    }

    /// Number of complete pairs read so far
    pub fn pairs_read(&self) -> u64 {
        self.pairs
    }

    fn next_pair(&mut self) -> Result<Option<(FastqRecord, FastqRecord)>> {
        let forward = self.forward.read_record()?;
        let reverse = self.reverse.read_record()?;
        match (forward, reverse) {
            (Some(f), Some(r)) => {
                self.pairs += 1;
                Ok(Some((f, r)))
            }
            (None, None) => Ok(None),
            _ => Err(ReadsError::CountMismatch(self.context.render(COUNT_MISMATCH_MSG))),
        }
    }
}

impl<F: BufRead, R: BufRead> Iterator for PairedRecords<F, R> {
    type Item = Result<(FastqRecord, FastqRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_pair().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Merge two aligned single-end streams into one interleaved stream
///
/// Writes forward record `k` then reverse record `k` for every `k`. Pairs
/// written before a count mismatch stay written; nothing is written for the
/// unmatched record. Returns the number of pairs written.
pub fn interleave<F, R, W>(forward: F, reverse: R, output: &mut W, context: &ErrorContext) -> Result<u64>
where
    F: BufRead,
    R: BufRead,
    W: Write + ?Sized,
{
    let mut pairs = PairedRecords::new(forward, reverse, context.clone());
    for pair in pairs.by_ref() {
        let (f, r) = pair?;
        f.write_to(output)?;
        r.write_to(output)?;
    }
    Ok(pairs.pairs_read())
}

/// Split an interleaved stream into forward and reverse streams
///
/// Non-blank lines 0-3 of every eight go to `forward`, lines 4-7 to
/// `reverse`; blank lines are dropped. Only the total is checked: when the
/// non-blank line count is not a multiple of eight a
/// [`ReadsError::Deinterleave`] is returned after all lines were written.
/// Returns the number of non-blank lines.
pub fn deinterleave<R, F, V>(mut input: R, forward: &mut F, reverse: &mut V, context: &ErrorContext) -> Result<u64>
where
    R: BufRead,
    F: Write + ?Sized,
    V: Write + ?Sized,
{
    let mut line = Vec::with_capacity(256);
    let mut count = 0u64;
    while read_kept_line(&mut input, &mut line, is_blank)? {
        if count % 8 < 4 {
            forward.write_all(&line)?;
        } else {
            reverse.write_all(&line)?;
        }
        count += 1;
    }
    if count % 8 != 0 {
        return Err(ReadsError::Deinterleave(context.render(DEINTERLEAVE_MSG)));
    }
    Ok(count)
}

/// Interleave two files into `target`
///
/// Inputs may be gzip/bzip2 compressed. The target is created (or
/// truncated) and flushed before returning; all files are closed on every
/// path.
pub fn interleave_files(forward: &Path, reverse: &Path, target: &Path, context: &ErrorContext) -> Result<u64> {
    info!(
        "Interleaving files {} and {} to {}",
        forward.display(),
        reverse.display(),
        target.display()
    );
    let f = CompressedReader::new(DataSource::from_path(forward))?;
    let r = CompressedReader::new(DataSource::from_path(reverse))?;
    let mut out = CompressedWriter::new(DataSink::from_path(target))?;
    let pairs = interleave(f, r, &mut out, context)?;
    out.finish()?;
    Ok(pairs)
}

/// Deinterleave `source` into `forward` and `reverse` files
pub fn deinterleave_file(source: &Path, forward: &Path, reverse: &Path, context: &ErrorContext) -> Result<u64> {
    info!(
        "Deinterleaving file {} to files {} and {}",
        source.display(),
        forward.display(),
        reverse.display()
    );
    let input = CompressedReader::new(DataSource::from_path(source))?;
    let mut f = CompressedWriter::new(DataSink::from_path(forward))?;
    let mut r = CompressedWriter::new(DataSink::from_path(reverse))?;
    let lines = deinterleave(input, &mut f, &mut r, context)?;
    f.finish()?;
    r.finish()?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FileProvenance, ObjectRef};
    use std::io::Cursor;

    fn create_test_fastq(records: usize, mate: u8) -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..records {
            data.extend_from_slice(format!("@read_{i}/{mate}\nACGT\n+\nIIII\n").as_bytes());
        }
        data
    }

    fn paired_context() -> ErrorContext {
        ErrorContext::new()
            .with_object(ObjectRef::new("1/2/3").with_name("fr_missing_rec"))
            .with_side(Side::Forward, FileProvenance::new().with_shock_node("f1").with_shock_filename("fwd.fq"))
            .with_side(Side::Reverse, FileProvenance::new().with_shock_node("r1").with_shock_filename("rev.fq"))
    }

    #[test]
    fn test_paired_basic() {
        let mut paired = PairedRecords::new(
            Cursor::new(create_test_fastq(3, 1)),
            Cursor::new(create_test_fastq(3, 2)),
            ErrorContext::new(),
        );
        let pairs: Result<Vec<_>> = paired.by_ref().collect();
        let pairs = pairs.unwrap();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[1].0.header(), b"@read_1/1");
        assert_eq!(pairs[1].1.header(), b"@read_1/2");
        assert_eq!(paired.pairs_read(), 3);
    }

    #[test]
    fn test_paired_empty() {
        let paired = PairedRecords::new(Cursor::new(Vec::new()), Cursor::new(Vec::new()), ErrorContext::new());
        assert_eq!(paired.count(), 0);
    }

    #[test]
    fn test_paired_mismatch_stops_iteration() {
        let paired = PairedRecords::new(
            Cursor::new(create_test_fastq(3, 1)),
            Cursor::new(create_test_fastq(2, 2)),
            ErrorContext::new(),
        );
        let results: Vec<_> = paired.collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(ReadsError::CountMismatch(_))));
    }

    #[test]
    fn test_interleave_layout() {
        let fwd = create_test_fastq(4, 1);
        let rev = create_test_fastq(4, 2);
        let mut out = Vec::new();
        let pairs = interleave(Cursor::new(fwd), Cursor::new(rev), &mut out, &ErrorContext::new()).unwrap();
        assert_eq!(pairs, 4);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 32);
        for k in 0..4 {
            assert_eq!(lines[8 * k], format!("@read_{k}/1"));
            assert_eq!(lines[8 * k + 4], format!("@read_{k}/2"));
        }
    }

    #[test]
    fn test_interleave_mismatch_message() {
        let mut out = Vec::new();
        let err = interleave(
            Cursor::new(create_test_fastq(5, 1)),
            Cursor::new(create_test_fastq(4, 2)),
            &mut out,
            &paired_context(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Interleave failed - reads files do not have an equal number of records. \
             Workspace reads object fr_missing_rec (1/2/3), \
             Forward Shock node f1, Forward Shock filename fwd.fq, \
             Reverse Shock node r1, Reverse Shock filename rev.fq."
        );
        // four complete pairs, no fifth forward record
        assert_eq!(out, {
            let mut expected = Vec::new();
            interleave(
                Cursor::new(create_test_fastq(4, 1)),
                Cursor::new(create_test_fastq(4, 2)),
                &mut expected,
                &ErrorContext::new(),
            )
            .unwrap();
            expected
        });
    }

    #[test]
    fn test_interleave_record_error_names_one_side() {
        let mut out = Vec::new();
        let err = interleave(
            Cursor::new(create_test_fastq(2, 1)),
            Cursor::new(b"@read_0/2\nACGT\n+\nIIII\n@read_1/2\nACGT\n".to_vec()),
            &mut out,
            &paired_context(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Reading FASTQ record failed - non-blank lines are not a multiple of four. \
             Workspace reads object fr_missing_rec (1/2/3), Shock node r1, Shock filename rev.fq."
        );
    }

    #[test]
    fn test_deinterleave_basic() {
        let mut inter = Vec::new();
        interleave(
            Cursor::new(create_test_fastq(3, 1)),
            Cursor::new(create_test_fastq(3, 2)),
            &mut inter,
            &ErrorContext::new(),
        )
        .unwrap();
        let (mut f, mut r) = (Vec::new(), Vec::new());
        let lines = deinterleave(Cursor::new(inter), &mut f, &mut r, &ErrorContext::new()).unwrap();
        assert_eq!(lines, 24);
        assert_eq!(f, create_test_fastq(3, 1));
        assert_eq!(r, create_test_fastq(3, 2));
    }

    #[test]
    fn test_deinterleave_drops_blank_lines() {
        let data = b"\n@a/1\nAC\n+\n\nII\n@a/2\nGG\n+\nII\n\n\n";
        let (mut f, mut r) = (Vec::new(), Vec::new());
        deinterleave(Cursor::new(&data[..]), &mut f, &mut r, &ErrorContext::new()).unwrap();
        assert_eq!(f, b"@a/1\nAC\n+\nII\n");
        assert_eq!(r, b"@a/2\nGG\n+\nII\n");
    }

    #[test]
    fn test_deinterleave_not_divisible() {
        // five records, 20 lines
        let data = create_test_fastq(5, 1);
        let context = ErrorContext::new()
            .with_object(ObjectRef::new("1/2/3").with_name("int_miss_line"))
            .with_file(
                FileProvenance::new()
                    .with_shock_node("n1")
                    .with_shock_filename("Sample5_interleaved_missing_line.fastq"),
            );
        let (mut f, mut r) = (Vec::new(), Vec::new());
        let err = deinterleave(Cursor::new(data), &mut f, &mut r, &context).unwrap_err();
        assert!(matches!(err, ReadsError::Deinterleave(_)));
        assert_eq!(
            err.to_string(),
            "Deinterleave failed - line count is not divisible by 8. \
             Workspace reads object int_miss_line (1/2/3), Shock node n1, \
             Shock filename Sample5_interleaved_missing_line.fastq."
        );
    }

    use proptest::prelude::*;

    fn arb_records(max: usize) -> impl Strategy<Value = Vec<(String, String)>> {
        proptest::collection::vec(("[A-Za-z0-9_:]{1,20}", "[ACGTN]{1,60}"), 0..max)
    }

    fn render(records: &[(String, String)]) -> Vec<u8> {
        let mut out = Vec::new();
        for (id, seq) in records {
            out.extend_from_slice(format!("@{id}\n{seq}\n+\n{}\n", "I".repeat(seq.len())).as_bytes());
        }
        out
    }

    /// Insert `blanks[i]` empty lines before line `i`, and some after the last
    fn with_blank_lines(data: &[u8], blanks: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        for (i, line) in data.split_inclusive(|&b| b == b'\n').enumerate() {
            for k in 0..blanks[i % blanks.len()] {
                out.extend_from_slice(if k % 2 == 0 { &b"\n"[..] } else { &b"\r\n"[..] });
            }
            out.extend_from_slice(line);
        }
        for _ in 0..blanks[0] {
            out.push(b'\n');
        }
        out
    }

    proptest! {
        /// Empty lines anywhere in either input, inside records included,
        /// leave the interleaved output unchanged
        #[test]
        fn test_interleave_ignores_blank_lines(
            pairs in proptest::collection::vec(
                (("[A-Za-z0-9_]{1,20}", "[ACGT]{1,50}"), ("[A-Za-z0-9_]{1,20}", "[ACGT]{1,50}")),
                0..12,
            ),
            fwd_blanks in proptest::collection::vec(0..3u8, 1..50),
            rev_blanks in proptest::collection::vec(0..3u8, 1..50),
        ) {
            let fwd: Vec<_> = pairs.iter().map(|(f, _)| f.clone()).collect();
            let rev: Vec<_> = pairs.iter().map(|(_, r)| r.clone()).collect();
            let (fwd, rev) = (render(&fwd), render(&rev));

            let mut clean = Vec::new();
            let clean_pairs = interleave(
                Cursor::new(fwd.clone()),
                Cursor::new(rev.clone()),
                &mut clean,
                &ErrorContext::new(),
            ).unwrap();

            let mut noisy = Vec::new();
            let noisy_pairs = interleave(
                Cursor::new(with_blank_lines(&fwd, &fwd_blanks)),
                Cursor::new(with_blank_lines(&rev, &rev_blanks)),
                &mut noisy,
                &ErrorContext::new(),
            ).unwrap();

            prop_assert_eq!(clean_pairs, pairs.len() as u64);
            prop_assert_eq!(noisy_pairs, clean_pairs);
            prop_assert_eq!(noisy, clean);
        }

        /// deinterleave(interleave(F, R)) == (F, R) byte for byte
        #[test]
        fn test_round_trip(pairs in proptest::collection::vec(
            (("[A-Za-z0-9_]{1,20}", "[ACGT]{1,50}"), ("[A-Za-z0-9_]{1,20}", "[ACGT]{1,50}")),
            0..20,
        )) {
            let fwd: Vec<_> = pairs.iter().map(|(f, _)| f.clone()).collect();
            let rev: Vec<_> = pairs.iter().map(|(_, r)| r.clone()).collect();
            let (fwd, rev) = (render(&fwd), render(&rev));

            let mut inter = Vec::new();
            interleave(Cursor::new(fwd.clone()), Cursor::new(rev.clone()), &mut inter, &ErrorContext::new()).unwrap();
            let (mut f, mut r) = (Vec::new(), Vec::new());
            deinterleave(Cursor::new(inter), &mut f, &mut r, &ErrorContext::new()).unwrap();
            prop_assert_eq!(f, fwd);
            prop_assert_eq!(r, rev);
        }

        /// interleave fails iff the record counts differ
        #[test]
        fn test_count_mismatch_detection(fwd in arb_records(8), rev in arb_records(8)) {
            let mut out = Vec::new();
            let result = interleave(
                Cursor::new(render(&fwd)),
                Cursor::new(render(&rev)),
                &mut out,
                &ErrorContext::new(),
            );
            if fwd.len() == rev.len() {
                prop_assert_eq!(result.unwrap(), fwd.len() as u64);
            } else {
                prop_assert!(matches!(result, Err(ReadsError::CountMismatch(_))));
            }
        }

        /// deinterleave fails iff the non-blank line count is not a multiple of 8
        #[test]
        fn test_divisibility(lines in 0..60usize, blanks in proptest::collection::vec(any::<bool>(), 60)) {
            let mut data = Vec::new();
            for i in 0..lines {
                if blanks[i] {
                    data.push(b'\n');
                }
                data.extend_from_slice(format!("line{i}\n").as_bytes());
            }
            let (mut f, mut r) = (Vec::new(), Vec::new());
            let result = deinterleave(Cursor::new(data), &mut f, &mut r, &ErrorContext::new());
            if lines % 8 == 0 {
                prop_assert_eq!(result.unwrap(), lines as u64);
            } else {
                prop_assert!(matches!(result, Err(ReadsError::Deinterleave(_))));
            }
        }
    }
}
