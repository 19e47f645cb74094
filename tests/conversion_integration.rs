//! Integration tests for paired/interleaved conversion
//!
//! These run the file-level entry points end to end: compressed inputs,
//! interleave then deinterleave, and the diagnostics produced when the two
//! sides of a pair disagree.

use readsutils::context::{ErrorContext, FileProvenance, ObjectRef, Side};
use readsutils::convert::{FileHandle, LibraryKind, LocalProvider, ReadLibrary, ReadsConverter};
use readsutils::io::{deinterleave_file, interleave_files, CompressedWriter, DataSink, RecordReader};
use readsutils::{Config, ConversionRequest, ReadsError, ReadsShape, Ternary};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fastq(records: usize, mate: u8) -> String {
    (0..records)
        .map(|i| format!("@read_{i}/{mate}\nACGTACGT\n+\nIIIIIIII\n"))
        .collect()
}

fn write_plain(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn write_compressed(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    let mut writer = CompressedWriter::new(DataSink::from_path(&path)).unwrap();
    writer.write_all(content.as_bytes()).unwrap();
    writer.finish().unwrap();
    path
}

/// Interleave compressed inputs, deinterleave the result, get the inputs back
#[test]
fn test_interleave_deinterleave_round_trip() {
    let dir = TempDir::new().unwrap();
    let fwd_text = fastq(25, 1);
    let rev_text = fastq(25, 2);
    let fwd = write_compressed(dir.path(), "r_1.fq.gz", &fwd_text);
    let rev = write_compressed(dir.path(), "r_2.fq.bz2", &rev_text);
    let inter = dir.path().join("r.inter.fastq");

    let pairs = interleave_files(&fwd, &rev, &inter, &ErrorContext::new()).unwrap();
    assert_eq!(pairs, 25);

    let back_fwd = dir.path().join("back.fwd.fastq");
    let back_rev = dir.path().join("back.rev.fastq");
    let lines = deinterleave_file(&inter, &back_fwd, &back_rev, &ErrorContext::new()).unwrap();
    assert_eq!(lines, 200);

    assert_eq!(fs::read_to_string(&back_fwd).unwrap(), fwd_text);
    assert_eq!(fs::read_to_string(&back_rev).unwrap(), rev_text);
}

/// Interleaved output alternates mates record by record
#[test]
fn test_interleaved_layout() {
    let dir = TempDir::new().unwrap();
    let fwd = write_plain(dir.path(), "f.fq", &fastq(3, 1));
    let rev = write_plain(dir.path(), "r.fq", &fastq(3, 2));
    let inter = dir.path().join("out.fq.gz");
    interleave_files(&fwd, &rev, &inter, &ErrorContext::new()).unwrap();

    let headers: Vec<String> = RecordReader::from_path(&inter, ErrorContext::new())
        .unwrap()
        .map(|r| String::from_utf8(r.unwrap().header().to_vec()).unwrap())
        .collect();
    assert_eq!(
        headers,
        vec!["@read_0/1", "@read_0/2", "@read_1/1", "@read_1/2", "@read_2/1", "@read_2/2"]
    );
}

/// A short reverse file fails with both sides named; matched pairs stay written
#[test]
fn test_count_mismatch_diagnostic() {
    let dir = TempDir::new().unwrap();
    let fwd = write_plain(dir.path(), "f.fq", &fastq(5, 1));
    let rev = write_plain(dir.path(), "r.fq", &fastq(4, 2));
    let inter = dir.path().join("out.fastq");
    let context = ErrorContext::new()
        .with_object(ObjectRef::new("7/8/9").with_name("fr_missing_rec"))
        .with_side(Side::Forward, FileProvenance::new().with_shock_node("node_f").with_shock_filename("f.fq"))
        .with_side(Side::Reverse, FileProvenance::new().with_shock_node("node_r").with_shock_filename("r.fq"));

    let err = interleave_files(&fwd, &rev, &inter, &context).unwrap_err();
    assert!(matches!(err, ReadsError::CountMismatch(_)));
    assert_eq!(
        err.to_string(),
        "Interleave failed - reads files do not have an equal number of records. \
         Workspace reads object fr_missing_rec (7/8/9), Forward Shock node node_f, \
         Forward Shock filename f.fq, Reverse Shock node node_r, Reverse Shock filename r.fq."
    );
    let written = RecordReader::from_path(&inter, ErrorContext::new()).unwrap().count();
    assert_eq!(written, 8);
}

/// Deinterleaving an odd number of records is an error naming the file
#[test]
fn test_deinterleave_odd_records() {
    let dir = TempDir::new().unwrap();
    let inter = write_plain(dir.path(), "i.fq", &fastq(3, 1));
    let context = ErrorContext::new().with_file(FileProvenance::new().with_shock_filename("i.fq"));
    let err = deinterleave_file(&inter, &dir.path().join("f.fq"), &dir.path().join("r.fq"), &context).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Deinterleave failed - line count is not divisible by 8. Shock filename i.fq."
    );
}

/// Libraries registered with the local provider convert by reference
#[test]
fn test_download_reads_all_shapes() {
    let input = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();

    let single = FileHandle::local(write_plain(input.path(), "s.fastq", &fastq(2, 1)));
    let fwd = FileHandle::local(write_compressed(input.path(), "p_1.fq.gz", &fastq(2, 1)));
    let rev = FileHandle::local(write_compressed(input.path(), "p_2.fq.gz", &fastq(2, 2)));
    let inter = FileHandle::local(write_plain(input.path(), "i.fq", &fastq(4, 1)));

    let provider = LocalProvider::new()
        .with_library(ReadLibrary::new(ObjectRef::new("1/1/1").with_name("single"), LibraryKind::Single(single)))
        .with_library(ReadLibrary::new(
            ObjectRef::new("1/2/1").with_name("paired"),
            LibraryKind::PairedSeparate { forward: fwd, reverse: rev },
        ))
        .with_library(ReadLibrary::new(
            ObjectRef::new("1/3/1").with_name("interleaved"),
            LibraryKind::PairedInterleaved(inter),
        ));
    let converter = ReadsConverter::new(&Config::with_scratch(scratch.path()), provider);
    let refs: Vec<String> = ["1/1/1", "1/2/1", "1/3/1"].iter().map(|s| s.to_string()).collect();

    let interleaved = converter.download_reads(&refs, Ternary::True).unwrap();
    assert_eq!(interleaved["1/1/1"].files.shape, ReadsShape::Single);
    assert_eq!(interleaved["1/2/1"].files.shape, ReadsShape::Interleaved);
    assert_eq!(interleaved["1/3/1"].files.shape, ReadsShape::Interleaved);
    assert_eq!(fs::read_to_string(&interleaved["1/2/1"].files.fwd).unwrap().lines().count(), 16);

    let split = converter.download_reads(&refs, Ternary::False).unwrap();
    assert_eq!(split["1/2/1"].files.shape, ReadsShape::Paired);
    assert_eq!(split["1/3/1"].files.shape, ReadsShape::Paired);
    assert_eq!(split["1/3/1"].files.original_shape, ReadsShape::Interleaved);
    let rev = split["1/3/1"].files.rev.as_ref().unwrap();
    assert_eq!(fs::read_to_string(rev).unwrap().lines().count(), 8);
}

/// A truncated forward file names only the forward side
#[test]
fn test_truncated_record_during_conversion() {
    let input = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let mut forward = FileHandle::local(write_plain(input.path(), "f.fq", "@a/1\nACGT\n+\n"));
    forward.provenance.shock_node = Some("nf".to_string());
    let reverse = FileHandle::local(write_plain(input.path(), "r.fq", &fastq(1, 2)));
    let library = ReadLibrary::new(
        ObjectRef::new("4/5/6").with_name("broken"),
        LibraryKind::PairedSeparate { forward, reverse },
    );

    let converter = ReadsConverter::new(&Config::with_scratch(scratch.path()), LocalProvider::new());
    let err = converter.convert(&library, ConversionRequest::ForceInterleaved).unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, ReadsError::RecordStructure(_)));
    assert!(message.starts_with("Reading FASTQ record failed - non-blank lines are not a multiple of four."));
    assert!(message.contains("Workspace reads object broken (4/5/6)"));
    assert!(message.contains("Shock node nf"));
    assert!(!message.contains("r.fq"));
}
