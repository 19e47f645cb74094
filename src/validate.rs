//! FASTQ and FASTA file validation
//!
//! Validation is a cheap structural pass followed by an external syntax
//! checker:
//!
//! 1. the file must exist and carry a FASTQ extension, possibly followed by
//!    a compression extension
//! 2. non-blank lines are counted; if a blank line turns up the file is
//!    rewritten without its blank lines (see [`FastqValidator::strip_blank_lines`])
//! 3. a line count that is not a multiple of four fails validation outright
//! 4. otherwise the external checker decides
//!
//! A file that fails validation is not an error: the outcome simply reports
//! `validated == false`. Errors are reserved for bad input (missing file,
//! wrong extension) and for failures to run the checker at all.
//!
//! # Example
//!
//! ```no_run
//! use readsutils::config::Config;
//! use readsutils::validate::FastqValidator;
//!
//! # fn main() -> readsutils::Result<()> {
//! let validator = FastqValidator::from_config(&Config::default());
//! let outcome = validator.validate("reads.fastq", false)?;
//! println!("validated: {}", outcome.validated);
//! # Ok(())
//! # }
//! ```

use crate::config::Config;
use crate::error::{ReadsError, Result};
use crate::io::{is_blank, CompressedReader, CompressedWriter, CompressionFormat, DataSource};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::NamedTempFile;

/// Recognized FASTQ extensions
pub const FASTQ_EXT: &[&str] = &[".fq", ".fastq", ".fnq"];

/// Recognized compression extensions
pub const COMPRESS_EXT: &[&str] = &[".gz", ".gzip", ".bz", ".bzip", ".bz2", ".bzip2"];

/// Recognized FASTA extensions
pub const FASTA_EXT: &[&str] = &[".fa", ".fas", ".fasta", ".fna"];

/// Final extension of a file name, dot included
///
/// A leading dot does not start an extension, so `.fq` has none.
fn final_extension(name: &str) -> Option<&str> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let trimmed = base.trim_start_matches('.');
    let offset = base.len() - trimmed.len();
    trimmed.rfind('.').map(|i| &base[offset + i..])
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let name = path.to_string_lossy();
    final_extension(&name).is_some_and(|ext| allowed.contains(&ext))
}

/// A FASTQ extension, optionally followed by one compression extension
fn has_fastq_extension(path: &Path) -> bool {
    let name = path.to_string_lossy();
    match final_extension(&name) {
        Some(ext) if FASTQ_EXT.contains(&ext) => true,
        Some(ext) if COMPRESS_EXT.contains(&ext) => {
            let stem = &name[..name.len() - ext.len()];
            final_extension(stem).is_some_and(|inner| FASTQ_EXT.contains(&inner))
        }
        _ => false,
    }
}

/// Whether a file name looks like a FASTQ file
///
/// The name, compared case insensitively, must end in a FASTQ extension,
/// optionally followed by one compression extension.
///
/// ```
/// use readsutils::validate::fastq_filename_ok;
///
/// assert!(fastq_filename_ok("Reads.FQ.gz"));
/// assert!(fastq_filename_ok("reads.fnq"));
/// assert!(!fastq_filename_ok("reads.fa"));
/// assert!(!fastq_filename_ok("reads.gz"));
/// ```
pub fn fastq_filename_ok(name: &str) -> bool {
    let lower = name.to_lowercase();
    let is_fastq = |n: &str| FASTQ_EXT.iter().any(|ext| n.ends_with(ext));
    if is_fastq(&lower) {
        return true;
    }
    COMPRESS_EXT
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .is_some_and(|ext| is_fastq(&lower[..lower.len() - ext.len()]))
}

/// An external program judging the syntax of a file
pub trait SyntaxChecker {
    /// Check `file`, passing `args` after it; `true` means the file passed
    fn check(&self, file: &Path, args: &[String]) -> Result<bool>;
}

/// Runs a command line and reports its exit status
#[derive(Debug, Clone)]
pub struct CommandChecker {
    command: Vec<String>,
    file_flag: Option<String>,
}

impl CommandChecker {
    /// Checker invoked as `{command...} {file} {args...}`
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            file_flag: None,
        }
    }

    /// Pass the file as `{flag} {file}` instead of a bare argument
    pub fn with_file_flag(mut self, flag: impl Into<String>) -> Self {
        self.file_flag = Some(flag.into());
        self
    }
}

impl SyntaxChecker for CommandChecker {
    fn check(&self, file: &Path, args: &[String]) -> Result<bool> {
        let (program, base_args) = self
            .command
            .split_first()
            .ok_or_else(|| ReadsError::InvalidParameter("Syntax checker command is empty".to_string()))?;

        let mut command = Command::new(program);
        command.args(base_args);
        if let Some(flag) = &self.file_flag {
            command.arg(flag);
        }
        command.arg(file).args(args);
        debug!("Running {:?}", command);

        let status = command.status().map_err(|source| ReadsError::Checker {
            program: program.clone(),
            source,
        })?;
        match status.code() {
            Some(code) => info!("Validation return code: {}", code),
            None => warn!("{} terminated by a signal", program),
        }
        Ok(status.success())
    }
}

/// Result of validating one FASTQ file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Whether the file passed
    pub validated: bool,
    /// Non-blank lines in the file
    #[serde(skip)]
    pub line_count: u64,
    /// Whether blank lines were stripped from the file in place
    #[serde(skip)]
    pub blank_lines_removed: bool,
}

/// One entry of a batch validation request
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FastqValidationParams {
    /// File to validate
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    /// Whether the file is interleaved
    #[serde(default)]
    pub interleaved: bool,
}

fn check_exists(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() || !path.is_file() {
        return Err(ReadsError::NoSuchFile(path.display().to_string()));
    }
    Ok(())
}

/// Structural FASTQ validator
pub struct FastqValidator<C: SyntaxChecker> {
    checker: C,
    max_errors: u32,
}

impl FastqValidator<CommandChecker> {
    /// Validator running the configured external checker
    pub fn from_config(config: &Config) -> Self {
        let checker = CommandChecker::new(vec![config.fastq_validator.clone()]).with_file_flag("--file");
        Self::new(checker, config.fastq_max_errors)
    }
}

impl<C: SyntaxChecker> FastqValidator<C> {
    /// Validator using `checker` with the given error threshold
    pub fn new(checker: C, max_errors: u32) -> Self {
        Self { checker, max_errors }
    }

    /// Validate one file
    ///
    /// The file may be rewritten in place when it holds blank lines.
    pub fn validate<P: AsRef<Path>>(&self, path: P, interleaved: bool) -> Result<ValidationOutcome> {
        let path = path.as_ref();
        check_exists(path)?;
        if !has_fastq_extension(path) {
            return Err(ReadsError::NotFastq(path.display().to_string()));
        }

        info!("Validating FASTQ file {}", path.display());
        let (mut line_count, found_blank) = count_until_blank(path)?;
        if found_blank {
            info!("Removing blank lines from {}", path.display());
            line_count = self.strip_blank_lines(path)?;
        }

        if line_count % 4 != 0 {
            warn!("Invalid FASTQ file, expected multiple of 4 lines, got {}", line_count);
            return Ok(ValidationOutcome {
                validated: false,
                line_count,
                blank_lines_removed: found_blank,
            });
        }
        info!("{} lines in file", line_count);

        let mut args = vec!["--maxErrors".to_string(), self.max_errors.to_string()];
        if interleaved {
            args.push("--disableSeqIDCheck".to_string());
        }
        let validated = self.checker.check(path, &args)?;
        info!("Validation {} for {}", if validated { "passed" } else { "failed" }, path.display());

        Ok(ValidationOutcome {
            validated,
            line_count,
            blank_lines_removed: found_blank,
        })
    }

    /// Validate several files, stopping at the first input error
    pub fn validate_many(&self, params: &[FastqValidationParams]) -> Result<Vec<ValidationOutcome>> {
        params
            .iter()
            .map(|p| {
                let path = p.file_path.clone().unwrap_or_default();
                self.validate(path, p.interleaved)
            })
            .collect()
    }

    /// Rewrite `path` without its blank lines
    ///
    /// The cleaned copy goes to a uniquely named file beside the original
    /// and replaces it by rename once complete, so a failure leaves the
    /// original untouched. Each kept line loses its surrounding whitespace and
    /// is terminated with `\n`; the file keeps its compression. Returns the
    /// number of lines written.
    pub fn strip_blank_lines(&self, path: &Path) -> Result<u64> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = NamedTempFile::new_in(&dir)?;

        let mut reader = CompressedReader::new(DataSource::from_path(path))?;
        let format = reader.format();
        let mut writer = CompressedWriter::with_format(format, Box::new(temp.as_file().try_clone()?))?;

        let mut count = 0u64;
        let mut line = Vec::with_capacity(256);
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if is_blank(&line) {
                continue;
            }
            let start = line.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(line.len());
            let end = line.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
            writer.write_all(&line[start..end])?;
            writer.write_all(b"\n")?;
            count += 1;
        }
        writer.finish()?;

        fs::set_permissions(temp.path(), fs::metadata(path)?.permissions())?;
        temp.persist(path).map_err(|e| ReadsError::Io(e.error))?;
        if format != CompressionFormat::None {
            debug!("Rewrote {} as {:?}", path.display(), format);
        }
        Ok(count)
    }
}

/// Count non-blank lines up to the first blank one
///
/// Returns the count and whether a blank line stopped it.
fn count_until_blank(path: &Path) -> Result<(u64, bool)> {
    let mut reader = CompressedReader::new(DataSource::from_path(path))?;
    let mut line = Vec::with_capacity(256);
    let mut count = 0u64;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok((count, false));
        }
        if is_blank(&line) {
            return Ok((count, true));
        }
        count += 1;
    }
}

/// FASTA validator backed by an external checker
pub struct FastaValidator<C: SyntaxChecker> {
    checker: C,
}

impl FastaValidator<CommandChecker> {
    /// Validator running the configured FASTA checker
    pub fn from_config(config: &Config) -> Self {
        Self::new(CommandChecker::new(config.fasta_validator.clone()))
    }
}

impl<C: SyntaxChecker> FastaValidator<C> {
    /// Validator using `checker`
    pub fn new(checker: C) -> Self {
        Self { checker }
    }

    /// Validate one FASTA file, `true` if the checker accepts it
    pub fn validate<P: AsRef<Path>>(&self, path: P) -> Result<bool> {
        let path = path.as_ref();
        check_exists(path)?;
        if !has_extension(path, FASTA_EXT) {
            return Err(ReadsError::NotFasta(path.display().to_string()));
        }
        info!("Validating FASTA file {}", path.display());
        let valid = self.checker.check(path, &[])?;
        info!("Validation {} for {}", if valid { "passed" } else { "failed" }, path.display());
        Ok(valid)
    }
}
