//! Compression handling and the DataSource abstraction
//!
//! Reads files arrive gzip- or bzip2-compressed as often as not. Readers
//! sniff the leading magic bytes so a compressed file is decompressed
//! transparently whatever its name; writers pick gzip or bzip2 from the
//! sink's extension and write plain text otherwise.

use crate::error::{ReadsError, Result};
use crate::io::DataSink;
use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Gzip magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Bzip2 magic bytes ("BZh")
const BZIP2_MAGIC: [u8; 3] = *b"BZh";

/// Compression format detected from the leading bytes of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Plain text
    None,
    /// gzip (including multi-member and bgzip files)
    Gzip,
    /// bzip2
    Bzip2,
}

impl CompressionFormat {
    /// Detect the format from the first bytes of a stream
    pub fn sniff(head: &[u8]) -> Self {
        if head.starts_with(&GZIP_MAGIC) {
            Self::Gzip
        } else if head.starts_with(&BZIP2_MAGIC) {
            Self::Bzip2
        } else {
            Self::None
        }
    }
}

/// Where reads data is read from
#[derive(Debug, Clone)]
pub enum DataSource {
    /// Local file path
    Local(PathBuf),
}

impl DataSource {
    /// Create a local file data source
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        DataSource::Local(path.as_ref().to_path_buf())
    }

    /// Open the raw (possibly compressed) bytes of the source
    pub fn open(&self) -> Result<Box<dyn BufRead + Send>> {
        match self {
            DataSource::Local(path) => {
                let file = File::open(path)?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

/// Reader that decompresses gzip/bzip2 input on the fly
///
/// # Example
///
/// ```no_run
/// use readsutils::io::{CompressedReader, DataSource};
/// use std::io::BufRead;
///
/// # fn main() -> readsutils::Result<()> {
/// let reader = CompressedReader::new(DataSource::from_path("reads.fq.gz"))?;
/// for line in reader.lines() {
///     println!("{}", line?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct CompressedReader {
    inner: Box<dyn BufRead + Send>,
    format: CompressionFormat,
}

impl CompressedReader {
    /// Open a data source, detecting compression from its magic bytes
    pub fn new(source: DataSource) -> Result<Self> {
        let reader = source.open()?;
        Self::from_reader(reader)
    }

    /// Wrap an already opened reader
    pub fn from_reader(mut reader: Box<dyn BufRead + Send>) -> Result<Self> {
        let format = {
            let peeked = reader.fill_buf()?;
            CompressionFormat::sniff(peeked)
        };

        let inner: Box<dyn BufRead + Send> = match format {
            CompressionFormat::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(reader))),
            CompressionFormat::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(reader))),
            CompressionFormat::None => reader,
        };

        Ok(Self { inner, format })
    }

    /// Compression detected on the input
    pub fn format(&self) -> CompressionFormat {
        self.format
    }
}

impl Read for CompressedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for CompressedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

/// Copy `source` to `dest`, decompressing it if needed
///
/// Returns the detected compression of the source.
pub fn decompress_to_path(source: &Path, dest: &Path) -> Result<CompressionFormat> {
    let mut reader = CompressedReader::new(DataSource::from_path(source))?;
    let format = reader.format();
    let mut writer = CompressedWriter::new_plain(Box::new(File::create(dest)?))?;
    io::copy(&mut reader, &mut writer).map_err(|e| match format {
        CompressionFormat::None => ReadsError::Io(e),
        _ => ReadsError::Compression(format!("Failed to decompress {}: {}", source.display(), e)),
    })?;
    writer.finish()?;
    debug!("Copied {} to {} ({:?})", source.display(), dest.display(), format);
    Ok(format)
}

/// Writer for plain, gzip or bzip2 output
pub enum CompressedWriter {
    /// Uncompressed writer with buffering
    Plain(Option<BufWriter<Box<dyn Write>>>),

    /// Gzip compressed writer, default level
    Gzip(Option<GzEncoder<BufWriter<Box<dyn Write>>>>),

    /// Bzip2 compressed writer, default level
    Bzip2(Option<BzEncoder<BufWriter<Box<dyn Write>>>>),
}

impl CompressedWriter {
    /// Create a writer for a sink, compressed according to its extension
    pub fn new(sink: DataSink) -> io::Result<Self> {
        let file = File::create(sink.path())?;
        Self::with_format(sink.compression(), Box::new(file))
    }

    /// Create a writer producing `format`
    pub fn with_format(format: CompressionFormat, writer: Box<dyn Write>) -> io::Result<Self> {
        match format {
            CompressionFormat::None => Self::new_plain(writer),
            CompressionFormat::Gzip => Self::new_gzip(writer),
            CompressionFormat::Bzip2 => Self::new_bzip2(writer),
        }
    }

    /// Create a plain (uncompressed) writer
    pub fn new_plain(writer: Box<dyn Write>) -> io::Result<Self> {
        Ok(Self::Plain(Some(BufWriter::new(writer))))
    }

    /// Create a gzip compressed writer
    pub fn new_gzip(writer: Box<dyn Write>) -> io::Result<Self> {
        let encoder = GzEncoder::new(BufWriter::new(writer), Compression::default());
        Ok(Self::Gzip(Some(encoder)))
    }

    /// Create a bzip2 compressed writer
    pub fn new_bzip2(writer: Box<dyn Write>) -> io::Result<Self> {
        let encoder = BzEncoder::new(BufWriter::new(writer), bzip2::Compression::default());
        Ok(Self::Bzip2(Some(encoder)))
    }

    /// Flush buffered data without finalizing a compressed stream
    pub fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(Some(w)) => w.flush(),
            Self::Gzip(Some(w)) => w.flush(),
            Self::Bzip2(Some(w)) => w.flush(),
            _ => Ok(()),
        }
    }

    /// Flush everything and, for compressed output, write the stream trailer
    ///
    /// Call this rather than relying on `Drop`, which cannot report errors.
    pub fn finish(mut self) -> io::Result<()> {
        match &mut self {
            Self::Plain(w) => match w.take() {
                Some(mut writer) => writer.flush(),
                None => Ok(()),
            },
            Self::Gzip(w) => match w.take() {
                Some(encoder) => {
                    let mut inner = encoder.finish()?;
                    inner.flush()
                }
                None => Ok(()),
            },
            Self::Bzip2(w) => match w.take() {
                Some(encoder) => {
                    let mut inner = encoder.finish()?;
                    inner.flush()
                }
                None => Ok(()),
            },
        }
    }
}

impl Write for CompressedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(Some(w)) => w.write(buf),
            Self::Gzip(Some(w)) => w.write(buf),
            Self::Bzip2(Some(w)) => w.write(buf),
            _ => Err(io::Error::new(io::ErrorKind::Other, "Cannot write to finished writer")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        CompressedWriter::flush(self)
    }
}

impl Drop for CompressedWriter {
    fn drop(&mut self) {
        // best effort; finish() reports errors
        let _ = self.flush();
    }
}
