//! Common types used throughout readsutils

use crate::error::{ReadsError, Result};
use serde::{Serialize, Serializer};
use std::fmt;
use std::io::Write;

/// A FASTQ record held as an opaque text block
///
/// The block is the concatenation of the four record lines (header,
/// sequence, separator, quality), each newline-terminated, exactly as read.
/// The conversion engine never looks inside it; the line accessors exist for
/// statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqRecord {
    block: Vec<u8>,
    line_ends: [usize; 4],
}

impl FastqRecord {
    /// Build a record from a block and the end offset (past the `\n`) of each line
    pub(crate) fn from_block(block: Vec<u8>, line_ends: [usize; 4]) -> Self {
        debug_assert_eq!(line_ends[3], block.len());
        Self { block, line_ends }
    }

    /// Build a record from four lines, adding terminators where missing
    pub fn from_lines(header: &str, sequence: &str, separator: &str, quality: &str) -> Self {
        let mut block = Vec::with_capacity(header.len() + sequence.len() + separator.len() + quality.len() + 4);
        let mut line_ends = [0usize; 4];
        for (i, line) in [header, sequence, separator, quality].iter().enumerate() {
            block.extend_from_slice(line.as_bytes());
            if !line.ends_with('\n') {
                block.push(b'\n');
            }
            line_ends[i] = block.len();
        }
        Self { block, line_ends }
    }

    /// The raw record text, all four lines with terminators
    pub fn as_bytes(&self) -> &[u8] {
        &self.block
    }

    /// Line `index` (0..4) without its line terminator
    pub fn line(&self, index: usize) -> &[u8] {
        let start = if index == 0 { 0 } else { self.line_ends[index - 1] };
        let mut line = &self.block[start..self.line_ends[index]];
        while let Some((&last, rest)) = line.split_last() {
            if last == b'\n' || last == b'\r' {
                line = rest;
            } else {
                break;
            }
        }
        line
    }

    /// Header line, including the leading `@`
    pub fn header(&self) -> &[u8] {
        self.line(0)
    }

    /// Sequence line
    pub fn sequence(&self) -> &[u8] {
        self.line(1)
    }

    /// Quality line
    pub fn quality(&self) -> &[u8] {
        self.line(3)
    }

    /// Write the record text unchanged
    pub fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.block)
    }
}

/// A three-valued flag as accepted at the service boundary
///
/// The wire form is `"true"`, `"false"` or null; internal logic only ever
/// sees this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ternary {
    /// `"true"`
    True,
    /// `"false"`
    False,
    /// null or absent
    #[default]
    Unknown,
}

impl Ternary {
    /// Parse the wire form of parameter `name`
    pub fn parse(name: &str, value: Option<&str>) -> Result<Self> {
        match value {
            None => Ok(Self::Unknown),
            Some("true") => Ok(Self::True),
            Some("false") => Ok(Self::False),
            Some(other) => Err(ReadsError::InvalidTernary {
                name: name.to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Wire form, `None` for unknown
    pub fn as_wire(&self) -> Option<&'static str> {
        match self {
            Self::True => Some("true"),
            Self::False => Some("false"),
            Self::Unknown => None,
        }
    }
}

impl From<bool> for Ternary {
    fn from(value: bool) -> Self {
        if value {
            Self::True
        } else {
            Self::False
        }
    }
}

impl Serialize for Ternary {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.as_wire() {
            Some(value) => serializer.serialize_str(value),
            None => serializer.serialize_none(),
        }
    }
}

/// Physical layout of a reads dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadsShape {
    /// One file of single-end reads
    Single,
    /// Two files, forward and reverse, record-aligned by position
    Paired,
    /// One file alternating forward and reverse records
    Interleaved,
}

impl ReadsShape {
    /// Lower-case name used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Paired => "paired",
            Self::Interleaved => "interleaved",
        }
    }
}

impl fmt::Display for ReadsShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReadsShape {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
