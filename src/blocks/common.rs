// blocks/common.rs
//! Common types, traits, and helper functions for MDF block parsing.
//!
//! This module provides:
//! - [`BlockHeader`]: The 24-byte header present in all MDF blocks
//! - [`BlockKind`]: The closed set of block tags this decoder dispatches on
//! - [`BlockParse`]: Trait for parsing a block's typed payload
//! - [`DataType`]: Enum representing MDF data types
//! - Byte parsing helper functions to reduce code duplication

use crate::{Error, Result};

/// Size of the generic block header (`id`, `reserved`, `length`, `link_count`).
pub const BLOCK_HEADER_SIZE: usize = 24;

// ============================================================================
// Byte Parsing Helpers
// ============================================================================

/// Read a u64 from a byte slice at the given offset (little-endian).
///
/// # Panics
/// Panics if `offset + 8 > bytes.len()`. Callers validate sizes first.
#[inline]
pub fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

/// Read a u32 from a byte slice at the given offset (little-endian).
#[inline]
pub fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

/// Read a u16 from a byte slice at the given offset (little-endian).
#[inline]
pub fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Read an i16 from a byte slice at the given offset (little-endian).
#[inline]
pub fn read_i16(bytes: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Read an f64 from a byte slice at the given offset (little-endian).
#[inline]
pub fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    f64::from_bits(read_u64(bytes, offset))
}

/// Read a u8 from a byte slice at the given offset.
#[inline]
pub fn read_u8(bytes: &[u8], offset: usize) -> u8 {
    bytes[offset]
}

// ============================================================================
// Validation Helpers
// ============================================================================

/// Validate that a buffer has at least `expected` bytes.
///
/// Returns `Err(TooShortBuffer)` if the buffer is too small.
#[inline]
pub fn validate_buffer_size(bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() < expected {
        return Err(Error::TooShortBuffer {
            actual: bytes.len(),
            expected,
            file: file!(),
            line: line!(),
        });
    }
    Ok(())
}

/// Safely convert a u64 offset/address to usize for indexing.
///
/// On 64-bit systems this always succeeds. On 32-bit systems values above
/// `usize::MAX` are reported as corrupt, since no mappable file can hold them.
#[inline]
pub fn u64_to_usize(value: u64, context: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        Error::corrupt(
            0,
            format!("{context} value {value} exceeds the addressable size on this platform"),
        )
    })
}

/// Returns link `index`, or the null link when the block carries fewer links.
#[inline]
pub fn link(links: &[u64], index: usize) -> u64 {
    links.get(index).copied().unwrap_or(0)
}

// ============================================================================
// Block Header
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockHeader {
    /// 4-byte block type identifier (e.g., "##HD", "##DG").
    pub id: String,
    /// Reserved field, always 0.
    pub reserved: u32,
    /// Total length of the block in bytes, including this header.
    pub length: u64,
    /// Number of link fields in this block.
    pub link_count: u64,
}

impl BlockHeader {
    /// Parses a BlockHeader from the first 24 bytes of a slice.
    ///
    /// Only the layout is checked here. Whether the tag is known and whether
    /// the declared length fits the file is decided by the block store.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        validate_buffer_size(bytes, BLOCK_HEADER_SIZE)?;
        let id = match core::str::from_utf8(&bytes[0..4]) {
            Ok(s) => String::from(s),
            Err(_) => String::from_utf8_lossy(&bytes[0..4]).into_owned(),
        };
        Ok(BlockHeader {
            id,
            reserved: read_u32(bytes, 4),
            length: read_u64(bytes, 8),
            link_count: read_u64(bytes, 16),
        })
    }

    /// The two-character tag that identifies the block kind ("CN", "DT", ...).
    ///
    /// The leading "##" is not checked.
    pub fn tag(&self) -> &str {
        self.id.get(2..4).unwrap_or("")
    }

    /// Number of bytes occupied by the header and the link array.
    pub fn payload_start(&self) -> u64 {
        BLOCK_HEADER_SIZE as u64 + self.link_count.saturating_mul(8)
    }
}

/// Every block kind the decoder understands.
///
/// Anything else found behind a link is a corrupt file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKind {
    Header,
    DataGroup,
    ChannelGroup,
    Channel,
    Conversion,
    Text,
    Metadata,
    Source,
    Data,
    DataList,
    HeaderList,
    Zipped,
    SignalData,
    ReducedData,
    DataValues,
    InvalidationData,
    RecordData,
    DataListValues,
    Attachment,
    Event,
    FileHistory,
    ChannelHierarchy,
    ChannelArray,
    SampleReduction,
    DataListZip,
}

impl BlockKind {
    /// Maps a two-character tag to a kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "HD" => BlockKind::Header,
            "DG" => BlockKind::DataGroup,
            "CG" => BlockKind::ChannelGroup,
            "CN" => BlockKind::Channel,
            "CC" => BlockKind::Conversion,
            "TX" => BlockKind::Text,
            "MD" => BlockKind::Metadata,
            "SI" => BlockKind::Source,
            "DT" => BlockKind::Data,
            "DL" => BlockKind::DataList,
            "HL" => BlockKind::HeaderList,
            "DZ" => BlockKind::Zipped,
            "SD" => BlockKind::SignalData,
            "RD" => BlockKind::ReducedData,
            "DV" => BlockKind::DataValues,
            "DI" => BlockKind::InvalidationData,
            "RV" => BlockKind::RecordData,
            "LD" => BlockKind::DataListValues,
            "AT" => BlockKind::Attachment,
            "EV" => BlockKind::Event,
            "FH" => BlockKind::FileHistory,
            "CH" => BlockKind::ChannelHierarchy,
            "CA" => BlockKind::ChannelArray,
            "SR" => BlockKind::SampleReduction,
            "RI" => BlockKind::DataListZip,
            _ => return None,
        })
    }

    pub fn tag(self) -> &'static str {
        match self {
            BlockKind::Header => "HD",
            BlockKind::DataGroup => "DG",
            BlockKind::ChannelGroup => "CG",
            BlockKind::Channel => "CN",
            BlockKind::Conversion => "CC",
            BlockKind::Text => "TX",
            BlockKind::Metadata => "MD",
            BlockKind::Source => "SI",
            BlockKind::Data => "DT",
            BlockKind::DataList => "DL",
            BlockKind::HeaderList => "HL",
            BlockKind::Zipped => "DZ",
            BlockKind::SignalData => "SD",
            BlockKind::ReducedData => "RD",
            BlockKind::DataValues => "DV",
            BlockKind::InvalidationData => "DI",
            BlockKind::RecordData => "RV",
            BlockKind::DataListValues => "LD",
            BlockKind::Attachment => "AT",
            BlockKind::Event => "EV",
            BlockKind::FileHistory => "FH",
            BlockKind::ChannelHierarchy => "CH",
            BlockKind::ChannelArray => "CA",
            BlockKind::SampleReduction => "SR",
            BlockKind::DataListZip => "RI",
        }
    }

    /// Raw record storage that may appear inside a data list.
    pub fn is_data_storage(self) -> bool {
        matches!(
            self,
            BlockKind::Data | BlockKind::Zipped | BlockKind::DataValues | BlockKind::RecordData
        )
    }
}

impl core::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "##{}", self.tag())
    }
}

/// Parses the typed payload of one block kind.
///
/// `links` is the block's link array and `data` the bytes that follow it, up
/// to the declared block length. `data_offset` is the absolute file offset of
/// `data[0]`, needed by blocks that reference their bytes in place.
pub trait BlockParse: Sized {
    fn parse(links: &[u64], data: &[u8], data_offset: u64) -> Result<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    UnsignedIntegerLE,
    UnsignedIntegerBE,
    SignedIntegerLE,
    SignedIntegerBE,
    FloatLE,
    FloatBE,
    StringLatin1,
    StringUtf8,
    StringUtf16LE,
    StringUtf16BE,
    ByteArray,
    MimeSample,
    MimeStream,
    CanOpenDate,
    CanOpenTime,
    ComplexLE,
    ComplexBE,
    Unknown(u8),
}

impl DataType {
    /// Convert a numeric representation to the corresponding `DataType`.
    /// Values outside the known range yield `DataType::Unknown`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => DataType::UnsignedIntegerLE,
            1 => DataType::UnsignedIntegerBE,
            2 => DataType::SignedIntegerLE,
            3 => DataType::SignedIntegerBE,
            4 => DataType::FloatLE,
            5 => DataType::FloatBE,
            6 => DataType::StringLatin1,
            7 => DataType::StringUtf8,
            8 => DataType::StringUtf16LE,
            9 => DataType::StringUtf16BE,
            10 => DataType::ByteArray,
            11 => DataType::MimeSample,
            12 => DataType::MimeStream,
            13 => DataType::CanOpenDate,
            14 => DataType::CanOpenTime,
            15 => DataType::ComplexLE,
            16 => DataType::ComplexBE,
            other => DataType::Unknown(other),
        }
    }
}
