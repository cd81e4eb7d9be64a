//! DZ Block - Compressed Data Block
//!
//! The DZ block contains zlib-compressed data that represents another block type
//! (typically DT). Decompression lives in [`crate::decompress`] and requires the
//! `compression` feature.

use crate::{
    Error, Result,
    blocks::common::{BlockKind, BlockParse, read_u8, read_u32, read_u64, validate_buffer_size},
};

/// Compression algorithm used in DZ block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DzCompressionType {
    /// Deflate only (zlib).
    Deflate,
    /// Transposition followed by deflate.
    TranspositionDeflate,
}

impl DzCompressionType {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Deflate),
            1 => Some(Self::TranspositionDeflate),
            _ => None,
        }
    }
}

/// First byte of a zlib wrapper (CMF with a 32K deflate window).
pub const ZLIB_WRAPPER_BYTE: u8 = 0x78;

/// Size of the DZ specific header that precedes the compressed bytes.
pub const DZ_SUB_HEADER_SIZE: usize = 24;

/// DZ Block - zlib compressed data block.
///
/// # Layout (after the standard 24-byte block header)
/// - Offset 24-25: Original block type (2 bytes, e.g., "DT")
/// - Offset 26: Compression type (1 byte)
/// - Offset 27: Reserved (1 byte)
/// - Offset 28-31: Zip parameter (bytes per record for transposition)
/// - Offset 32-39: Original data length
/// - Offset 40-47: Compressed data length
/// - Offset 48+: Compressed data, usually starting with a 2-byte zlib header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DzBlock {
    /// Original block type identifier (e.g., "DT", "SD").
    pub original_block_type: [u8; 2],
    pub zip_type: DzCompressionType,
    pub zip_parameter: u32,
    pub original_data_length: u64,
    pub compressed_data_length: u64,
    /// Absolute offset of the compressed bytes, zlib header included.
    pub compressed_offset: u64,
    /// Whether the compressed bytes open with a zlib header.
    pub zlib_wrapped: bool,
    /// Second header byte (FLG), carries the compression level hint.
    pub level_hint: u8,
}

impl DzBlock {
    /// File range of the raw deflate stream, past any zlib header.
    pub fn deflate_range(&self) -> (u64, u64) {
        let skip = if self.zlib_wrapped { 2 } else { 0 };
        (
            self.compressed_offset + skip,
            self.compressed_data_length.saturating_sub(skip),
        )
    }

    pub fn original_kind(&self) -> Option<BlockKind> {
        core::str::from_utf8(&self.original_block_type)
            .ok()
            .and_then(BlockKind::from_tag)
    }
}

impl BlockParse for DzBlock {
    fn parse(_links: &[u64], data: &[u8], data_offset: u64) -> Result<Self> {
        validate_buffer_size(data, DZ_SUB_HEADER_SIZE)?;

        let original_block_type = [data[0], data[1]];
        let zip_type_raw = read_u8(data, 2);
        let zip_type = DzCompressionType::from_u8(zip_type_raw).ok_or_else(|| {
            Error::UnsupportedFeature(format!("DZ compression type {zip_type_raw}"))
        })?;
        let zip_parameter = read_u32(data, 4);
        let original_data_length = read_u64(data, 8);
        let compressed_data_length = read_u64(data, 16);

        let available = (data.len() - DZ_SUB_HEADER_SIZE) as u64;
        if compressed_data_length > available {
            return Err(Error::corrupt(
                data_offset,
                format!(
                    "DZ declares {compressed_data_length} compressed bytes, block holds {available}"
                ),
            ));
        }
        if zip_type == DzCompressionType::TranspositionDeflate && zip_parameter == 0 {
            return Err(Error::corrupt(data_offset, "transposed DZ with zero columns"));
        }

        let payload = &data[DZ_SUB_HEADER_SIZE..];
        let zlib_wrapped = compressed_data_length >= 2 && payload[0] == ZLIB_WRAPPER_BYTE;
        Ok(Self {
            original_block_type,
            zip_type,
            zip_parameter,
            original_data_length,
            compressed_data_length,
            compressed_offset: data_offset + DZ_SUB_HEADER_SIZE as u64,
            zlib_wrapped,
            level_hint: if zlib_wrapped { payload[1] } else { 0 },
        })
    }
}
