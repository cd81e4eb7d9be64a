// src/blocks/mod.rs

// ============================================================================
// Block Size Constants (internal use only)
// ============================================================================
// Minimum sizes of the data section that follows the link array. Variable
// length blocks (TX, MD, DT, DL) are sized by their header.length.

/// Identification block size (64 bytes) - file format identifier at offset 0.
pub(crate) const ID_BLOCK_SIZE: usize = 64;

/// File offset of the header block, right after the identification block.
pub(crate) const HD_BLOCK_OFFSET: u64 = 64;

pub(crate) const HD_DATA_SIZE: usize = 32;
pub(crate) const DG_DATA_SIZE: usize = 8;
pub(crate) const CG_DATA_SIZE: usize = 32;
pub(crate) const CN_DATA_SIZE: usize = 72;
pub(crate) const SI_DATA_SIZE: usize = 3;

// ============================================================================
// Submodules
// ============================================================================

mod block;
mod channel_block;
mod channel_group_block;
mod common;
mod conversion_block;
mod data_block;
mod data_group_block;
mod data_list_block;
mod dz_block;
mod header_block;
mod header_list_block;
mod identification_block;
mod source_block;
mod text_block;

// Re-export common types
pub use common::{BLOCK_HEADER_SIZE, BlockHeader, BlockKind, BlockParse, DataType};
pub(crate) use common::u64_to_usize;

// Re-export block types
pub use block::{Block, BlockPayload};
pub use channel_block::{ChannelBlock, ChannelType};
pub use channel_group_block::ChannelGroupBlock;
pub use conversion_block::{ConversionBlock, ConversionType};
pub use data_block::DataBlock;
pub use data_group_block::DataGroupBlock;
pub use data_list_block::DataListBlock;
pub use dz_block::{DzBlock, DzCompressionType};
pub use header_block::HeaderBlock;
pub use header_list_block::HeaderListBlock;
pub use identification_block::IdentificationBlock;
pub use source_block::{BusType, SourceBlock, SourceType};
pub use text_block::{MetadataBlock, TextBlock};
