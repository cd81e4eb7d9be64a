//! Mapping a channel group's record stream onto its physical blocks.
//!
//! Block boundaries rarely coincide with record boundaries. For every block
//! the layout records how many leading bytes finish a record begun earlier
//! (`left`), how many trailing bytes start a record finished later
//! (`right`), and which whole records lie in between. The straddling
//! fragments, concatenated in block order, form the group's gap buffer:
//! every `record_length` bytes of it are one complete record.
//!
//! Example with 5-byte records and blocks of 12, 13 and 25 bytes:
//!
//! ```text
//! block  position  left  aligned records  right
//! 0      0         0     0..2             2
//! 1      12        3     3..5             0
//! 2      25        0     5..10            0
//! ```
//!
//! Record 2 is rebuilt from the last two bytes of block 0 and the first three
//! of block 1.

use tracing::debug;

use crate::{
    Error, Result,
    parsing::{DataBlockMap, PhysicalBlock},
};

/// Straddling fragments of one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Alignment {
    /// Leading bytes that complete the previous block's last record.
    pub left_byte_offset: u64,
    /// Trailing bytes that begin a record completed by the next block.
    pub right_byte_offset: u64,
    /// Gap buffer position of the left fragment.
    pub left_gap_index: u64,
    /// Gap buffer position of the right fragment.
    pub right_gap_index: u64,
}

/// One physical block placed in the record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLoadingInfo {
    /// File offset of the DT or DZ block.
    pub block_offset: u64,
    pub block: PhysicalBlock,
    pub byte_position: u64,
    pub byte_length: u64,
    pub alignment: Alignment,
    /// Index of the first whole record inside the block.
    pub sample_index: u64,
    /// Whole records inside the block.
    pub sample_count: u64,
}

impl BlockLoadingInfo {
    pub fn sample_end(&self) -> u64 {
        self.sample_index + self.sample_count
    }

    pub fn byte_end(&self) -> u64 {
        self.byte_position + self.byte_length
    }

    /// Bytes this block contributes to the gap buffer.
    pub fn gap_bytes(&self) -> u64 {
        self.alignment.left_byte_offset + self.alignment.right_byte_offset
    }
}

/// The cached stream layout of one channel group.
#[derive(Debug, Clone, Default)]
pub struct BlockLayout {
    record_length: u64,
    blocks: Vec<BlockLoadingInfo>,
    gap_length: u64,
    /// Record index of every gap record, in gap buffer order.
    gap_sample_indices: Vec<u64>,
}

impl BlockLayout {
    /// Places `maps` (in stream order) on a grid of `record_length` bytes.
    pub fn build(maps: &[DataBlockMap], record_length: u64) -> Result<Self> {
        let stream_bytes: u64 = maps.iter().map(|m| m.block.byte_length()).sum();
        if record_length == 0 {
            if stream_bytes == 0 {
                return Ok(Self::default());
            }
            return Err(Error::corrupt(0, "records of zero length in a non-empty data stream"));
        }
        let r = record_length;

        let mut blocks = Vec::with_capacity(maps.len());
        let mut gap_sample_indices = Vec::new();
        let mut gap_cursor = 0u64;
        let mut expected_position = 0u64;

        for map in maps {
            let pos = map.byte_position;
            let len = map.block.byte_length();
            if pos != expected_position {
                return Err(Error::corrupt(
                    map.block_offset,
                    format!("block placed at stream byte {pos}, expected {expected_position}"),
                ));
            }

            let left = ((r - pos % r) % r).min(len);
            let aligned = (len - left) / r;
            let right = (len - left) % r;
            let sample_index = (pos + left).div_ceil(r);
            let alignment = Alignment {
                left_byte_offset: left,
                right_byte_offset: right,
                left_gap_index: gap_cursor,
                right_gap_index: gap_cursor + left,
            };
            if right > 0 {
                if alignment.right_gap_index % r != 0 {
                    return Err(Error::corrupt(
                        map.block_offset,
                        format!(
                            "gap record starts at gap byte {}, not a multiple of record length {r}",
                            alignment.right_gap_index
                        ),
                    ));
                }
                gap_sample_indices.push(sample_index + aligned);
            }
            gap_cursor = alignment.right_gap_index + right;
            expected_position += len;

            blocks.push(BlockLoadingInfo {
                block_offset: map.block_offset,
                block: map.block,
                byte_position: pos,
                byte_length: len,
                alignment,
                sample_index,
                sample_count: aligned,
            });
        }

        if gap_cursor % r != 0 {
            return Err(Error::corrupt(
                0,
                format!("gap buffer holds {gap_cursor} bytes, not a multiple of record length {r}"),
            ));
        }

        let layout = Self {
            record_length,
            blocks,
            gap_length: gap_cursor,
            gap_sample_indices,
        };
        debug!(
            blocks = layout.blocks.len(),
            records = layout.total_records(),
            gap_records = layout.gap_record_count(),
            "built block layout"
        );
        Ok(layout)
    }

    pub fn record_length(&self) -> u64 {
        self.record_length
    }

    pub fn blocks(&self) -> &[BlockLoadingInfo] {
        &self.blocks
    }

    /// Total size of the gap buffer in bytes.
    pub fn gap_length(&self) -> u64 {
        self.gap_length
    }

    pub fn gap_sample_indices(&self) -> &[u64] {
        &self.gap_sample_indices
    }

    pub fn gap_record_count(&self) -> u64 {
        self.gap_sample_indices.len() as u64
    }

    /// Records stored whole inside single blocks.
    pub fn aligned_records(&self) -> u64 {
        self.blocks.iter().map(|b| b.sample_count).sum()
    }

    /// All records of the stream.
    pub fn total_records(&self) -> u64 {
        self.aligned_records() + self.gap_record_count()
    }

    /// Indices of the first and last block needed for records
    /// `start..end`, or `None` for an empty range.
    ///
    /// The first block is the one where record `start` begins: the last
    /// block whose first whole record is at or before `start`. The last
    /// block is found the same way for record `end - 1` and then extended
    /// until the blocks reach the final byte of that record.
    pub fn locate(&self, start: u64, end: u64) -> Option<(usize, usize)> {
        if start >= end || self.blocks.is_empty() {
            return None;
        }
        let first = self
            .blocks
            .partition_point(|b| b.sample_index <= start)
            .checked_sub(1)?;
        let mut last = self
            .blocks
            .partition_point(|b| b.sample_index < end)
            .checked_sub(1)?
            .max(first);
        let end_byte = end * self.record_length;
        while last + 1 < self.blocks.len() && self.blocks[last].byte_end() < end_byte {
            last += 1;
        }
        Some((first, last))
    }
}
