use crate::{
    Result,
    blocks::{
        DG_DATA_SIZE,
        common::{BlockParse, link, read_u8, validate_buffer_size},
    },
};

/// Data Group Block (##DG) - groups channel groups that share a data block.
///
/// A data group typically corresponds to one acquisition device. It contains
/// links to channel groups and the actual measurement data block.
#[derive(Debug, Clone)]
pub struct DataGroupBlock {
    /// Link to next data group block (0 if last).
    pub next_dg_addr: u64,
    /// Link to first channel group block.
    pub first_cg_addr: u64,
    /// Link to data block (DT, DZ, DL, HL, etc.).
    pub data_block_addr: u64,
    /// Link to comment text/metadata block.
    pub comment_addr: u64,
    /// Size of record ID in bytes (0, 1, 2, 4, or 8).
    pub record_id_size: u8,
}

impl BlockParse for DataGroupBlock {
    fn parse(links: &[u64], data: &[u8], _data_offset: u64) -> Result<Self> {
        validate_buffer_size(data, DG_DATA_SIZE)?;
        Ok(Self {
            next_dg_addr: link(links, 0),
            first_cg_addr: link(links, 1),
            data_block_addr: link(links, 2),
            comment_addr: link(links, 3),
            record_id_size: read_u8(data, 0),
        })
    }
}
