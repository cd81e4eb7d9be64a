use crate::{
    Result,
    blocks::common::BlockParse,
};

/// Data Block (##DT) - a contiguous run of records.
///
/// The payload is not copied; the block only remembers where its bytes live
/// so the sampler can read them straight from the mapped file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlock {
    /// Absolute file offset of the first record byte.
    pub data_offset: u64,
    /// Number of record bytes.
    pub data_length: u64,
}

impl BlockParse for DataBlock {
    fn parse(_links: &[u64], data: &[u8], data_offset: u64) -> Result<Self> {
        Ok(Self {
            data_offset,
            data_length: data.len() as u64,
        })
    }
}
