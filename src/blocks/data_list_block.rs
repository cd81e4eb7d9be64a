use crate::{
    Error, Result,
    blocks::common::{
        BlockParse, link, read_u8, read_u32, read_u64, validate_buffer_size,
    },
};

/// `dl_flags` bit: every listed block has the same length.
pub const DL_FLAG_EQUAL_LENGTH: u8 = 0x01;
/// `dl_flags` bit: a time value array follows.
pub const DL_FLAG_TIME_VALUES: u8 = 0x02;
/// `dl_flags` bit: an angle value array follows.
pub const DL_FLAG_ANGLE_VALUES: u8 = 0x04;
/// `dl_flags` bit: a distance value array follows.
pub const DL_FLAG_DISTANCE_VALUES: u8 = 0x08;

/// Data List Block (##DL) - an ordered list of data blocks.
///
/// Lists chain through `next`; the concatenated payloads of all referenced
/// blocks form the group's record stream.
#[derive(Debug, Clone)]
pub struct DataListBlock {
    pub next: u64,
    pub data_links: Vec<u64>,
    pub flags: u8,
    pub data_block_nr: u32,
    /// Common block length when [`DL_FLAG_EQUAL_LENGTH`] is set.
    pub data_block_len: Option<u64>,
    /// Start of every block in the stream otherwise.
    pub offsets: Option<Vec<u64>>,
    /// Raw 8-byte master values at the start of each block.
    pub time_values: Option<Vec<u64>>,
    pub angle_values: Option<Vec<u64>>,
    pub distance_values: Option<Vec<u64>>,
}

impl BlockParse for DataListBlock {
    fn parse(links: &[u64], data: &[u8], data_offset: u64) -> Result<Self> {
        validate_buffer_size(data, 8)?;
        let flags = read_u8(data, 0);
        let data_block_nr = read_u32(data, 4);
        let count = data_block_nr as usize;

        if links.is_empty() || links.len() - 1 < count {
            return Err(Error::corrupt(
                data_offset,
                format!(
                    "data list declares {count} blocks but carries {} links",
                    links.len().saturating_sub(1)
                ),
            ));
        }

        let mut off = 8;
        let mut array = |len: usize| -> Result<Vec<u64>> {
            validate_buffer_size(data, off + len * 8)?;
            let values = (0..len).map(|i| read_u64(data, off + i * 8)).collect();
            off += len * 8;
            Ok(values)
        };

        let (data_block_len, offsets) = if flags & DL_FLAG_EQUAL_LENGTH != 0 {
            (array(1)?.first().copied(), None)
        } else {
            (None, Some(array(count)?))
        };
        let time_values = if flags & DL_FLAG_TIME_VALUES != 0 {
            Some(array(count)?)
        } else {
            None
        };
        let angle_values = if flags & DL_FLAG_ANGLE_VALUES != 0 {
            Some(array(count)?)
        } else {
            None
        };
        let distance_values = if flags & DL_FLAG_DISTANCE_VALUES != 0 {
            Some(array(count)?)
        } else {
            None
        };

        Ok(Self {
            next: link(links, 0),
            data_links: links[1..=count].to_vec(),
            flags,
            data_block_nr,
            data_block_len,
            offsets,
            time_values,
            angle_values,
            distance_values,
        })
    }
}
