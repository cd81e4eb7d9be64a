use crate::{
    Result,
    blocks::{
        CG_DATA_SIZE,
        common::{BlockParse, link, read_u16, read_u32, read_u64, validate_buffer_size},
    },
};

/// Channel group flag: records have variable length (VLSD group).
pub const CG_FLAG_VLSD: u16 = 0x0001;
/// Channel group flag: the group carries a link to its remote master.
pub const CG_FLAG_REMOTE_MASTER: u16 = 0x0008;

/// Channel Group Block (##CG) - channels that share one record layout.
#[derive(Debug, Clone)]
pub struct ChannelGroupBlock {
    pub next_cg_addr: u64,
    pub first_ch_addr: u64,
    pub acq_name_addr: u64,
    pub acq_source_addr: u64,
    pub first_sample_reduction_addr: u64,
    pub comment_addr: u64,
    /// Present only when [`CG_FLAG_REMOTE_MASTER`] is set.
    pub master_cg_addr: u64,
    pub record_id: u64,
    /// Number of records (samples) of this group.
    pub cycles_nr: u64,
    pub flags: u16,
    pub path_separator: u16,
    /// Data bytes per record, excluding the record id.
    pub samples_byte_nr: u32,
    /// Invalidation bytes appended to every record.
    pub invalidation_bytes_nr: u32,
}

impl ChannelGroupBlock {
    pub fn is_vlsd(&self) -> bool {
        self.flags & CG_FLAG_VLSD != 0
    }
}

impl BlockParse for ChannelGroupBlock {
    fn parse(links: &[u64], data: &[u8], _data_offset: u64) -> Result<Self> {
        validate_buffer_size(data, CG_DATA_SIZE)?;
        let flags = read_u16(data, 16);
        Ok(Self {
            next_cg_addr: link(links, 0),
            first_ch_addr: link(links, 1),
            acq_name_addr: link(links, 2),
            acq_source_addr: link(links, 3),
            first_sample_reduction_addr: link(links, 4),
            comment_addr: link(links, 5),
            master_cg_addr: if flags & CG_FLAG_REMOTE_MASTER != 0 {
                link(links, 6)
            } else {
                0
            },
            record_id: read_u64(data, 0),
            cycles_nr: read_u64(data, 8),
            flags,
            path_separator: read_u16(data, 18),
            samples_byte_nr: read_u32(data, 24),
            invalidation_bytes_nr: read_u32(data, 28),
        })
    }
}
