use crate::{
    Result,
    blocks::{
        CN_DATA_SIZE,
        common::{
            BlockParse, DataType, link, read_f64, read_u8, read_u16, read_u32,
            validate_buffer_size,
        },
    },
};

/// Channel types stored in `cn_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChannelType {
    FixedLength,
    VariableLength,
    Master,
    VirtualMaster,
    Synchronization,
    MaxLengthData,
    VirtualData,
    Unknown(u8),
}

impl ChannelType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ChannelType::FixedLength,
            1 => ChannelType::VariableLength,
            2 => ChannelType::Master,
            3 => ChannelType::VirtualMaster,
            4 => ChannelType::Synchronization,
            5 => ChannelType::MaxLengthData,
            6 => ChannelType::VirtualData,
            other => ChannelType::Unknown(other),
        }
    }

    pub fn is_master(self) -> bool {
        matches!(self, ChannelType::Master | ChannelType::VirtualMaster)
    }
}

/// Channel Block (##CN) - one signal inside a record.
#[derive(Debug, Clone)]
pub struct ChannelBlock {
    pub next_ch_addr: u64,
    pub component_addr: u64,
    pub name_addr: u64,
    pub source_addr: u64,
    pub conversion_addr: u64,
    pub data_addr: u64,
    pub unit_addr: u64,
    pub comment_addr: u64,
    pub channel_type: ChannelType,
    pub sync_type: u8,
    pub data_type: DataType,
    pub bit_offset: u8,
    /// Byte offset inside the record, not counting the record id.
    pub byte_offset: u32,
    pub bit_count: u32,
    pub flags: u32,
    pub pos_invalidation_bit: u32,
    pub precision: u8,
    pub attachment_count: u16,
    pub min_raw_value: f64,
    pub max_raw_value: f64,
    pub lower_limit: f64,
    pub upper_limit: f64,
    pub lower_ext_limit: f64,
    pub upper_ext_limit: f64,
}

impl BlockParse for ChannelBlock {
    fn parse(links: &[u64], data: &[u8], _data_offset: u64) -> Result<Self> {
        validate_buffer_size(data, CN_DATA_SIZE)?;
        Ok(Self {
            next_ch_addr: link(links, 0),
            component_addr: link(links, 1),
            name_addr: link(links, 2),
            source_addr: link(links, 3),
            conversion_addr: link(links, 4),
            data_addr: link(links, 5),
            unit_addr: link(links, 6),
            comment_addr: link(links, 7),
            channel_type: ChannelType::from_u8(read_u8(data, 0)),
            sync_type: read_u8(data, 1),
            data_type: DataType::from_u8(read_u8(data, 2)),
            bit_offset: read_u8(data, 3),
            byte_offset: read_u32(data, 4),
            bit_count: read_u32(data, 8),
            flags: read_u32(data, 12),
            pos_invalidation_bit: read_u32(data, 16),
            precision: read_u8(data, 20),
            attachment_count: read_u16(data, 22),
            min_raw_value: read_f64(data, 24),
            max_raw_value: read_f64(data, 32),
            lower_limit: read_f64(data, 40),
            upper_limit: read_f64(data, 48),
            lower_ext_limit: read_f64(data, 56),
            upper_ext_limit: read_f64(data, 64),
        })
    }
}
