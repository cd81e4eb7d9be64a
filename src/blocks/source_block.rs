use crate::{
    Result,
    blocks::{
        SI_DATA_SIZE,
        common::{BlockParse, link, read_u8, validate_buffer_size},
    },
};

/// Source Information Block (##SI) - where a group or channel was acquired.
#[derive(Debug, Clone)]
pub struct SourceBlock {
    pub name_addr: u64,
    pub path_addr: u64,
    pub comment_addr: u64,
    pub source_type: SourceType,
    pub bus_type: BusType,
    pub flags: u8,
}

/// Source type constants for SourceBlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceType {
    Other,
    Ecu,
    Bus,
    Io,
    Tool,
    User,
    Unknown(u8),
}

impl SourceType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => SourceType::Other,
            1 => SourceType::Ecu,
            2 => SourceType::Bus,
            3 => SourceType::Io,
            4 => SourceType::Tool,
            5 => SourceType::User,
            other => SourceType::Unknown(other),
        }
    }
}

/// Bus type constants for SourceBlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BusType {
    None,
    Other,
    Can,
    Lin,
    Most,
    FlexRay,
    KLine,
    Ethernet,
    Usb,
    Unknown(u8),
}

impl BusType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => BusType::None,
            1 => BusType::Other,
            2 => BusType::Can,
            3 => BusType::Lin,
            4 => BusType::Most,
            5 => BusType::FlexRay,
            6 => BusType::KLine,
            7 => BusType::Ethernet,
            8 => BusType::Usb,
            other => BusType::Unknown(other),
        }
    }
}

impl BlockParse for SourceBlock {
    fn parse(links: &[u64], data: &[u8], _data_offset: u64) -> Result<Self> {
        validate_buffer_size(data, SI_DATA_SIZE)?;
        Ok(Self {
            name_addr: link(links, 0),
            path_addr: link(links, 1),
            comment_addr: link(links, 2),
            source_type: SourceType::from_u8(read_u8(data, 0)),
            bus_type: BusType::from_u8(read_u8(data, 1)),
            flags: read_u8(data, 2),
        })
    }
}
