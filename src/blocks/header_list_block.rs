use crate::{
    Result,
    blocks::common::{BlockParse, link, read_u8, read_u16, validate_buffer_size},
};

/// Header List Block (##HL) - marks a data list whose blocks are compressed.
#[derive(Debug, Clone)]
pub struct HeaderListBlock {
    pub first_dl_addr: u64,
    pub flags: u16,
    pub zip_type: u8,
}

impl BlockParse for HeaderListBlock {
    fn parse(links: &[u64], data: &[u8], _data_offset: u64) -> Result<Self> {
        validate_buffer_size(data, 3)?;
        Ok(Self {
            first_dl_addr: link(links, 0),
            flags: read_u16(data, 0),
            zip_type: read_u8(data, 2),
        })
    }
}
