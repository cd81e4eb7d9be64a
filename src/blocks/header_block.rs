// src/blocks/header_block.rs
use crate::{
    Result,
    blocks::{
        HD_DATA_SIZE,
        common::{
            BlockParse, link, read_f64, read_i16, read_u8, read_u64,
            validate_buffer_size,
        },
    },
};

#[derive(Debug, Clone)]
pub struct HeaderBlock {
    pub first_dg_addr: u64,
    pub file_history_addr: u64,
    pub channel_tree_addr: u64,
    pub first_attachment_addr: u64,
    pub first_event_addr: u64,
    pub comment_addr: u64,
    /// Start of measurement in nanoseconds since the Unix epoch.
    pub abs_time: u64,
    pub tz_offset: i16,
    pub daylight_save_time: i16,
    pub time_flags: u8,
    pub time_quality: u8,
    pub flags: u8,
    pub start_angle: f64,
    pub start_distance: f64,
}

impl BlockParse for HeaderBlock {
    fn parse(links: &[u64], data: &[u8], _data_offset: u64) -> Result<Self> {
        validate_buffer_size(data, HD_DATA_SIZE)?;
        Ok(Self {
            first_dg_addr: link(links, 0),
            file_history_addr: link(links, 1),
            channel_tree_addr: link(links, 2),
            first_attachment_addr: link(links, 3),
            first_event_addr: link(links, 4),
            comment_addr: link(links, 5),
            abs_time: read_u64(data, 0),
            tz_offset: read_i16(data, 8),
            daylight_save_time: read_i16(data, 10),
            time_flags: read_u8(data, 12),
            time_quality: read_u8(data, 13),
            flags: read_u8(data, 14),
            start_angle: read_f64(data, 16),
            start_distance: read_f64(data, 24),
        })
    }
}
