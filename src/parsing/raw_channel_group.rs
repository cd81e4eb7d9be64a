use std::sync::OnceLock;

use tracing::debug_span;

use super::{BlockStore, RawChannel};
use crate::{Error, Result, alignment::BlockLayout, blocks::ChannelGroupBlock, metrics::SamplerMetrics};

/// A channel group with its channels and lazily built block layout.
#[derive(Debug)]
pub struct RawChannelGroup {
    /// File offset of the CG block.
    pub offset: u64,
    pub block: ChannelGroupBlock,
    pub data_group_offset: u64,
    pub record_id_size: u8,
    /// First link of the data group's data chain.
    pub data_root: u64,
    /// The data group holds this group only.
    pub sorted: bool,
    pub raw_channels: Vec<RawChannel>,
    layout: OnceLock<BlockLayout>,
}

impl RawChannelGroup {
    pub fn new(
        offset: u64,
        block: ChannelGroupBlock,
        data_group_offset: u64,
        record_id_size: u8,
        data_root: u64,
        sorted: bool,
        raw_channels: Vec<RawChannel>,
    ) -> Self {
        Self {
            offset,
            block,
            data_group_offset,
            record_id_size,
            data_root,
            sorted,
            raw_channels,
            layout: OnceLock::new(),
        }
    }

    /// Bytes per record: record id, data bytes and invalidation bytes.
    pub fn record_length(&self) -> u64 {
        u64::from(self.record_id_size)
            + u64::from(self.block.samples_byte_nr)
            + u64::from(self.block.invalidation_bytes_nr)
    }

    pub fn sample_count(&self) -> u64 {
        self.block.cycles_nr
    }

    pub fn master_index(&self) -> Option<usize> {
        self.raw_channels
            .iter()
            .position(|ch| ch.block.channel_type.is_master())
    }

    /// The group's block layout, built on first use.
    pub fn layout(&self, store: &BlockStore, metrics: &SamplerMetrics) -> Result<&BlockLayout> {
        if let Some(layout) = self.layout.get() {
            return Ok(layout);
        }
        if self.block.is_vlsd() {
            return Err(Error::UnsupportedFeature(format!(
                "variable length signal data group at {:#x}",
                self.offset
            )));
        }
        if !self.sorted {
            return Err(Error::UnsupportedFeature(format!(
                "unsorted data group at {:#x}",
                self.data_group_offset
            )));
        }

        let _span = debug_span!("layout", group = self.offset).entered();
        let maps = store.data_blocks(self.data_root)?;
        let built = BlockLayout::build(&maps, self.record_length())?;
        if built.total_records() < self.block.cycles_nr {
            return Err(Error::corrupt(
                self.offset,
                format!(
                    "group declares {} records, data holds {}",
                    self.block.cycles_nr,
                    built.total_records()
                ),
            ));
        }
        if self.layout.set(built).is_ok() {
            metrics.layout_built();
        }
        self.layout
            .get()
            .ok_or_else(|| Error::UnexpectedExecutionPath("block layout vanished".into()))
    }
}
