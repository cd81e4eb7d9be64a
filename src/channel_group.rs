use std::fmt;
use std::ptr;

use crate::{
    Result,
    alignment::{BlockLayout, BlockLoadingInfo},
    channel::Channel,
    parsing::{MdfFile, RawChannelGroup, SourceInfo},
    sampler::Sampler,
};

/// High level wrapper for a channel group.
///
/// References the group's raw blocks and gives access to its metadata,
/// channels and block layout without decoding any samples.
#[derive(Clone, Copy)]
pub struct ChannelGroup<'a> {
    file: &'a MdfFile,
    raw: &'a RawChannelGroup,
}

impl<'a> ChannelGroup<'a> {
    pub(crate) fn new(file: &'a MdfFile, raw: &'a RawChannelGroup) -> Self {
        ChannelGroup { file, raw }
    }

    /// Retrieve the acquisition name of the group.
    pub fn name(&self) -> Result<Option<String>> {
        self.file.store.text(self.raw.block.acq_name_addr)
    }

    /// Retrieve the group comment if present.
    pub fn comment(&self) -> Result<Option<String>> {
        self.file.store.text(self.raw.block.comment_addr)
    }

    /// Get the acquisition source information if available.
    pub fn source(&self) -> Result<Option<SourceInfo>> {
        SourceInfo::read(&self.file.store, self.raw.block.acq_source_addr)
    }

    /// File offset of the CG block.
    pub fn offset(&self) -> u64 {
        self.raw.offset
    }

    pub fn record_id_size(&self) -> u8 {
        self.raw.record_id_size
    }

    /// Bytes per record, record id and invalidation bytes included.
    pub fn record_length(&self) -> u64 {
        self.raw.record_length()
    }

    /// Number of records the group declares.
    pub fn sample_count(&self) -> u64 {
        self.raw.sample_count()
    }

    /// Whether the group owns its data group's record stream alone.
    pub fn is_sorted(&self) -> bool {
        self.raw.sorted
    }

    /// Build channel handles for every channel in this group.
    pub fn channels(&self) -> Vec<Channel<'a>> {
        self.raw
            .raw_channels
            .iter()
            .map(|raw| Channel::new(self.file, self.raw, raw))
            .collect()
    }

    pub fn master_channel(&self) -> Option<Channel<'a>> {
        self.raw
            .master_index()
            .map(|i| Channel::new(self.file, self.raw, &self.raw.raw_channels[i]))
    }

    /// The group's block layout, built on first use.
    pub fn layout(&self) -> Result<&'a BlockLayout> {
        self.raw.layout(&self.file.store, &self.file.metrics)
    }

    pub fn block_loading_infos(&self) -> Result<&'a [BlockLoadingInfo]> {
        Ok(self.layout()?.blocks())
    }

    /// Decodes records `first_sample..first_sample + sample_count` of all
    /// channels, widened to whole blocks.
    pub fn sample(&self, first_sample: u64, sample_count: u64) -> Result<Sampler<'a>> {
        Sampler::create_for_group(&self.channels(), first_sample, sample_count)
    }

    /// Decodes every record of all channels.
    pub fn load_all(&self) -> Result<Sampler<'a>> {
        self.sample(0, self.sample_count())
    }

    pub(crate) fn file(&self) -> &'a MdfFile {
        self.file
    }
}

impl PartialEq for ChannelGroup<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.raw, other.raw)
    }
}

impl Eq for ChannelGroup<'_> {}

impl fmt::Debug for ChannelGroup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelGroup")
            .field("offset", &self.raw.offset)
            .field("record_length", &self.raw.record_length())
            .field("sample_count", &self.raw.sample_count())
            .field("channels", &self.raw.raw_channels.len())
            .finish()
    }
}
