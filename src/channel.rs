use std::fmt;
use std::ptr;

use crate::{
    Result,
    blocks::{ChannelBlock, ChannelType, DataType},
    channel_group::ChannelGroup,
    decode::{SampleBuffer, ValueDecoderSpec},
    parsing::{MdfFile, RawChannel, RawChannelGroup, SourceInfo},
};

/// High level handle for a single channel within a group.
///
/// It borrows the opened file and gives access to metadata and to the
/// channel's decoder. Samples are produced by [`crate::Sampler`].
#[derive(Clone, Copy)]
pub struct Channel<'a> {
    file: &'a MdfFile,
    group: &'a RawChannelGroup,
    raw: &'a RawChannel,
}

impl<'a> Channel<'a> {
    pub(crate) fn new(file: &'a MdfFile, group: &'a RawChannelGroup, raw: &'a RawChannel) -> Self {
        Channel { file, group, raw }
    }

    /// Retrieve the channel name if present.
    pub fn name(&self) -> Result<Option<String>> {
        self.file.store.text(self.raw.block.name_addr)
    }

    /// Retrieve the physical unit description.
    pub fn unit(&self) -> Result<Option<String>> {
        self.file.store.text(self.raw.block.unit_addr)
    }

    /// Retrieve the channel comment if present.
    pub fn comment(&self) -> Result<Option<String>> {
        self.file.store.text(self.raw.block.comment_addr)
    }

    /// Get the acquisition source for this channel if available.
    pub fn source(&self) -> Result<Option<SourceInfo>> {
        SourceInfo::read(&self.file.store, self.raw.block.source_addr)
    }

    pub fn channel_type(&self) -> ChannelType {
        self.raw.block.channel_type
    }

    pub fn data_type(&self) -> DataType {
        self.raw.block.data_type
    }

    pub fn is_master(&self) -> bool {
        self.raw.block.channel_type.is_master()
    }

    /// The master channel of this channel's group, `None` if the group has
    /// none or this channel is the master.
    pub fn master(&self) -> Option<Channel<'a>> {
        self.group().master_channel().filter(|master| master != self)
    }

    pub fn group(&self) -> ChannelGroup<'a> {
        ChannelGroup::new(self.file, self.group)
    }

    /// File offset of the CN block.
    pub fn offset(&self) -> u64 {
        self.raw.offset
    }

    /// Get the channel block (for internal use)
    pub fn block(&self) -> &'a ChannelBlock {
        &self.raw.block
    }

    /// Layout, conversion and display rule of the channel.
    pub fn decoder_spec(&self) -> Result<&'a ValueDecoderSpec> {
        self.raw.decoder_spec(self.group, self.file)
    }

    /// A zeroed buffer of `len` samples for this channel.
    ///
    /// With `no_conversion` the buffer yields raw values.
    pub fn create_buffer(&self, len: usize, no_conversion: bool) -> Result<SampleBuffer> {
        let spec = self.decoder_spec()?;
        self.file.buffers.allocate(spec, len, no_conversion)
    }

    /// Text for a physical value: the value-to-text entry when the channel
    /// has one, the number otherwise.
    pub fn display_value(&self, value: f64) -> Result<String> {
        Ok(self.decoder_spec()?.display.display(value))
    }

    pub(crate) fn file(&self) -> &'a MdfFile {
        self.file
    }

    pub(crate) fn raw_group(&self) -> &'a RawChannelGroup {
        self.group
    }
}

impl PartialEq for Channel<'_> {
    fn eq(&self, other: &Self) -> bool {
        ptr::eq(self.raw, other.raw)
    }
}

impl Eq for Channel<'_> {}

impl fmt::Debug for Channel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("offset", &self.raw.offset)
            .field("group", &self.group.offset)
            .field("channel_type", &self.raw.block.channel_type)
            .field("data_type", &self.raw.block.data_type)
            .finish()
    }
}
