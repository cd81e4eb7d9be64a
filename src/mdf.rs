use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    DecodeOptions, Error, Result, UnsupportedPolicy,
    blocks::IdentificationBlock,
    channel::Channel,
    channel_group::ChannelGroup,
    metrics::MetricsSnapshot,
    parsing::{FileBytes, FileSummary, MdfFile},
};

/// High level representation of an opened MDF4 file.
///
/// The file is memory mapped for as long as the value lives. Opening parses
/// the group and channel tree only; data blocks are read when a group is
/// sampled.
#[derive(Debug)]
pub struct Mdf4File {
    raw: MdfFile,
}

impl Mdf4File {
    /// Map and parse an MDF4 file with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, DecodeOptions::default())
    }

    /// Map and parse an MDF4 file.
    ///
    /// # Returns
    /// A new [`Mdf4File`] on success or [`crate::Error`] when the file cannot
    /// be mapped, is not MDF 4, or its block tree is broken.
    pub fn open_with(path: impl AsRef<Path>, options: DecodeOptions) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening file");
        let bytes = FileBytes::map(path)?;
        Ok(Self {
            raw: MdfFile::parse(bytes, options)?,
        })
    }

    /// Parse a file held in memory with default options.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with(bytes, DecodeOptions::default())
    }

    pub fn from_bytes_with(bytes: Vec<u8>, options: DecodeOptions) -> Result<Self> {
        Ok(Self {
            raw: MdfFile::parse(FileBytes::Owned(bytes), options)?,
        })
    }

    pub fn identification(&self) -> &IdentificationBlock {
        &self.raw.identification
    }

    /// Version number, e.g. `410` for MDF 4.10.
    pub fn version(&self) -> u16 {
        self.raw.identification.version_number
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.raw.options
    }

    /// Retrieve channel groups contained in the file.
    pub fn channel_groups(&self) -> Vec<ChannelGroup<'_>> {
        self.raw
            .groups
            .iter()
            .map(|group| ChannelGroup::new(&self.raw, group))
            .collect()
    }

    /// All channels of all groups, in file order.
    pub fn channels(&self) -> Vec<Channel<'_>> {
        self.channel_groups()
            .iter()
            .flat_map(|group| group.channels())
            .collect()
    }

    /// First channel named `name`.
    pub fn find_channel(&self, name: &str) -> Result<Option<Channel<'_>>> {
        for channel in self.channels() {
            if channel.name()?.as_deref() == Some(name) {
                return Ok(Some(channel));
            }
        }
        Ok(None)
    }

    /// Builds every group's block layout and every channel's decoder.
    ///
    /// Sampling does this lazily; calling it up front keeps that work out of
    /// the first sampling calls. Unsupported groups and channels are skipped
    /// under [`UnsupportedPolicy::Lenient`].
    pub fn prepare(&self) -> Result<()> {
        let lenient = self.raw.options.unsupported == UnsupportedPolicy::Lenient;
        let tolerate = |result: Result<()>, what: &str, offset: u64| match result {
            Err(e) if lenient && e.is_unsupported() => {
                warn!(offset, error = %e, "{what} left unprepared");
                Ok(())
            }
            other => other,
        };

        self.channel_groups().par_iter().try_for_each(|group| {
            tolerate(group.layout().map(|_| ()), "group", group.offset())?;
            for channel in group.channels() {
                tolerate(channel.decoder_spec().map(|_| ()), "channel", channel.offset())?;
            }
            Ok::<(), Error>(())
        })
    }

    /// Block statistics of the whole file.
    pub fn summary(&self) -> Result<FileSummary> {
        FileSummary::collect(&self.raw)
    }

    /// Totals over every sampling call made on this file.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.raw.metrics.snapshot()
    }

    /// Number of distinct blocks parsed so far.
    pub fn cached_blocks(&self) -> usize {
        self.raw.store.cached_blocks()
    }

    /// Releases the mapping. Equivalent to dropping the file.
    pub fn dispose(self) {
        debug!(blocks = self.raw.store.cached_blocks(), "closing file");
    }
}
