//! The file's block graph and its in-memory tree of groups and channels.

mod block_store;
mod mdf_file;
mod raw_channel;
mod raw_channel_group;
mod source_info;
mod summary;

pub use block_store::{BlockStore, DataBlockMap, FileBytes, PhysicalBlock};
pub use source_info::SourceInfo;
pub use summary::FileSummary;

pub(crate) use mdf_file::MdfFile;
pub(crate) use raw_channel::RawChannel;
pub(crate) use raw_channel_group::RawChannelGroup;
