//! A structural report of the whole block graph.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use super::MdfFile;
use crate::{Result, blocks::BlockPayload};

/// Block counts and data volumes of an opened file.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileSummary {
    pub version: u16,
    pub program: String,
    pub finalized: bool,
    pub channel_groups: usize,
    pub channels: usize,
    /// Groups sharing their data group with other groups.
    pub unsorted_groups: usize,
    /// Reachable blocks per tag, e.g. `"CN" -> 12`.
    pub block_counts: BTreeMap<String, u64>,
    /// Payload bytes of DT blocks.
    pub raw_data_bytes: u64,
    pub zipped_blocks: u64,
    pub compressed_bytes: u64,
    /// Bytes the DZ blocks inflate to.
    pub inflated_bytes: u64,
}

impl FileSummary {
    /// Walks every block reachable from the header.
    pub(crate) fn collect(file: &MdfFile) -> Result<Self> {
        let mut summary = FileSummary {
            version: file.identification.version_number,
            program: file.identification.program_id.trim().to_string(),
            finalized: file.identification.is_finalized(),
            channel_groups: file.groups.len(),
            channels: file.groups.iter().map(|g| g.raw_channels.len()).sum(),
            unsorted_groups: file.groups.iter().filter(|g| !g.sorted).count(),
            ..FileSummary::default()
        };

        let mut visited = HashSet::new();
        let mut pending = vec![crate::blocks::HD_BLOCK_OFFSET];
        while let Some(offset) = pending.pop() {
            if offset == 0 || !visited.insert(offset) {
                continue;
            }
            let block = file.store.require(offset, "linked block")?;
            *summary
                .block_counts
                .entry(block.kind.tag().to_string())
                .or_default() += 1;
            match &block.payload {
                BlockPayload::Data(dt) => summary.raw_data_bytes += dt.data_length,
                BlockPayload::Zipped(dz) => {
                    summary.zipped_blocks += 1;
                    summary.compressed_bytes += dz.compressed_data_length;
                    summary.inflated_bytes += dz.original_data_length;
                }
                _ => {}
            }
            pending.extend(block.links.iter().rev().copied());
        }

        debug!(blocks = visited.len(), "collected file summary");
        Ok(summary)
    }

    /// Inflated over compressed size of the DZ blocks.
    pub fn compression_ratio(&self) -> Option<f64> {
        (self.compressed_bytes > 0).then(|| self.inflated_bytes as f64 / self.compressed_bytes as f64)
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
