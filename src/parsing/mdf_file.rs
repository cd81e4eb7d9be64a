use tracing::{debug, debug_span};

use super::{BlockStore, FileBytes, RawChannel, RawChannelGroup};
use crate::{
    DecodeOptions, Result,
    blocks::{HD_BLOCK_OFFSET, IdentificationBlock},
    decode::{BufferFactory, ConversionCache},
    metrics::SamplerMetrics,
    pool::BufferPool,
};

/// An opened file: metadata tree, block cache and the shared decode state.
#[derive(Debug)]
pub struct MdfFile {
    pub identification: IdentificationBlock,
    pub groups: Vec<RawChannelGroup>,
    pub store: BlockStore,
    pub conversions: ConversionCache,
    pub buffers: BufferFactory,
    /// Inflate and transpose scratch space.
    pub scratch: BufferPool<u8>,
    /// Totals over all sampling calls.
    pub metrics: SamplerMetrics,
    pub options: DecodeOptions,
}

impl MdfFile {
    /// Parses the identification block and the DG/CG/CN tree of `bytes`.
    ///
    /// Data blocks are not touched until a group is sampled.
    pub fn parse(bytes: FileBytes, options: DecodeOptions) -> Result<Self> {
        options.validate()?;
        let _span = debug_span!("open", bytes = bytes.len()).entered();

        let identification = IdentificationBlock::from_bytes(&bytes)?;
        identification.validate()?;

        let store = BlockStore::new(bytes);
        let first_dg_addr = store
            .require(HD_BLOCK_OFFSET, "header block")?
            .as_header()?
            .first_dg_addr;

        let mut groups = Vec::new();
        let data_groups =
            store.chain(first_dg_addr, |block| Ok(block.as_data_group()?.next_dg_addr))?;
        for dg_block in &data_groups {
            let dg = dg_block.as_data_group()?;
            let channel_groups =
                store.chain(dg.first_cg_addr, |block| Ok(block.as_channel_group()?.next_cg_addr))?;
            let sorted = channel_groups.len() <= 1;
            if !sorted {
                debug!(
                    data_group = dg_block.offset,
                    groups = channel_groups.len(),
                    "unsorted data group"
                );
            }

            for cg_block in &channel_groups {
                let cg = cg_block.as_channel_group()?;
                let channels = store
                    .chain(cg.first_ch_addr, |block| Ok(block.as_channel()?.next_ch_addr))?
                    .iter()
                    .map(|cn| Ok(RawChannel::new(cn.offset, cn.as_channel()?.clone())))
                    .collect::<Result<Vec<_>>>()?;
                groups.push(RawChannelGroup::new(
                    cg_block.offset,
                    cg.clone(),
                    dg_block.offset,
                    dg.record_id_size,
                    dg.data_block_addr,
                    sorted,
                    channels,
                ));
            }
        }

        debug!(
            version = identification.version_number,
            groups = groups.len(),
            channels = groups.iter().map(|g| g.raw_channels.len()).sum::<usize>(),
            blocks = store.cached_blocks(),
            "parsed file tree"
        );

        Ok(Self {
            identification,
            groups,
            store,
            conversions: ConversionCache::new(),
            buffers: BufferFactory::new(options.allocation),
            scratch: BufferPool::new(),
            metrics: SamplerMetrics::new(),
            options,
        })
    }
}
