//! Offset-keyed cache of parsed blocks over the file bytes.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::ops::Deref;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use memmap2::Mmap;
use tracing::{debug, trace};

use crate::{
    Error, Result,
    blocks::{Block, BlockKind, BlockPayload, DataBlock, DataListBlock, DzBlock},
};

/// The bytes of an opened file.
#[derive(Debug)]
pub enum FileBytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl FileBytes {
    /// Maps `path` read-only.
    #[allow(unsafe_code)]
    pub fn map(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only; the file must not be truncated
        // while it is open, as with any memory-mapped reader.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(FileBytes::Mapped(mmap))
    }
}

impl Deref for FileBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            FileBytes::Mapped(mmap) => mmap,
            FileBytes::Owned(bytes) => bytes,
        }
    }
}

/// A data storage block together with its place in the record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicalBlock {
    Raw(DataBlock),
    Zipped(DzBlock),
}

impl PhysicalBlock {
    /// Number of record bytes the block contributes, after decompression.
    pub fn byte_length(&self) -> u64 {
        match self {
            PhysicalBlock::Raw(dt) => dt.data_length,
            PhysicalBlock::Zipped(dz) => dz.original_data_length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlockMap {
    /// File offset of the DT or DZ block header.
    pub block_offset: u64,
    /// Position of the block's first byte in the group's record stream.
    pub byte_position: u64,
    pub block: PhysicalBlock,
}

/// Parses blocks on demand and keeps one shared copy per file offset.
///
/// Parsing a block only looks at that block's own bytes, so the cache lock is
/// never held while parsing and two threads racing on the same offset simply
/// keep whichever result lands first.
#[derive(Debug)]
pub struct BlockStore {
    bytes: FileBytes,
    cache: RwLock<HashMap<u64, Arc<Block>>>,
}

impl BlockStore {
    pub fn new(bytes: FileBytes) -> Self {
        Self {
            bytes,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Block at `offset`, `None` for the null link.
    pub fn get(&self, offset: u64) -> Result<Option<Arc<Block>>> {
        if offset == 0 {
            return Ok(None);
        }
        let cached = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&offset)
            .cloned();
        if let Some(block) = cached {
            return Ok(Some(block));
        }

        let parsed = Arc::new(Block::parse(&self.bytes, offset)?);
        trace!(offset, kind = %parsed.kind, "parsed block");
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Some(Arc::clone(cache.entry(offset).or_insert(parsed))))
    }

    /// Block at `offset`, which must not be the null link.
    pub fn require(&self, offset: u64, what: &str) -> Result<Arc<Block>> {
        self.get(offset)?
            .ok_or_else(|| Error::corrupt(0, format!("null link where {what} was required")))
    }

    /// Number of distinct blocks parsed so far.
    pub fn cached_blocks(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Text of a TX block, or the `<TX>` content of an MD block.
    pub fn text(&self, offset: u64) -> Result<Option<String>> {
        let Some(block) = self.get(offset)? else {
            return Ok(None);
        };
        match &block.payload {
            BlockPayload::Text(tx) => Ok(Some(tx.text.clone())),
            BlockPayload::Metadata(md) => {
                Ok(Some(md.tx().map(str::to_string).unwrap_or_else(|| md.xml.clone())))
            }
            _ => Err(block.unexpected("##TX or ##MD")),
        }
    }

    /// Follows a `next` chain starting at `first`.
    ///
    /// Visiting an offset twice means the chain loops, which is reported as
    /// a corrupt file.
    pub fn chain(&self, first: u64, next: impl Fn(&Block) -> Result<u64>) -> Result<Vec<Arc<Block>>> {
        let mut visited = HashSet::new();
        let mut blocks = Vec::new();
        let mut offset = first;
        while offset != 0 {
            if !visited.insert(offset) {
                return Err(Error::corrupt(offset, "block chain loops back on itself"));
            }
            let block = self.require(offset, "chain element")?;
            offset = next(&block)?;
            blocks.push(block);
        }
        Ok(blocks)
    }

    /// Flattens the data root of a data group into its DT/DZ blocks in
    /// stream order.
    pub fn data_blocks(&self, root: u64) -> Result<Vec<DataBlockMap>> {
        let Some(block) = self.get(root)? else {
            return Ok(Vec::new());
        };
        let maps = match &block.payload {
            BlockPayload::DataList(_) => self.data_list_blocks(root)?,
            BlockPayload::HeaderList(hl) => self.data_list_blocks(hl.first_dl_addr)?,
            _ => vec![DataBlockMap {
                block_offset: root,
                byte_position: 0,
                block: self.leaf(&block)?,
            }],
        };
        debug!(root, blocks = maps.len(), "resolved data blocks");
        Ok(maps)
    }

    fn data_list_blocks(&self, first_dl: u64) -> Result<Vec<DataBlockMap>> {
        let lists = self.chain(first_dl, |block| Ok(block.as_data_list()?.next))?;

        let mut maps = Vec::new();
        let mut position = 0u64;
        for list in &lists {
            let dl = list.as_data_list()?;
            for (index, &link) in dl.data_links.iter().enumerate() {
                check_declared_offset(dl, list.offset, index, maps.len(), position)?;
                let block = self.require(link, "data list entry")?;
                let physical = self.leaf(&block)?;
                maps.push(DataBlockMap {
                    block_offset: link,
                    byte_position: position,
                    block: physical,
                });
                position += physical.byte_length();
            }
        }
        Ok(maps)
    }

    fn leaf(&self, block: &Block) -> Result<PhysicalBlock> {
        match &block.payload {
            BlockPayload::Data(dt) => Ok(PhysicalBlock::Raw(*dt)),
            BlockPayload::Zipped(dz) => match dz.original_kind() {
                Some(BlockKind::Data) => Ok(PhysicalBlock::Zipped(*dz)),
                _ => Err(Error::UnsupportedFeature(format!(
                    "DZ block at {:#x} wraps {:?} data",
                    block.offset,
                    String::from_utf8_lossy(&dz.original_block_type)
                ))),
            },
            _ if block.kind.is_data_storage() => Err(Error::UnsupportedFeature(format!(
                "{} data blocks",
                block.kind
            ))),
            _ => Err(block.unexpected("##DT, ##DZ, ##DL or ##HL")),
        }
    }
}

/// Compares a list's declared block start with the running stream total.
fn check_declared_offset(
    dl: &DataListBlock,
    list_offset: u64,
    index: usize,
    global_index: usize,
    position: u64,
) -> Result<()> {
    let declared = match (&dl.offsets, dl.data_block_len) {
        (Some(offsets), _) => offsets.get(index).copied(),
        (None, Some(len)) => Some(len * global_index as u64),
        (None, None) => None,
    };
    match declared {
        Some(declared) if declared != position => Err(Error::corrupt(
            list_offset,
            format!("data list places block {index} at {declared}, blocks add up to {position}"),
        )),
        _ => Ok(()),
    }
}
