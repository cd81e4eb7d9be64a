use super::BlockStore;
use crate::{
    Result,
    blocks::{BusType, SourceType},
};

/// Readable view of an SI block: where a group or channel was acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceInfo {
    pub name: Option<String>,
    pub path: Option<String>,
    pub comment: Option<String>,
    pub source_type: SourceType,
    pub bus_type: BusType,
}

impl SourceInfo {
    /// Reads the SI block at `offset`; `Ok(None)` for the null link.
    pub fn read(store: &BlockStore, offset: u64) -> Result<Option<Self>> {
        let Some(block) = store.get(offset)? else {
            return Ok(None);
        };
        let si = block.as_source()?;
        Ok(Some(SourceInfo {
            name: store.text(si.name_addr)?,
            path: store.text(si.path_addr)?,
            comment: store.text(si.comment_addr)?,
            source_type: si.source_type,
            bus_type: si.bus_type,
        }))
    }
}
