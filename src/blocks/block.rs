//! The generic block node: header, link array and typed payload.

use crate::{
    Error, Result,
    blocks::{
        ChannelBlock, ChannelGroupBlock, ConversionBlock, DataBlock, DataGroupBlock,
        DataListBlock, DzBlock, HeaderBlock, HeaderListBlock, MetadataBlock, SourceBlock,
        TextBlock,
        common::{BLOCK_HEADER_SIZE, BlockHeader, BlockKind, BlockParse, read_u64, u64_to_usize},
    },
};

/// Typed contents of a block.
///
/// Kinds the decoder recognises but never reads (attachments, events, ...)
/// are kept as [`BlockPayload::Other`].
#[derive(Debug, Clone)]
pub enum BlockPayload {
    Header(HeaderBlock),
    DataGroup(DataGroupBlock),
    ChannelGroup(ChannelGroupBlock),
    Channel(ChannelBlock),
    Conversion(ConversionBlock),
    Text(TextBlock),
    Metadata(MetadataBlock),
    Source(SourceBlock),
    Data(DataBlock),
    DataList(DataListBlock),
    HeaderList(HeaderListBlock),
    Zipped(DzBlock),
    Other,
}

/// One parsed block of the file graph.
#[derive(Debug, Clone)]
pub struct Block {
    /// File offset of the block header.
    pub offset: u64,
    pub header: BlockHeader,
    pub kind: BlockKind,
    pub links: Vec<u64>,
    pub payload: BlockPayload,
}

impl Block {
    /// Parses the block that starts at `offset` of `file`.
    ///
    /// Reads the header, rejects unknown tags and impossible lengths, reads
    /// the link array and hands the remaining bytes to the kind's payload
    /// parser. Nothing here follows links.
    pub fn parse(file: &[u8], offset: u64) -> Result<Self> {
        let start = u64_to_usize(offset, "block offset")?;
        if start
            .checked_add(BLOCK_HEADER_SIZE)
            .is_none_or(|end| end > file.len())
        {
            return Err(Error::corrupt(offset, "block header lies past the end of the file"));
        }
        let header = BlockHeader::from_bytes(&file[start..])?;
        let kind = BlockKind::from_tag(header.tag()).ok_or_else(|| {
            Error::corrupt(offset, format!("unknown block tag {:?}", header.id))
        })?;

        let payload_start = header.payload_start();
        if header.link_count > (u64::MAX - BLOCK_HEADER_SIZE as u64) / 8
            || header.length < payload_start
        {
            return Err(Error::corrupt(
                offset,
                format!(
                    "block length {} cannot hold {} links",
                    header.length, header.link_count
                ),
            ));
        }
        let end = offset
            .checked_add(header.length)
            .filter(|&end| end <= file.len() as u64)
            .ok_or_else(|| {
                Error::corrupt(
                    offset,
                    format!("block length {} runs past the end of the file", header.length),
                )
            })?;
        let end = u64_to_usize(end, "block end")?;
        let data_start = start + u64_to_usize(payload_start, "link array")?;

        let links: Vec<u64> = (0..header.link_count as usize)
            .map(|i| read_u64(file, start + BLOCK_HEADER_SIZE + i * 8))
            .collect();
        let data = &file[data_start..end];
        let data_offset = data_start as u64;

        fn typed<T: BlockParse>(links: &[u64], data: &[u8], at: u64) -> Result<T> {
            T::parse(links, data, at)
        }
        let payload = match kind {
            BlockKind::Header => BlockPayload::Header(typed(&links, data, data_offset)?),
            BlockKind::DataGroup => BlockPayload::DataGroup(typed(&links, data, data_offset)?),
            BlockKind::ChannelGroup => {
                BlockPayload::ChannelGroup(typed(&links, data, data_offset)?)
            }
            BlockKind::Channel => BlockPayload::Channel(typed(&links, data, data_offset)?),
            BlockKind::Conversion => BlockPayload::Conversion(typed(&links, data, data_offset)?),
            BlockKind::Text => BlockPayload::Text(typed(&links, data, data_offset)?),
            BlockKind::Metadata => BlockPayload::Metadata(typed(&links, data, data_offset)?),
            BlockKind::Source => BlockPayload::Source(typed(&links, data, data_offset)?),
            BlockKind::Data => BlockPayload::Data(typed(&links, data, data_offset)?),
            BlockKind::DataList => BlockPayload::DataList(typed(&links, data, data_offset)?),
            BlockKind::HeaderList => BlockPayload::HeaderList(typed(&links, data, data_offset)?),
            BlockKind::Zipped => BlockPayload::Zipped(typed(&links, data, data_offset)?),
            _ => BlockPayload::Other,
        };

        Ok(Self {
            offset,
            header,
            kind,
            links,
            payload,
        })
    }

    /// Error for a link that resolved to the wrong kind of block.
    pub fn unexpected(&self, expected: &str) -> Error {
        Error::BlockIDError {
            actual: self.header.id.clone(),
            expected: expected.to_string(),
        }
    }
}

macro_rules! payload_accessor {
    ($name:ident, $variant:ident, $ty:ty, $tag:literal) => {
        impl Block {
            #[doc = concat!("The payload as a `", $tag, "` block.")]
            pub fn $name(&self) -> Result<&$ty> {
                match &self.payload {
                    BlockPayload::$variant(inner) => Ok(inner),
                    _ => Err(self.unexpected($tag)),
                }
            }
        }
    };
}

payload_accessor!(as_header, Header, HeaderBlock, "##HD");
payload_accessor!(as_data_group, DataGroup, DataGroupBlock, "##DG");
payload_accessor!(as_channel_group, ChannelGroup, ChannelGroupBlock, "##CG");
payload_accessor!(as_channel, Channel, ChannelBlock, "##CN");
payload_accessor!(as_conversion, Conversion, ConversionBlock, "##CC");
payload_accessor!(as_source, Source, SourceBlock, "##SI");
payload_accessor!(as_data_list, DataList, DataListBlock, "##DL");
