use crate::{
    Result,
    blocks::common::BlockParse,
};

fn decode_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_matches('\0')
        .to_string()
}

/// Text Block (##TX) - a null terminated UTF-8 string.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub text: String,
}

impl BlockParse for TextBlock {
    fn parse(_links: &[u64], data: &[u8], _data_offset: u64) -> Result<Self> {
        Ok(Self {
            text: decode_text(data),
        })
    }
}

/// Metadata Block (##MD) - an XML fragment, kept as text.
#[derive(Debug, Clone)]
pub struct MetadataBlock {
    pub xml: String,
}

impl MetadataBlock {
    /// Content of the `<TX>` element, if the fragment has one.
    pub fn tx(&self) -> Option<&str> {
        let start = self.xml.find("<TX>")? + 4;
        let end = self.xml[start..].find("</TX>")? + start;
        Some(self.xml[start..end].trim())
    }
}

impl BlockParse for MetadataBlock {
    fn parse(_links: &[u64], data: &[u8], _data_offset: u64) -> Result<Self> {
        Ok(Self {
            xml: decode_text(data),
        })
    }
}
