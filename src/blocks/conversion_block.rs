use crate::{
    Result,
    blocks::common::{
        BlockParse, link, read_f64, read_u8, read_u16, validate_buffer_size,
    },
};

/// Represents the conversion type (cc_type) from a conversion block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConversionType {
    /// 0: 1:1 conversion (no change)
    Identity,
    /// 1: Linear conversion
    Linear,
    /// 2: Rational conversion
    Rational,
    /// 3: Algebraic conversion (MCD-2 MC text formula)
    Algebraic,
    /// 4: Value to value tabular look-up with interpolation
    TableLookupInterp,
    /// 5: Value to value tabular look-up without interpolation
    TableLookupNoInterp,
    /// 6: Value range to value tabular look-up
    RangeLookup,
    /// 7: Value to text/scale conversion tabular look-up
    ValueToText,
    /// 8: Value range to text/scale conversion tabular look-up
    RangeToText,
    /// 9: Text to value tabular look-up
    TextToValue,
    /// 10: Text to text tabular look-up (translation)
    TextToText,
    /// 11: Bitfield text table
    BitfieldText,
    /// For any other unrecognized conversion type.
    Unknown(u8),
}

impl ConversionType {
    /// Converts a raw u8 value to the corresponding ConversionType.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ConversionType::Identity,
            1 => ConversionType::Linear,
            2 => ConversionType::Rational,
            3 => ConversionType::Algebraic,
            4 => ConversionType::TableLookupInterp,
            5 => ConversionType::TableLookupNoInterp,
            6 => ConversionType::RangeLookup,
            7 => ConversionType::ValueToText,
            8 => ConversionType::RangeToText,
            9 => ConversionType::TextToValue,
            10 => ConversionType::TextToText,
            11 => ConversionType::BitfieldText,
            other => ConversionType::Unknown(other),
        }
    }
}

/// Conversion Block (##CC) - raw-to-physical mapping of a channel.
#[derive(Debug, Clone)]
pub struct ConversionBlock {
    pub name_addr: u64,
    pub unit_addr: u64,
    pub comment_addr: u64,
    pub inverse_addr: u64,
    /// Extra links (texts or nested conversions) used by table conversions.
    pub refs: Vec<u64>,
    pub conversion_type: ConversionType,
    pub precision: u8,
    pub flags: u16,
    pub ref_count: u16,
    pub value_count: u16,
    pub phys_range_min: Option<f64>,
    pub phys_range_max: Option<f64>,
    pub values: Vec<f64>,
}

impl BlockParse for ConversionBlock {
    fn parse(links: &[u64], data: &[u8], _data_offset: u64) -> Result<Self> {
        validate_buffer_size(data, 8)?;
        let value_count = read_u16(data, 6);
        let values_len = value_count as usize * 8;

        // Some writers always emit the physical range, flag or not; decide by size.
        let has_range = data.len() >= 8 + 16 + values_len;
        let values_start = if has_range { 24 } else { 8 };
        validate_buffer_size(data, values_start + values_len)?;

        Ok(Self {
            name_addr: link(links, 0),
            unit_addr: link(links, 1),
            comment_addr: link(links, 2),
            inverse_addr: link(links, 3),
            refs: links.iter().skip(4).copied().collect(),
            conversion_type: ConversionType::from_u8(read_u8(data, 0)),
            precision: read_u8(data, 1),
            flags: read_u16(data, 2),
            ref_count: read_u16(data, 4),
            value_count,
            phys_range_min: has_range.then(|| read_f64(data, 8)),
            phys_range_max: has_range.then(|| read_f64(data, 16)),
            values: (0..value_count as usize)
                .map(|i| read_f64(data, values_start + i * 8))
                .collect(),
        })
    }
}
