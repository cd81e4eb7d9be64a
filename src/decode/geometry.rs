//! Bit-field layout of a channel inside its record.
//!
//! Everything here is computed once per channel and then drives kernel
//! selection; no field of [`RawDecoderSpec`] is recomputed per sample.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// What the raw bits represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementKind {
    Unsigned,
    Signed,
    Float,
    /// Fixed length ISO-8859-1 string.
    AnsiString,
    /// Fixed length UTF-8 string.
    Utf8String,
    ByteArray,
}

/// The machine type a numeric field is read as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NativeKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Unsupported,
}

impl NativeKind {
    /// Width of the native type in bits.
    pub fn bits(self) -> u32 {
        match self {
            NativeKind::U8 | NativeKind::I8 => 8,
            NativeKind::U16 | NativeKind::I16 => 16,
            NativeKind::U32 | NativeKind::I32 | NativeKind::F32 => 32,
            NativeKind::U64 | NativeKind::I64 | NativeKind::F64 => 64,
            NativeKind::Unsupported => 0,
        }
    }

    fn integer(bit_length: u32, signed: bool) -> Self {
        match (bit_length, signed) {
            (1..=8, false) => NativeKind::U8,
            (9..=16, false) => NativeKind::U16,
            (17..=32, false) => NativeKind::U32,
            (33..=64, false) => NativeKind::U64,
            (1..=8, true) => NativeKind::I8,
            (9..=16, true) => NativeKind::I16,
            (17..=32, true) => NativeKind::I32,
            (33..=64, true) => NativeKind::I64,
            _ => NativeKind::Unsupported,
        }
    }
}

/// Layout of one channel's raw value inside a fixed-stride record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDecoderSpec {
    /// Record length in bytes.
    pub stride: usize,
    /// First byte of the field inside the record, bit offset folded in.
    pub byte_offset: usize,
    /// Remaining bit offset inside the first byte.
    pub shift: u32,
    pub bit_length: u32,
    /// Bytes touched by the field.
    pub byte_span: usize,
    /// `bit_length` ones.
    pub mask: u64,
    pub byte_order: ByteOrder,
    pub element: ElementKind,
    pub is_numeric: bool,
    pub is_byte_aligned: bool,
    /// Byte aligned and exactly as wide as [`Self::native`].
    pub is_full_width: bool,
    pub native: NativeKind,
}

impl RawDecoderSpec {
    pub fn new(
        stride: usize,
        byte_offset: usize,
        bit_offset: u32,
        bit_length: u32,
        byte_order: ByteOrder,
        element: ElementKind,
    ) -> Self {
        let byte_offset = byte_offset + (bit_offset / 8) as usize;
        let shift = bit_offset % 8;
        let mask = if bit_length >= 64 {
            u64::MAX
        } else {
            (1u64 << bit_length) - 1
        };
        let is_byte_aligned = shift == 0;
        let is_numeric = matches!(
            element,
            ElementKind::Unsigned | ElementKind::Signed | ElementKind::Float
        );
        let byte_span = if is_numeric {
            (shift + bit_length).div_ceil(8) as usize
        } else {
            (bit_length / 8) as usize
        };

        let native = match element {
            ElementKind::Unsigned | ElementKind::Signed if byte_span <= 8 => {
                NativeKind::integer(bit_length, element == ElementKind::Signed)
            }
            ElementKind::Float if is_byte_aligned && bit_length == 32 => NativeKind::F32,
            ElementKind::Float if is_byte_aligned && bit_length == 64 => NativeKind::F64,
            _ => NativeKind::Unsupported,
        };
        let is_full_width =
            is_byte_aligned && native != NativeKind::Unsupported && native.bits() == bit_length;

        Self {
            stride,
            byte_offset,
            shift,
            bit_length,
            byte_span,
            mask,
            byte_order,
            element,
            is_numeric,
            is_byte_aligned,
            is_full_width,
            native,
        }
    }

    /// Whether the field lies entirely inside one record.
    pub fn fits_record(&self) -> bool {
        self.byte_offset + self.byte_span <= self.stride
    }
}
