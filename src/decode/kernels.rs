//! Specialized extraction loops.
//!
//! A kernel is picked once per channel from the native kind, the extraction
//! mode (full width or packed) and the conversion kind. Each combination is a
//! separate monomorphized loop, so the per-sample path has no branches on
//! layout or conversion.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::{
    Error, Result,
    decode::{
        ValueConversionSpec,
        geometry::{ByteOrder, ElementKind, NativeKind, RawDecoderSpec},
    },
};

/// Reads one raw value at a byte position.
trait Extract: Copy + Send + Sync + 'static {
    fn extract(&self, bytes: &[u8], pos: usize) -> f64;
}

/// Maps a raw value to its physical value.
trait Convert: Copy + Send + Sync + 'static {
    fn convert(&self, raw: f64) -> f64;
}

trait NativeRead: Copy + Send + Sync + 'static {
    fn read_le(bytes: &[u8]) -> f64;
    fn read_be(bytes: &[u8]) -> f64;
}

macro_rules! native_read {
    ($($ty:ty),*) => {
        $(
            impl NativeRead for $ty {
                #[inline(always)]
                fn read_le(bytes: &[u8]) -> f64 {
                    let mut raw = [0u8; size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..size_of::<$ty>()]);
                    <$ty>::from_le_bytes(raw) as f64
                }

                #[inline(always)]
                fn read_be(bytes: &[u8]) -> f64 {
                    let mut raw = [0u8; size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..size_of::<$ty>()]);
                    <$ty>::from_be_bytes(raw) as f64
                }
            }
        )*
    };
}

native_read!(u8, u16, u32, u64, i8, i16, i32, i64, f32, f64);

/// Byte aligned field exactly as wide as its native type.
#[derive(Clone, Copy)]
struct FullWidth<T, const BIG_ENDIAN: bool>(PhantomData<T>);

impl<T: NativeRead, const BIG_ENDIAN: bool> Extract for FullWidth<T, BIG_ENDIAN> {
    #[inline(always)]
    fn extract(&self, bytes: &[u8], pos: usize) -> f64 {
        if BIG_ENDIAN {
            T::read_be(&bytes[pos..])
        } else {
            T::read_le(&bytes[pos..])
        }
    }
}

/// Integer field that needs shift and mask.
#[derive(Clone, Copy)]
struct Packed<const BIG_ENDIAN: bool, const SIGNED: bool> {
    span: usize,
    shift: u32,
    mask: u64,
    sign_bit: u64,
}

impl<const BIG_ENDIAN: bool, const SIGNED: bool> Extract for Packed<BIG_ENDIAN, SIGNED> {
    #[inline(always)]
    fn extract(&self, bytes: &[u8], pos: usize) -> f64 {
        let field = &bytes[pos..pos + self.span];
        let raw = if BIG_ENDIAN {
            field.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
        } else {
            field.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64)
        };
        let value = (raw >> self.shift) & self.mask;
        if SIGNED {
            let signed = if value & self.sign_bit != 0 {
                value | !self.mask
            } else {
                value
            };
            signed as i64 as f64
        } else {
            value as f64
        }
    }
}

#[derive(Clone, Copy)]
struct IdentityConvert;

impl Convert for IdentityConvert {
    #[inline(always)]
    fn convert(&self, raw: f64) -> f64 {
        raw
    }
}

#[derive(Clone, Copy)]
struct LinearConvert {
    scale: f64,
    offset: f64,
}

impl Convert for LinearConvert {
    #[inline(always)]
    fn convert(&self, raw: f64) -> f64 {
        raw * self.scale + self.offset
    }
}

#[derive(Clone, Copy)]
struct RationalConvert(ValueConversionSpec);

impl Convert for RationalConvert {
    #[inline(always)]
    fn convert(&self, raw: f64) -> f64 {
        self.0.apply(raw)
    }
}

fn run<E: Extract, C: Convert>(
    extract: E,
    convert: C,
    bytes: &[u8],
    start: usize,
    stride: usize,
    out: &mut [f64],
) {
    let mut pos = start;
    for slot in out.iter_mut() {
        *slot = convert.convert(extract.extract(bytes, pos));
        pos += stride;
    }
}

/// Decodes `out.len()` records: `(bytes, first field byte, stride, out)`.
pub(crate) type NumericFn = Arc<dyn Fn(&[u8], usize, usize, &mut [f64]) + Send + Sync>;

fn bind<E: Extract, C: Convert>(extract: E, convert: C) -> NumericFn {
    Arc::new(move |bytes, start, stride, out| run(extract, convert, bytes, start, stride, out))
}

fn full_width<T: NativeRead, C: Convert>(order: ByteOrder, convert: C) -> NumericFn {
    match order {
        ByteOrder::LittleEndian => bind(FullWidth::<T, false>(PhantomData), convert),
        ByteOrder::BigEndian => bind(FullWidth::<T, true>(PhantomData), convert),
    }
}

fn with_extractor<C: Convert>(raw: &RawDecoderSpec, convert: C) -> Result<NumericFn> {
    if raw.is_full_width {
        let order = raw.byte_order;
        return Ok(match raw.native {
            NativeKind::U8 => full_width::<u8, C>(order, convert),
            NativeKind::U16 => full_width::<u16, C>(order, convert),
            NativeKind::U32 => full_width::<u32, C>(order, convert),
            NativeKind::U64 => full_width::<u64, C>(order, convert),
            NativeKind::I8 => full_width::<i8, C>(order, convert),
            NativeKind::I16 => full_width::<i16, C>(order, convert),
            NativeKind::I32 => full_width::<i32, C>(order, convert),
            NativeKind::I64 => full_width::<i64, C>(order, convert),
            NativeKind::F32 => full_width::<f32, C>(order, convert),
            NativeKind::F64 => full_width::<f64, C>(order, convert),
            NativeKind::Unsupported => {
                return Err(Error::UnexpectedExecutionPath(
                    "unsupported native kind reached the kernel selector".into(),
                ));
            }
        });
    }

    let sign_bit = if raw.bit_length == 0 {
        0
    } else {
        1u64 << (raw.bit_length - 1)
    };
    let big = raw.byte_order == ByteOrder::BigEndian;
    macro_rules! packed {
        ($big:literal, $signed:literal) => {
            bind(
                Packed::<$big, $signed> {
                    span: raw.byte_span,
                    shift: raw.shift,
                    mask: raw.mask,
                    sign_bit,
                },
                convert,
            )
        };
    }
    match (raw.native, big) {
        (NativeKind::U8 | NativeKind::U16 | NativeKind::U32 | NativeKind::U64, false) => {
            Ok(packed!(false, false))
        }
        (NativeKind::U8 | NativeKind::U16 | NativeKind::U32 | NativeKind::U64, true) => {
            Ok(packed!(true, false))
        }
        (NativeKind::I8 | NativeKind::I16 | NativeKind::I32 | NativeKind::I64, false) => {
            Ok(packed!(false, true))
        }
        (NativeKind::I8 | NativeKind::I16 | NativeKind::I32 | NativeKind::I64, true) => {
            Ok(packed!(true, true))
        }
        (native, _) => Err(Error::UnexpectedExecutionPath(format!(
            "no packed extraction for {native:?}"
        ))),
    }
}

/// Text encodings of fixed-length string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextEncoding {
    Latin1,
    Utf8,
}

/// The per-channel decode loop.
#[derive(Clone)]
pub(crate) enum DecodeKernel {
    Numeric(NumericFn),
    Bytes { width: usize },
    Text { width: usize, encoding: TextEncoding },
}

impl core::fmt::Debug for DecodeKernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeKernel::Numeric(_) => f.write_str("Numeric"),
            DecodeKernel::Bytes { width } => write!(f, "Bytes({width})"),
            DecodeKernel::Text { width, encoding } => write!(f, "Text({width}, {encoding:?})"),
        }
    }
}

impl DecodeKernel {
    /// Picks the loop for `raw` under `conversion`.
    pub(crate) fn select(raw: &RawDecoderSpec, conversion: &ValueConversionSpec) -> Result<Self> {
        match raw.element {
            ElementKind::ByteArray => Ok(DecodeKernel::Bytes {
                width: raw.byte_span,
            }),
            ElementKind::AnsiString => Ok(DecodeKernel::Text {
                width: raw.byte_span,
                encoding: TextEncoding::Latin1,
            }),
            ElementKind::Utf8String => Ok(DecodeKernel::Text {
                width: raw.byte_span,
                encoding: TextEncoding::Utf8,
            }),
            ElementKind::Unsigned | ElementKind::Signed | ElementKind::Float => {
                let kernel = match *conversion {
                    ValueConversionSpec::Identity => with_extractor(raw, IdentityConvert)?,
                    ValueConversionSpec::Linear { scale, offset } => {
                        with_extractor(raw, LinearConvert { scale, offset })?
                    }
                    rational @ ValueConversionSpec::Rational3 { .. } => {
                        with_extractor(raw, RationalConvert(rational))?
                    }
                };
                Ok(DecodeKernel::Numeric(kernel))
            }
        }
    }
}

/// Decodes one fixed-length string field.
pub(crate) fn decode_text(field: &[u8], encoding: TextEncoding) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    let field = &field[..end];
    match encoding {
        TextEncoding::Latin1 => field.iter().map(|&b| b as char).collect(),
        TextEncoding::Utf8 => String::from_utf8_lossy(field).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(raw: &RawDecoderSpec, conversion: ValueConversionSpec) -> NumericFn {
        match DecodeKernel::select(raw, &conversion).unwrap() {
            DecodeKernel::Numeric(f) => f,
            other => panic!("expected numeric kernel, got {other:?}"),
        }
    }

    #[test]
    fn full_width_both_orders() {
        let records = [0x12, 0x34, 0xAB, 0xCD];
        let le = RawDecoderSpec::new(2, 0, 0, 16, ByteOrder::LittleEndian, ElementKind::Unsigned);
        let be = RawDecoderSpec::new(2, 0, 0, 16, ByteOrder::BigEndian, ElementKind::Unsigned);
        let mut out = [0.0; 2];
        numeric(&le, ValueConversionSpec::Identity)(&records, 0, 2, &mut out);
        assert_eq!(out, [0x3412 as f64, 0xCDAB as f64]);
        numeric(&be, ValueConversionSpec::Identity)(&records, 0, 2, &mut out);
        assert_eq!(out, [0x1234 as f64, 0xABCD as f64]);
    }

    #[test]
    fn packed_signed_sign_extends() {
        // 12-bit value -3 (0xFFD) stored at bit offset 4
        let word: u16 = 0xFFD << 4;
        let bytes = word.to_le_bytes();
        let raw = RawDecoderSpec::new(2, 0, 4, 12, ByteOrder::LittleEndian, ElementKind::Signed);
        let mut out = [0.0];
        numeric(&raw, ValueConversionSpec::Identity)(&bytes, 0, 2, &mut out);
        assert_eq!(out, [-3.0]);
    }

    #[test]
    fn packed_unsigned_bits() {
        let bytes = [0b1011_0110];
        let raw = RawDecoderSpec::new(1, 0, 2, 3, ByteOrder::LittleEndian, ElementKind::Unsigned);
        let mut out = [0.0];
        numeric(&raw, ValueConversionSpec::Identity)(&bytes, 0, 1, &mut out);
        assert_eq!(out, [0b101 as f64]);
    }

    #[test]
    fn linear_applied_in_loop() {
        let bytes = [10u8, 20, 30];
        let raw = RawDecoderSpec::new(1, 0, 0, 8, ByteOrder::LittleEndian, ElementKind::Unsigned);
        let mut out = [0.0; 3];
        numeric(&raw, ValueConversionSpec::linear(0.5, -1.0))(&bytes, 0, 1, &mut out);
        assert_eq!(out, [4.0, 9.0, 14.0]);
    }

    #[test]
    fn floats() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1.5f32.to_be_bytes());
        bytes.extend_from_slice(&(-2.25f32).to_be_bytes());
        let raw = RawDecoderSpec::new(4, 0, 0, 32, ByteOrder::BigEndian, ElementKind::Float);
        let mut out = [0.0; 2];
        numeric(&raw, ValueConversionSpec::Identity)(&bytes, 0, 4, &mut out);
        assert_eq!(out, [1.5, -2.25]);
    }

    #[test]
    fn unsupported_native_is_internal_error() {
        let raw = RawDecoderSpec::new(2, 0, 0, 16, ByteOrder::LittleEndian, ElementKind::Float);
        let err = DecodeKernel::select(&raw, &ValueConversionSpec::Identity).unwrap_err();
        assert!(matches!(err, Error::UnexpectedExecutionPath(_)));
    }

    #[test]
    fn text_stops_at_nul() {
        assert_eq!(decode_text(b"ab\0cd", TextEncoding::Latin1), "ab");
        assert_eq!(decode_text(&[0xE9, b'x'], TextEncoding::Latin1), "\u{e9}x");
        assert_eq!(decode_text("ü".as_bytes(), TextEncoding::Utf8), "ü");
    }
}
