use std::sync::OnceLock;

use tracing::trace;

use super::{MdfFile, RawChannelGroup};
use crate::{
    Error, Result,
    blocks::{ChannelBlock, ChannelType, DataType},
    decode::{ByteOrder, ElementKind, NativeKind, RawDecoderSpec, ValueDecoderSpec},
};

/// A channel block plus its lazily built decoder.
#[derive(Debug)]
pub struct RawChannel {
    /// File offset of the CN block.
    pub offset: u64,
    pub block: ChannelBlock,
    spec: OnceLock<ValueDecoderSpec>,
}

impl RawChannel {
    pub fn new(offset: u64, block: ChannelBlock) -> Self {
        Self {
            offset,
            block,
            spec: OnceLock::new(),
        }
    }

    /// The decoder for this channel, built on first use.
    ///
    /// Fails with [`Error::UnsupportedFeature`] for channels that are not
    /// stored as fixed fields of the group's records.
    pub fn decoder_spec(&self, group: &RawChannelGroup, file: &MdfFile) -> Result<&ValueDecoderSpec> {
        if let Some(spec) = self.spec.get() {
            return Ok(spec);
        }
        let built = self.build_spec(group, file)?;
        // a racing thread may have stored an identical spec first
        let _ = self.spec.set(built);
        self.spec
            .get()
            .ok_or_else(|| Error::UnexpectedExecutionPath("decoder spec vanished".into()))
    }

    fn build_spec(&self, group: &RawChannelGroup, file: &MdfFile) -> Result<ValueDecoderSpec> {
        let cn = &self.block;
        match cn.channel_type {
            ChannelType::FixedLength
            | ChannelType::Master
            | ChannelType::Synchronization
            | ChannelType::MaxLengthData => {}
            ChannelType::VariableLength => {
                return Err(Error::UnsupportedFeature(format!(
                    "variable length signal data (channel at {:#x})",
                    self.offset
                )));
            }
            ChannelType::VirtualMaster | ChannelType::VirtualData => {
                return Err(Error::UnsupportedFeature(format!(
                    "virtual channel at {:#x}",
                    self.offset
                )));
            }
            ChannelType::Unknown(value) => {
                return Err(Error::UnsupportedFeature(format!("channel type {value}")));
            }
        }

        let (element, byte_order) = element_of(cn.data_type)?;
        let stride = usize::try_from(group.record_length())
            .map_err(|_| Error::corrupt(group.offset, "record length exceeds address space"))?;
        let field_start = usize::from(group.record_id_size) + cn.byte_offset as usize;
        let raw = RawDecoderSpec::new(
            stride,
            field_start,
            u32::from(cn.bit_offset),
            cn.bit_count,
            byte_order,
            element,
        );

        if raw.is_numeric && raw.native == NativeKind::Unsupported {
            return Err(Error::UnsupportedFeature(format!(
                "{}-bit {:?} value",
                cn.bit_count, cn.data_type
            )));
        }
        if raw.byte_span == 0 {
            return Err(Error::UnsupportedFeature(format!(
                "zero-width {:?} field",
                cn.data_type
            )));
        }
        if !raw.fits_record() {
            return Err(Error::corrupt(
                self.offset,
                format!(
                    "field of {} bytes at record byte {} exceeds record length {stride}",
                    raw.byte_span, raw.byte_offset
                ),
            ));
        }

        let conversion = file.conversions.resolve(
            cn.conversion_addr,
            &file.store,
            file.options.unsupported,
        )?;
        trace!(channel = self.offset, ?raw, conversion = ?conversion.value, "built decoder spec");
        Ok(ValueDecoderSpec {
            raw,
            conversion: conversion.value.clone(),
            display: conversion.display.clone(),
            conversion_degraded: conversion.degraded,
        })
    }
}

fn element_of(data_type: DataType) -> Result<(ElementKind, ByteOrder)> {
    use ByteOrder::{BigEndian, LittleEndian};
    Ok(match data_type {
        DataType::UnsignedIntegerLE => (ElementKind::Unsigned, LittleEndian),
        DataType::UnsignedIntegerBE => (ElementKind::Unsigned, BigEndian),
        DataType::SignedIntegerLE => (ElementKind::Signed, LittleEndian),
        DataType::SignedIntegerBE => (ElementKind::Signed, BigEndian),
        DataType::FloatLE => (ElementKind::Float, LittleEndian),
        DataType::FloatBE => (ElementKind::Float, BigEndian),
        DataType::StringLatin1 => (ElementKind::AnsiString, LittleEndian),
        DataType::StringUtf8 => (ElementKind::Utf8String, LittleEndian),
        DataType::ByteArray | DataType::MimeSample | DataType::MimeStream => {
            (ElementKind::ByteArray, LittleEndian)
        }
        other => {
            return Err(Error::UnsupportedFeature(format!("{other:?} data")));
        }
    })
}
