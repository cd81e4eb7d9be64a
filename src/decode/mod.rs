//! Turning record bytes into physical values.
//!
//! - [`geometry`]: where a channel's bits sit inside a record
//! - [`conversion`]: raw-to-physical transforms and their cache
//! - [`kernels`]: the monomorphized extraction loops
//! - [`buffer`]: per-channel storage the kernels write into

use std::sync::Arc;

pub mod buffer;
pub mod conversion;
pub mod geometry;
pub(crate) mod kernels;

pub use buffer::{BufferFactory, SampleBuffer, SampleSlice, SampleStorage, SampleType};
pub use conversion::{ConversionCache, DisplayConversionSpec, ResolvedConversion, ValueConversionSpec};
pub use geometry::{ByteOrder, ElementKind, NativeKind, RawDecoderSpec};

/// Everything needed to decode one channel: layout, conversion, display.
#[derive(Debug, Clone)]
pub struct ValueDecoderSpec {
    pub raw: RawDecoderSpec,
    pub conversion: Arc<ValueConversionSpec>,
    pub display: Arc<DisplayConversionSpec>,
    /// The channel's conversion was not supported and identity is used.
    pub conversion_degraded: bool,
}
