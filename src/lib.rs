#![deny(unsafe_code)]

//! # mdf4-decode
//!
//! A parallel, read-only decoder for ASAM MDF 4 (Measurement Data Format)
//! files.
//!
//! MDF4 stores measurement signals as fixed-length records spread over a graph
//! of linked binary blocks. This crate maps the file, resolves the block graph
//! lazily and decodes whole channel groups into per-channel sample buffers,
//! decoding the group's data blocks concurrently on the rayon pool.
//!
//! ## Features
//!
//! - **Block graph**: offset-keyed, deduplicating cache of typed blocks
//! - **Record layout**: records split across block boundaries are rebuilt
//!   from their fragments after all blocks have been decoded
//! - **Compression**: DZ blocks, plain and transposed deflate
//! - **Conversions**: identity, linear and rational conversions applied while
//!   decoding; value-to-text tables for display
//! - **Level of detail**: halving pyramids for plotting large signals
//!
//! ## Quick Start
//!
//! ```no_run
//! use mdf4_decode::{LodBuffer, Mdf4File, Result, Sampler};
//!
//! fn main() -> Result<()> {
//!     let file = Mdf4File::open("recording.mf4")?;
//!
//!     for group in file.channel_groups() {
//!         println!("Group {:?}: {} records", group.name()?, group.sample_count());
//!     }
//!
//!     let channels = file.channels();
//!     for view in Sampler::load_full(&channels)? {
//!         let name = view.channel().name()?.unwrap_or_default();
//!         if let Some(values) = view.data::<f64>() {
//!             println!("{name}: {} samples", values.len());
//!             let lod = LodBuffer::from_view(&view)?;
//!             println!("  {} detail layers", lod.layer_count());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Sampling a range
//!
//! ```no_run
//! use mdf4_decode::{Mdf4File, Result};
//!
//! fn main() -> Result<()> {
//!     let file = Mdf4File::open("recording.mf4")?;
//!     let group = &file.channel_groups()[0];
//!     let sampler = group.sample(1_000, 500)?;
//!     // The range is widened to whole blocks.
//!     assert!(sampler.sample_offset() <= 1_000);
//!     for view in sampler.buffers() {
//!         println!("{:?}: {} samples", view.channel().name()?, view.len());
//!     }
//!     println!("{:?}", sampler.metrics());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`blocks`] | Raw MDF block structures (for advanced use) |
//! | [`parsing`] | Block cache and the file's raw group/channel tree |
//! | [`decode`] | Field geometry, conversions and sample buffers |
//! | [`alignment`] | Placement of records on physical blocks |
//! | [`decompress`] | DZ inflate and transposition |
//! | [`error`] | Error types and [`Result`] alias |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`]. Broken files fail with
//! [`Error::CorruptFormat`]; valid files using something this crate does not
//! decode fail with [`Error::UnsupportedFeature`] unless
//! [`UnsupportedPolicy::Lenient`] is selected, in which case the affected
//! channels are skipped or decoded without conversion.

pub mod alignment;
pub mod blocks;
pub mod decode;
pub mod decompress;
pub mod error;
pub mod parsing;

mod channel;
mod channel_group;
mod lod;
mod mdf;
mod metrics;
mod options;
mod pool;
mod sampler;

// Re-export commonly used types at the crate root
pub use alignment::{Alignment, BlockLayout, BlockLoadingInfo};
pub use blocks::{ChannelType, DataType};
pub use channel::Channel;
pub use channel_group::ChannelGroup;
pub use decode::{
    DisplayConversionSpec, SampleBuffer, SampleStorage, SampleType, ValueConversionSpec,
    ValueDecoderSpec,
};
pub use error::{Error, Result};
pub use lod::LodBuffer;
pub use mdf::Mdf4File;
pub use metrics::{MetricsSnapshot, SamplerMetrics};
pub use options::{AllocationStrategy, DecodeOptions, UnsupportedPolicy};
pub use parsing::{FileSummary, SourceInfo};
pub use sampler::{BufferView, Sampler};
