//! Decoder configuration.
//!
//! [`DecodeOptions`] is passed to [`crate::Mdf4File::open_with`] and stays
//! fixed for the lifetime of the opened file.
//!
//! ```
//! use mdf4_decode::{AllocationStrategy, DecodeOptions, UnsupportedPolicy};
//!
//! let options = DecodeOptions {
//!     unsupported: UnsupportedPolicy::Lenient,
//!     allocation: AllocationStrategy::Pooled,
//!     ..DecodeOptions::default()
//! };
//! assert_eq!(options.lod_min_samples, 256);
//! ```

use crate::{Error, Result};

/// What to do when a channel needs a feature the decoder does not cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnsupportedPolicy {
    /// Fail with [`Error::UnsupportedFeature`].
    Strict,
    /// Log a warning and fall back: unsupported conversions become identity,
    /// unsupported channels are left out of sampler results.
    Lenient,
}

impl Default for UnsupportedPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            UnsupportedPolicy::Strict
        } else {
            UnsupportedPolicy::Lenient
        }
    }
}

impl UnsupportedPolicy {
    /// Applies the policy to an unsupported `feature`.
    ///
    /// Returns `Ok(())` when the caller should degrade and carry on.
    pub(crate) fn degrade(self, feature: impl Into<String>) -> Result<()> {
        let feature = feature.into();
        match self {
            UnsupportedPolicy::Strict => Err(Error::UnsupportedFeature(feature)),
            UnsupportedPolicy::Lenient => {
                tracing::warn!(%feature, "unsupported feature, falling back");
                Ok(())
            }
        }
    }
}

/// Where sample buffers get their storage from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AllocationStrategy {
    /// Every buffer is a fresh allocation.
    #[default]
    Heap,
    /// Buffers are rented from size-classed pools owned by the file and
    /// returned when dropped.
    Pooled,
}

/// Tuning knobs of the decode pipeline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecodeOptions {
    pub unsupported: UnsupportedPolicy,
    pub allocation: AllocationStrategy,
    /// A block is decoded in parallel chunks once samples x channels exceeds
    /// this value.
    pub split_cost_threshold: usize,
    /// Transposed DZ payloads larger than this many bytes are reordered with
    /// the tiled parallel routine.
    pub transpose_parallel_threshold: usize,
    /// Records per tile of the parallel transpose.
    pub transpose_tile_rows: usize,
    /// Smallest layer size of a [`crate::LodBuffer`] built by
    /// [`crate::LodBuffer::from_view`].
    pub lod_min_samples: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            unsupported: UnsupportedPolicy::default(),
            allocation: AllocationStrategy::default(),
            split_cost_threshold: 4 * 1024 * 1024,
            transpose_parallel_threshold: 20 * 1024 * 1024,
            transpose_tile_rows: 256,
            lod_min_samples: 256,
        }
    }
}

impl DecodeOptions {
    /// Rejects settings that would stall the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.split_cost_threshold == 0 {
            return Err(Error::InvalidArgument(
                "split_cost_threshold must be positive".into(),
            ));
        }
        if self.transpose_tile_rows == 0 {
            return Err(Error::InvalidArgument(
                "transpose_tile_rows must be positive".into(),
            ));
        }
        if self.lod_min_samples == 0 {
            return Err(Error::InvalidArgument(
                "lod_min_samples must be positive".into(),
            ));
        }
        Ok(())
    }
}
