//! Timing and volume counters of the decode pipeline.
//!
//! Each sampling call counts into its own [`SamplerMetrics`] and hands out a
//! [`MetricsSnapshot`]; the file keeps a running total across calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters updated from worker threads.
#[derive(Debug, Default)]
pub struct SamplerMetrics {
    blocks_decoded: AtomicU64,
    raw_bytes_copied: AtomicU64,
    compressed_bytes_inflated: AtomicU64,
    bytes_inflated: AtomicU64,
    bytes_transposed: AtomicU64,
    samples_decoded: AtomicU64,
    gap_records: AtomicU64,
    bytes_allocated: AtomicU64,
    layouts_built: AtomicU64,
    inflate_nanos: AtomicU64,
    decode_nanos: AtomicU64,
    gap_nanos: AtomicU64,
}

fn nanos(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX)
}

impl SamplerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// An uncompressed block whose record bytes were read in place.
    pub(crate) fn raw_block(&self, bytes: u64) {
        self.blocks_decoded.fetch_add(1, Ordering::Relaxed);
        self.raw_bytes_copied.fetch_add(bytes, Ordering::Relaxed);
    }

    /// A DZ block inflated from `compressed` to `inflated` bytes.
    pub(crate) fn zipped_block(&self, compressed: u64, inflated: u64, elapsed: Duration) {
        self.blocks_decoded.fetch_add(1, Ordering::Relaxed);
        self.compressed_bytes_inflated
            .fetch_add(compressed, Ordering::Relaxed);
        self.bytes_inflated.fetch_add(inflated, Ordering::Relaxed);
        self.inflate_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    pub(crate) fn transposed(&self, bytes: u64) {
        self.bytes_transposed.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn decoded(&self, samples: u64, elapsed: Duration) {
        self.samples_decoded.fetch_add(samples, Ordering::Relaxed);
        self.decode_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    pub(crate) fn gaps(&self, records: u64, elapsed: Duration) {
        self.gap_records.fetch_add(records, Ordering::Relaxed);
        self.gap_nanos.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    pub(crate) fn allocated(&self, bytes: u64) {
        self.bytes_allocated.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn layout_built(&self) {
        self.layouts_built.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a finished call's numbers to these counters.
    pub(crate) fn absorb(&self, other: &MetricsSnapshot) {
        let pairs = [
            (&self.blocks_decoded, other.blocks_decoded),
            (&self.raw_bytes_copied, other.raw_bytes_copied),
            (&self.compressed_bytes_inflated, other.compressed_bytes_inflated),
            (&self.bytes_inflated, other.bytes_inflated),
            (&self.bytes_transposed, other.bytes_transposed),
            (&self.samples_decoded, other.samples_decoded),
            (&self.gap_records, other.gap_records),
            (&self.bytes_allocated, other.bytes_allocated),
            (&self.layouts_built, other.layouts_built),
            (&self.inflate_nanos, other.inflate_nanos),
            (&self.decode_nanos, other.decode_nanos),
            (&self.gap_nanos, other.gap_nanos),
        ];
        for (counter, value) in pairs {
            counter.fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            blocks_decoded: load(&self.blocks_decoded),
            raw_bytes_copied: load(&self.raw_bytes_copied),
            compressed_bytes_inflated: load(&self.compressed_bytes_inflated),
            bytes_inflated: load(&self.bytes_inflated),
            bytes_transposed: load(&self.bytes_transposed),
            samples_decoded: load(&self.samples_decoded),
            gap_records: load(&self.gap_records),
            bytes_allocated: load(&self.bytes_allocated),
            layouts_built: load(&self.layouts_built),
            inflate_nanos: load(&self.inflate_nanos),
            decode_nanos: load(&self.decode_nanos),
            gap_nanos: load(&self.gap_nanos),
        }
    }
}

/// A point-in-time copy of [`SamplerMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    /// Data blocks (DT or DZ) whose bytes were consumed.
    pub blocks_decoded: u64,
    /// Bytes read in place from uncompressed blocks.
    pub raw_bytes_copied: u64,
    /// Compressed bytes fed to the inflater.
    pub compressed_bytes_inflated: u64,
    /// Bytes the inflater produced.
    pub bytes_inflated: u64,
    /// Bytes reordered by the inverse transposition.
    pub bytes_transposed: u64,
    /// Samples written, summed over channels.
    pub samples_decoded: u64,
    /// Records stitched together from block fragments.
    pub gap_records: u64,
    /// Bytes of sample storage handed to buffers.
    pub bytes_allocated: u64,
    /// Channel group layouts computed (each group at most once per file).
    pub layouts_built: u64,
    pub inflate_nanos: u64,
    pub decode_nanos: u64,
    pub gap_nanos: u64,
}

impl MetricsSnapshot {
    pub fn inflate_time(&self) -> Duration {
        Duration::from_nanos(self.inflate_nanos)
    }

    pub fn decode_time(&self) -> Duration {
        Duration::from_nanos(self.decode_nanos)
    }

    pub fn gap_time(&self) -> Duration {
        Duration::from_nanos(self.gap_nanos)
    }
}
