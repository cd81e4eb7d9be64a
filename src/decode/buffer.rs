//! Per-channel sample storage and the factory that allocates it.

use std::ops::Range;
use std::sync::Arc;

use crate::{
    AllocationStrategy, Error, Result,
    decode::{
        ValueConversionSpec, ValueDecoderSpec,
        kernels::{DecodeKernel, decode_text},
    },
    pool::BufferPool,
};

/// Decoded values of one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleStorage {
    /// Physical values of numeric channels.
    Numeric(Vec<f64>),
    /// Fixed-width byte arrays, `width` bytes per sample.
    Bytes { width: usize, data: Vec<u8> },
    /// Fixed-length strings.
    Text(Vec<String>),
}

impl SampleStorage {
    pub fn len(&self) -> usize {
        match self {
            SampleStorage::Numeric(values) => values.len(),
            SampleStorage::Bytes { width, data } => data.len().checked_div(*width).unwrap_or(0),
            SampleStorage::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by the sample values themselves.
    pub fn allocated_bytes(&self) -> usize {
        match self {
            SampleStorage::Numeric(values) => std::mem::size_of_val(values.as_slice()),
            SampleStorage::Bytes { data, .. } => data.len(),
            SampleStorage::Text(values) => {
                values.iter().map(|s| s.capacity()).sum::<usize>()
                    + std::mem::size_of_val(values.as_slice())
            }
        }
    }

    fn as_slice_mut(&mut self) -> SampleSlice<'_> {
        match self {
            SampleStorage::Numeric(values) => SampleSlice::Numeric(values),
            SampleStorage::Bytes { width, data } => SampleSlice::Bytes {
                width: *width,
                len: data.len().checked_div(*width).unwrap_or(0),
                data,
            },
            SampleStorage::Text(values) => SampleSlice::Text(values),
        }
    }
}

/// A mutable window of sample storage.
///
/// Windows obtained by splitting never overlap, which is what lets blocks
/// decode into one channel buffer concurrently.
#[derive(Debug)]
pub enum SampleSlice<'b> {
    Numeric(&'b mut [f64]),
    Bytes {
        width: usize,
        len: usize,
        data: &'b mut [u8],
    },
    Text(&'b mut [String]),
}

impl<'b> SampleSlice<'b> {
    pub fn len(&self) -> usize {
        match self {
            SampleSlice::Numeric(values) => values.len(),
            SampleSlice::Bytes { len, .. } => *len,
            SampleSlice::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits into `[0, mid)` and `[mid, len)`. `mid` must not exceed `len`.
    pub fn split_at(self, mid: usize) -> (SampleSlice<'b>, SampleSlice<'b>) {
        match self {
            SampleSlice::Numeric(values) => {
                let (a, b) = values.split_at_mut(mid);
                (SampleSlice::Numeric(a), SampleSlice::Numeric(b))
            }
            SampleSlice::Bytes { width, len, data } => {
                let (a, b) = data.split_at_mut(mid * width);
                (
                    SampleSlice::Bytes {
                        width,
                        len: mid,
                        data: a,
                    },
                    SampleSlice::Bytes {
                        width,
                        len: len - mid,
                        data: b,
                    },
                )
            }
            SampleSlice::Text(values) => {
                let (a, b) = values.split_at_mut(mid);
                (SampleSlice::Text(a), SampleSlice::Text(b))
            }
        }
    }

    /// Cuts out the given ranges, which must be ascending and disjoint.
    pub fn split_ranges(self, ranges: &[Range<usize>]) -> Result<Vec<SampleSlice<'b>>> {
        let mut pieces = Vec::with_capacity(ranges.len());
        let mut rest = self;
        let mut consumed = 0;
        for range in ranges {
            if range.start < consumed
                || range.end < range.start
                || range.end - consumed > rest.len()
            {
                return Err(Error::UnexpectedExecutionPath(format!(
                    "destination range {range:?} overlaps or exceeds the buffer"
                )));
            }
            let (_, tail) = rest.split_at(range.start - consumed);
            let (piece, tail) = tail.split_at(range.end - range.start);
            pieces.push(piece);
            rest = tail;
            consumed = range.end;
        }
        Ok(pieces)
    }

    /// Splits into consecutive windows of at most `chunk` samples.
    pub fn chunks(self, chunk: usize) -> Vec<SampleSlice<'b>> {
        let chunk = chunk.max(1);
        let mut pieces = Vec::with_capacity(self.len().div_ceil(chunk));
        let mut rest = self;
        while rest.len() > chunk {
            let (head, tail) = rest.split_at(chunk);
            pieces.push(head);
            rest = tail;
        }
        pieces.push(rest);
        pieces
    }
}

/// Decodes records into a [`SampleSlice`].
#[derive(Debug, Clone)]
pub(crate) struct RecordDecoder {
    kernel: DecodeKernel,
    /// Field start inside the record.
    field_offset: usize,
    span: usize,
    stride: usize,
}

impl RecordDecoder {
    fn new(spec: &ValueDecoderSpec, conversion: &ValueConversionSpec) -> Result<Self> {
        Ok(Self {
            kernel: DecodeKernel::select(&spec.raw, conversion)?,
            field_offset: spec.raw.byte_offset,
            span: spec.raw.byte_span,
            stride: spec.raw.stride,
        })
    }

    pub(crate) fn stride(&self) -> usize {
        self.stride
    }

    /// Decodes `out.len()` consecutive records, the first starting at
    /// `record_start` of `bytes`.
    pub(crate) fn decode(&self, bytes: &[u8], record_start: usize, out: SampleSlice<'_>) -> Result<()> {
        let count = out.len();
        if count == 0 {
            return Ok(());
        }
        let first = record_start + self.field_offset;
        let needed = first + (count - 1) * self.stride + self.span;
        if needed > bytes.len() {
            return Err(Error::TooShortBuffer {
                actual: bytes.len(),
                expected: needed,
                file: file!(),
                line: line!(),
            });
        }

        match (&self.kernel, out) {
            (DecodeKernel::Numeric(decode), SampleSlice::Numeric(values)) => {
                decode(bytes, first, self.stride, values);
            }
            (DecodeKernel::Bytes { width }, SampleSlice::Bytes { data, .. }) => {
                for (i, sample) in data.chunks_exact_mut(*width).enumerate() {
                    let pos = first + i * self.stride;
                    sample.copy_from_slice(&bytes[pos..pos + width]);
                }
            }
            (DecodeKernel::Text { width, encoding }, SampleSlice::Text(values)) => {
                for (i, sample) in values.iter_mut().enumerate() {
                    let pos = first + i * self.stride;
                    *sample = decode_text(&bytes[pos..pos + width], *encoding);
                }
            }
            (kernel, _) => {
                return Err(Error::UnexpectedExecutionPath(format!(
                    "{kernel:?} kernel paired with foreign storage"
                )));
            }
        }
        Ok(())
    }
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f64 {}
    impl Sealed for u8 {}
    impl Sealed for String {}
}

/// Element types a [`SampleBuffer`] can be viewed as.
pub trait SampleType: sealed::Sealed + Sized {
    fn view(storage: &SampleStorage) -> Option<&[Self]>;
    fn view_mut(storage: &mut SampleStorage) -> Option<&mut [Self]>;
}

impl SampleType for f64 {
    fn view(storage: &SampleStorage) -> Option<&[Self]> {
        match storage {
            SampleStorage::Numeric(values) => Some(values),
            _ => None,
        }
    }

    fn view_mut(storage: &mut SampleStorage) -> Option<&mut [Self]> {
        match storage {
            SampleStorage::Numeric(values) => Some(values),
            _ => None,
        }
    }
}

impl SampleType for u8 {
    fn view(storage: &SampleStorage) -> Option<&[Self]> {
        match storage {
            SampleStorage::Bytes { data, .. } => Some(data),
            _ => None,
        }
    }

    fn view_mut(storage: &mut SampleStorage) -> Option<&mut [Self]> {
        match storage {
            SampleStorage::Bytes { data, .. } => Some(data),
            _ => None,
        }
    }
}

impl SampleType for String {
    fn view(storage: &SampleStorage) -> Option<&[Self]> {
        match storage {
            SampleStorage::Text(values) => Some(values),
            _ => None,
        }
    }

    fn view_mut(storage: &mut SampleStorage) -> Option<&mut [Self]> {
        match storage {
            SampleStorage::Text(values) => Some(values),
            _ => None,
        }
    }
}

/// Decoded samples of one channel plus the loop that fills them.
///
/// Owned by the caller. Pooled numeric storage goes back to its pool when
/// the buffer is dropped.
#[derive(Debug)]
pub struct SampleBuffer {
    spec: ValueDecoderSpec,
    decoder: RecordDecoder,
    storage: SampleStorage,
    conversion_enabled: bool,
    pool: Option<Arc<BufferPool<f64>>>,
}

impl SampleBuffer {
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn spec(&self) -> &ValueDecoderSpec {
        &self.spec
    }

    pub fn storage(&self) -> &SampleStorage {
        &self.storage
    }

    /// Samples as `T`, `None` when the storage holds another type.
    pub fn data<T: SampleType>(&self) -> Option<&[T]> {
        T::view(&self.storage)
    }

    /// Mutable samples as `T`.
    pub fn span<T: SampleType>(&mut self) -> Option<&mut [T]> {
        T::view_mut(&mut self.storage)
    }

    pub fn conversion_enabled(&self) -> bool {
        self.conversion_enabled
    }

    /// Decodes `count` records starting at `byte_offset` of `bytes` into
    /// samples `dest_start..dest_start + count`.
    pub fn update(
        &mut self,
        bytes: &[u8],
        byte_offset: usize,
        dest_start: usize,
        count: usize,
    ) -> Result<()> {
        let len = self.storage.len();
        if dest_start.checked_add(count).is_none_or(|end| end > len) {
            return Err(Error::InvalidArgument(format!(
                "samples {dest_start}..{} exceed buffer length {len}",
                dest_start.saturating_add(count)
            )));
        }
        let (_, tail) = self.storage.as_slice_mut().split_at(dest_start);
        let (window, _) = tail.split_at(count);
        self.decoder.decode(bytes, byte_offset, window)
    }

    /// Switches to raw values. Already decoded samples are left as they are.
    pub fn disable_conversion(&mut self) -> Result<()> {
        if self.conversion_enabled {
            self.decoder = RecordDecoder::new(&self.spec, &ValueConversionSpec::Identity)?;
            self.conversion_enabled = false;
        }
        Ok(())
    }

    pub(crate) fn parts_mut(&mut self) -> (&RecordDecoder, SampleSlice<'_>) {
        (&self.decoder, self.storage.as_slice_mut())
    }

    /// Takes the storage out, leaving the buffer empty.
    pub fn into_storage(mut self) -> SampleStorage {
        self.pool = None;
        std::mem::replace(&mut self.storage, SampleStorage::Numeric(Vec::new()))
    }
}

impl Drop for SampleBuffer {
    fn drop(&mut self) {
        if let (Some(pool), SampleStorage::Numeric(values)) = (&self.pool, &mut self.storage) {
            pool.release(std::mem::take(values));
        }
    }
}

/// Allocates sample buffers using one [`AllocationStrategy`].
#[derive(Debug)]
pub struct BufferFactory {
    strategy: AllocationStrategy,
    pool: Arc<BufferPool<f64>>,
}

impl BufferFactory {
    pub fn new(strategy: AllocationStrategy) -> Self {
        Self {
            strategy,
            pool: Arc::new(BufferPool::new()),
        }
    }

    pub fn strategy(&self) -> AllocationStrategy {
        self.strategy
    }

    /// A zeroed buffer of `capacity` samples for `spec`.
    pub fn allocate(
        &self,
        spec: &ValueDecoderSpec,
        capacity: usize,
        no_conversion: bool,
    ) -> Result<SampleBuffer> {
        let conversion = if no_conversion {
            ValueConversionSpec::Identity
        } else {
            *spec.conversion
        };
        let decoder = RecordDecoder::new(spec, &conversion)?;

        let mut pool = None;
        let storage = match &decoder.kernel {
            DecodeKernel::Numeric(_) => match self.strategy {
                AllocationStrategy::Heap => SampleStorage::Numeric(vec![0.0; capacity]),
                AllocationStrategy::Pooled => {
                    pool = Some(Arc::clone(&self.pool));
                    SampleStorage::Numeric(self.pool.rent(capacity))
                }
            },
            DecodeKernel::Bytes { width } => SampleStorage::Bytes {
                width: *width,
                data: vec![0; capacity * width],
            },
            DecodeKernel::Text { .. } => SampleStorage::Text(vec![String::new(); capacity]),
        };

        Ok(SampleBuffer {
            spec: spec.clone(),
            decoder,
            storage,
            conversion_enabled: !no_conversion,
            pool,
        })
    }

    /// Idle pooled vectors, for diagnostics.
    pub fn idle_buffers(&self) -> usize {
        self.pool.idle()
    }
}
