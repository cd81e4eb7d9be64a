//! Parallel decoding of a record range into per-channel buffers.
//!
//! One sampling call runs in two phases:
//!
//! 1. every block touching the range is materialized (read in place or
//!    inflated) and decoded on the rayon pool; each block writes its own
//!    disjoint window of every channel buffer and copies its straddling
//!    fragments into its own window of the call's gap buffer
//! 2. after all blocks have joined, the records split across blocks are
//!    decoded from the completed gap buffer
//!
//! The decoded range is widened to whole blocks: sampling one record of a
//! block decodes all of it.

use std::ops::{Deref, Range};
use std::ptr;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, debug_span, trace, warn};

use crate::{
    Error, Result, UnsupportedPolicy,
    alignment::BlockLoadingInfo,
    blocks::u64_to_usize,
    channel::Channel,
    channel_group::ChannelGroup,
    decode::{SampleBuffer, SampleSlice, SampleType, buffer::RecordDecoder},
    decompress,
    metrics::{MetricsSnapshot, SamplerMetrics},
    parsing::{MdfFile, PhysicalBlock, RawChannelGroup},
    pool::Pooled,
};

/// One channel's decoded samples and where they sit in the record stream.
#[derive(Debug)]
pub struct BufferView<'a> {
    channel: Channel<'a>,
    buffer: SampleBuffer,
    sample_offset: u64,
}

impl<'a> BufferView<'a> {
    pub fn channel(&self) -> Channel<'a> {
        self.channel
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut SampleBuffer {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> SampleBuffer {
        self.buffer
    }

    /// Record index of the first sample.
    pub fn sample_offset(&self) -> u64 {
        self.sample_offset
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn data<T: SampleType>(&self) -> Option<&[T]> {
        self.buffer.data()
    }
}

/// The result of decoding a record range of one channel group.
#[derive(Debug)]
pub struct Sampler<'a> {
    group: ChannelGroup<'a>,
    sample_offset: u64,
    sample_count: u64,
    buffers: Vec<BufferView<'a>>,
    skipped: Vec<Channel<'a>>,
    metrics: MetricsSnapshot,
}

impl<'a> Sampler<'a> {
    /// Decodes every record of every channel in `channels`.
    ///
    /// Channels may come from several groups; each group is sampled as its
    /// own parallel task. Views come back in the order of `channels`, minus
    /// channels skipped under [`UnsupportedPolicy::Lenient`].
    pub fn load_full(channels: &[Channel<'a>]) -> Result<Vec<BufferView<'a>>> {
        let mut per_group: Vec<(&RawChannelGroup, Vec<usize>)> = Vec::new();
        for (index, channel) in channels.iter().enumerate() {
            let group = channel.raw_group();
            match per_group.iter_mut().find(|(g, _)| ptr::eq(*g, group)) {
                Some((_, indices)) => indices.push(index),
                None => per_group.push((group, vec![index])),
            }
        }

        let samplers = per_group
            .into_par_iter()
            .map(|(group, indices)| {
                let members: Vec<Channel<'a>> = indices.iter().map(|&i| channels[i]).collect();
                let sampler = Self::create_for_group(&members, 0, group.sample_count())?;
                Ok((indices, sampler))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut slots: Vec<Option<BufferView<'a>>> = channels.iter().map(|_| None).collect();
        for (indices, sampler) in samplers {
            for view in sampler.into_buffers() {
                let slot = indices
                    .iter()
                    .copied()
                    .find(|&i| channels[i] == view.channel && slots[i].is_none());
                if let Some(i) = slot {
                    slots[i] = Some(view);
                }
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }

    /// Decodes records `first_sample..first_sample + sample_count` of
    /// `channels`, which must all belong to one group.
    ///
    /// The range is clipped to the records the group holds and then widened
    /// to the enclosing blocks; [`Self::sample_offset`] and
    /// [`Self::sample_count`] report what was actually decoded.
    pub fn create_for_group(
        channels: &[Channel<'a>],
        first_sample: u64,
        sample_count: u64,
    ) -> Result<Self> {
        let Some(lead) = channels.first() else {
            return Err(Error::InvalidArgument("no channels to sample".into()));
        };
        let file = lead.file();
        let raw_group = lead.raw_group();
        if channels.iter().any(|ch| !ptr::eq(ch.raw_group(), raw_group)) {
            return Err(Error::InvalidArgument(
                "channels of different groups passed to one group sampler".into(),
            ));
        }
        let _span = debug_span!("sample", group = raw_group.offset, first_sample, sample_count)
            .entered();
        let metrics = SamplerMetrics::new();

        let mut decodable = Vec::with_capacity(channels.len());
        let mut skipped = Vec::new();
        for &channel in channels {
            match channel.decoder_spec() {
                Ok(spec) => decodable.push((channel, spec)),
                Err(e)
                    if e.is_unsupported()
                        && file.options.unsupported == UnsupportedPolicy::Lenient =>
                {
                    warn!(channel = channel.offset(), error = %e, "skipping unsupported channel");
                    skipped.push(channel);
                }
                Err(e) => return Err(e),
            }
        }

        let layout = raw_group.layout(&file.store, &metrics)?;
        let limit = raw_group.sample_count().min(layout.total_records());
        let start = first_sample.min(limit);
        let end = first_sample.saturating_add(sample_count).min(limit);

        let located = if decodable.is_empty() {
            None
        } else {
            layout.locate(start, end)
        };
        let Some((first_block, last_block)) = located else {
            let buffers = decodable
                .into_iter()
                .map(|(channel, spec)| {
                    Ok(BufferView {
                        channel,
                        buffer: file.buffers.allocate(spec, 0, false)?,
                        sample_offset: start,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self::finish(lead.group(), start, 0, buffers, skipped, &metrics));
        };

        let blocks = &layout.blocks()[first_block..=last_block];
        let (head, tail) = (&blocks[0], &blocks[blocks.len() - 1]);
        let covered_start = head.sample_index;
        let covered_end = tail.sample_end().min(limit);
        let total = u64_to_usize(covered_end - covered_start, "sample count")?;

        let mut views = Vec::with_capacity(decodable.len());
        for (channel, spec) in decodable {
            let buffer = file.buffers.allocate(spec, total, false)?;
            metrics.allocated(buffer.storage().allocated_bytes() as u64);
            views.push(BufferView {
                channel,
                buffer,
                sample_offset: covered_start,
            });
        }

        // Window of every block inside the channel buffers.
        let ranges: Vec<Range<usize>> = blocks
            .iter()
            .map(|b| {
                let s = b.sample_index.clamp(covered_start, covered_end) - covered_start;
                let e = b.sample_end().clamp(covered_start, covered_end) - covered_start;
                s as usize..e as usize
            })
            .collect();

        // Gap bytes of this call: the fragments of the located blocks only.
        let gap_base = head.alignment.left_gap_index;
        let gap_len = u64_to_usize(
            tail.alignment.right_gap_index + tail.alignment.right_byte_offset - gap_base,
            "gap buffer length",
        )?;
        let mut gap_bytes = file.scratch.rent_scoped(gap_len);
        let mut gap_chunks = Vec::with_capacity(blocks.len());
        let mut rest: &mut [u8] = &mut gap_bytes;
        for info in blocks {
            let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(info.gap_bytes() as usize);
            gap_chunks.push(chunk);
            rest = tail;
        }

        let mut work: Vec<Vec<(&RecordDecoder, SampleSlice<'_>)>> = blocks
            .iter()
            .map(|_| Vec::with_capacity(views.len()))
            .collect();
        for view in &mut views {
            let (decoder, slice) = view.buffer.parts_mut();
            for (targets, piece) in work.iter_mut().zip(slice.split_ranges(&ranges)?) {
                targets.push((decoder, piece));
            }
        }

        let threshold = file.options.split_cost_threshold;
        blocks
            .par_iter()
            .zip(ranges.par_iter())
            .zip(gap_chunks.into_par_iter())
            .zip(work.into_par_iter())
            .try_for_each(|(((info, range), gap_chunk), targets)| {
                decode_block(
                    file,
                    info,
                    covered_start + range.start as u64,
                    gap_chunk,
                    targets,
                    threshold,
                    &metrics,
                )
            })?;

        // Every block has joined; the gap buffer is complete.
        let started = Instant::now();
        let record_length = layout.record_length();
        let indices = layout.gap_sample_indices();
        let gaps = indices.partition_point(|&g| g < covered_start)
            ..indices.partition_point(|&g| g < covered_end);
        let gap_bytes: &[u8] = &gap_bytes;
        views.par_iter_mut().try_for_each(|view| {
            for k in gaps.clone() {
                let local = (k as u64 * record_length - gap_base) as usize;
                let dest = (indices[k] - covered_start) as usize;
                view.buffer.update(gap_bytes, local, dest, 1)?;
            }
            Ok::<(), Error>(())
        })?;
        metrics.gaps(gaps.len() as u64, started.elapsed());

        debug!(
            covered_start,
            covered_end,
            blocks = blocks.len(),
            gap_records = gaps.len(),
            "sampled group"
        );
        Ok(Self::finish(
            lead.group(),
            covered_start,
            covered_end - covered_start,
            views,
            skipped,
            &metrics,
        ))
    }

    fn finish(
        group: ChannelGroup<'a>,
        sample_offset: u64,
        sample_count: u64,
        buffers: Vec<BufferView<'a>>,
        skipped: Vec<Channel<'a>>,
        metrics: &SamplerMetrics,
    ) -> Self {
        let metrics = metrics.snapshot();
        group.file().metrics.absorb(&metrics);
        Self {
            group,
            sample_offset,
            sample_count,
            buffers,
            skipped,
            metrics,
        }
    }

    pub fn group(&self) -> ChannelGroup<'a> {
        self.group
    }

    /// Record index of the first decoded sample.
    pub fn sample_offset(&self) -> u64 {
        self.sample_offset
    }

    /// Number of decoded samples per channel.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn buffers(&self) -> &[BufferView<'a>] {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut [BufferView<'a>] {
        &mut self.buffers
    }

    pub fn buffer_for(&self, channel: &Channel<'_>) -> Option<&BufferView<'a>> {
        self.buffers
            .iter()
            .find(|view| ptr::eq(view.channel.block(), channel.block()))
    }

    /// Channels left out because they need an unsupported feature.
    pub fn skipped(&self) -> &[Channel<'a>] {
        &self.skipped
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics
    }

    pub fn into_buffers(self) -> Vec<BufferView<'a>> {
        self.buffers
    }
}

/// Record bytes of one block.
enum BlockBytes<'f> {
    Mapped(&'f [u8]),
    Inflated(Pooled<'f, u8>),
}

impl Deref for BlockBytes<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            BlockBytes::Mapped(bytes) => bytes,
            BlockBytes::Inflated(bytes) => bytes,
        }
    }
}

fn materialize<'f>(
    file: &'f MdfFile,
    info: &BlockLoadingInfo,
    metrics: &SamplerMetrics,
) -> Result<BlockBytes<'f>> {
    let len = u64_to_usize(info.byte_length, "block length")?;
    match &info.block {
        PhysicalBlock::Raw(dt) => {
            let start = u64_to_usize(dt.data_offset, "block data offset")?;
            let bytes = start
                .checked_add(len)
                .and_then(|end| file.store.bytes().get(start..end))
                .ok_or_else(|| {
                    Error::corrupt(info.block_offset, "block data lies past the end of the file")
                })?;
            metrics.raw_block(info.byte_length);
            Ok(BlockBytes::Mapped(bytes))
        }
        PhysicalBlock::Zipped(dz) => {
            let mut out = file.scratch.rent_scoped(len);
            decompress::inflate_block(
                dz,
                info.block_offset,
                file.store.bytes(),
                &mut out,
                &file.scratch,
                &file.options,
                metrics,
            )?;
            Ok(BlockBytes::Inflated(out))
        }
    }
}

/// Decodes the whole records of one block and stashes its fragments.
fn decode_block(
    file: &MdfFile,
    info: &BlockLoadingInfo,
    first_sample: u64,
    gap_chunk: &mut [u8],
    targets: Vec<(&RecordDecoder, SampleSlice<'_>)>,
    split_cost_threshold: usize,
    metrics: &SamplerMetrics,
) -> Result<()> {
    let holder = materialize(file, info, metrics)?;
    let bytes: &[u8] = &holder;

    let left = info.alignment.left_byte_offset as usize;
    let right = info.alignment.right_byte_offset as usize;
    let (head, tail) = gap_chunk.split_at_mut(left);
    head.copy_from_slice(&bytes[..left]);
    tail.copy_from_slice(&bytes[bytes.len() - right..]);

    let samples = targets.first().map_or(0, |(_, slice)| slice.len());
    if samples == 0 {
        return Ok(());
    }
    let started = Instant::now();
    let skip = first_sample.saturating_sub(info.sample_index) as usize;
    let channels = targets.len();

    if samples.saturating_mul(channels) > split_cost_threshold {
        let chunk = (split_cost_threshold / channels).max(1);
        let mut jobs = Vec::new();
        for (decoder, slice) in targets {
            let record_start = left + skip * decoder.stride();
            for (i, piece) in slice.chunks(chunk).into_iter().enumerate() {
                jobs.push((decoder, record_start + i * chunk * decoder.stride(), piece));
            }
        }
        trace!(block = info.block_offset, jobs = jobs.len(), "splitting block decode");
        jobs.into_par_iter()
            .try_for_each(|(decoder, start, piece)| decoder.decode(bytes, start, piece))?;
    } else {
        for (decoder, slice) in targets {
            decoder.decode(bytes, left + skip * decoder.stride(), slice)?;
        }
    }

    metrics.decoded((samples * channels) as u64, started.elapsed());
    trace!(block = info.block_offset, samples, "decoded block");
    Ok(())
}
