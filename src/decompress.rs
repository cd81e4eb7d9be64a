//! Inflating DZ blocks and undoing their byte transposition.
//!
//! A transposed DZ block stores the first `rows * columns` bytes of the
//! original data column by column, where `columns` is the block's zip
//! parameter (normally the record length). Bytes past the last whole row are
//! stored as they are.

use std::time::Instant;

use rayon::prelude::*;
use tracing::trace;

use crate::{
    DecodeOptions, Error, Result,
    blocks::{DzBlock, DzCompressionType, u64_to_usize},
    metrics::SamplerMetrics,
    pool::BufferPool,
};

/// Inflates `dz` from `file` into `dest`, which must be exactly the block's
/// original length.
pub(crate) fn inflate_block(
    dz: &DzBlock,
    block_offset: u64,
    file: &[u8],
    dest: &mut [u8],
    scratch: &BufferPool<u8>,
    options: &DecodeOptions,
    metrics: &SamplerMetrics,
) -> Result<()> {
    if dest.len() as u64 != dz.original_data_length {
        return Err(Error::UnexpectedExecutionPath(format!(
            "inflate target of {} bytes for {} original bytes",
            dest.len(),
            dz.original_data_length
        )));
    }
    let (start, len) = dz.deflate_range();
    let start = u64_to_usize(start, "deflate stream offset")?;
    let len = u64_to_usize(len, "deflate stream length")?;
    let stream = file
        .get(start..start.saturating_add(len))
        .ok_or_else(|| Error::corrupt(block_offset, "deflate stream lies past the end of the file"))?;

    let started = Instant::now();
    match dz.zip_type {
        DzCompressionType::Deflate => inflate_raw(stream, dest, block_offset)?,
        DzCompressionType::TranspositionDeflate => {
            let mut transposed = scratch.rent_scoped(dest.len());
            inflate_raw(stream, &mut transposed, block_offset)?;
            let columns = dz.zip_parameter as usize;
            if transposed.len() > options.transpose_parallel_threshold {
                detranspose_tiled(&transposed, dest, columns, options.transpose_tile_rows);
            } else {
                detranspose(&transposed, dest, columns);
            }
            metrics.transposed(dest.len() as u64);
        }
    }
    metrics.zipped_block(dz.compressed_data_length, dest.len() as u64, started.elapsed());
    trace!(block = block_offset, bytes = dest.len(), "inflated block");
    Ok(())
}

#[cfg(feature = "compression")]
fn inflate_raw(stream: &[u8], dest: &mut [u8], block_offset: u64) -> Result<()> {
    use miniz_oxide::inflate::decompress_slice_iter_to_slice;

    let written = decompress_slice_iter_to_slice(dest, std::iter::once(stream), false, true)
        .map_err(|status| {
            Error::corrupt(block_offset, format!("deflate stream rejected: {status:?}"))
        })?;
    if written != dest.len() {
        return Err(Error::corrupt(
            block_offset,
            format!("inflated {written} bytes, block declares {}", dest.len()),
        ));
    }
    Ok(())
}

#[cfg(not(feature = "compression"))]
fn inflate_raw(_stream: &[u8], _dest: &mut [u8], block_offset: u64) -> Result<()> {
    Err(Error::UnsupportedFeature(format!(
        "DZ block at {block_offset:#x} (built without the `compression` feature)"
    )))
}

/// Restores row order of transposed bytes.
pub fn detranspose(src: &[u8], dst: &mut [u8], columns: usize) {
    let Some(rows) = src.len().checked_div(columns) else {
        dst.copy_from_slice(src);
        return;
    };
    let body = rows * columns;
    for (row, record) in dst[..body].chunks_exact_mut(columns).enumerate() {
        for (column, byte) in record.iter_mut().enumerate() {
            *byte = src[column * rows + row];
        }
    }
    dst[body..].copy_from_slice(&src[body..]);
}

/// [`detranspose`] over tiles of `tile_rows` rows on the rayon pool.
pub fn detranspose_tiled(src: &[u8], dst: &mut [u8], columns: usize, tile_rows: usize) {
    let Some(rows) = src.len().checked_div(columns) else {
        dst.copy_from_slice(src);
        return;
    };
    let body = rows * columns;
    let (dst_body, dst_tail) = dst.split_at_mut(body);
    dst_body
        .par_chunks_mut(tile_rows.max(1) * columns)
        .enumerate()
        .for_each(|(tile, chunk)| {
            let first_row = tile * tile_rows.max(1);
            for (i, record) in chunk.chunks_exact_mut(columns).enumerate() {
                let row = first_row + i;
                for (column, byte) in record.iter_mut().enumerate() {
                    *byte = src[column * rows + row];
                }
            }
        });
    dst_tail.copy_from_slice(&src[body..]);
}

/// The forward transposition, as written by MDF producers.
pub fn transpose(src: &[u8], dst: &mut [u8], columns: usize) {
    let Some(rows) = src.len().checked_div(columns) else {
        dst.copy_from_slice(src);
        return;
    };
    let body = rows * columns;
    for (row, record) in src[..body].chunks_exact(columns).enumerate() {
        for (column, &byte) in record.iter().enumerate() {
            dst[column * rows + row] = byte;
        }
    }
    dst[body..].copy_from_slice(&src[body..]);
}
