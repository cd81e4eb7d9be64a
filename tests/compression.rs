mod common;

use common::{ChannelDef, MdfBuilder, dt, five_byte_channels, five_byte_records};
use mdf4_decode::{DecodeOptions, Mdf4File, Result, UnsupportedPolicy, decompress};
use proptest::prelude::*;

fn strict() -> DecodeOptions {
    DecodeOptions {
        unsupported: UnsupportedPolicy::Strict,
        ..DecodeOptions::default()
    }
}

fn expected_five_byte() -> (Vec<f64>, Vec<f64>) {
    (
        (0..10).map(|i| f64::from(1000 + i * 10)).collect(),
        (0..10).map(|i| f64::from(i * 3)).collect(),
    )
}

#[test]
fn mixed_raw_and_zipped_blocks() -> Result<()> {
    let records = five_byte_records();
    let mut b = MdfBuilder::new();
    // 12 bytes plain deflate, 13 raw, 25 transposed over 5 columns
    let first = b.dz(&records[..12], None);
    let second = b.dt(&records[12..25]);
    let third = b.dz(&records[25..], Some(5));
    let list = b.dl(0, &[first, second, third], &[12, 13, 25]);
    b.group("mixed", &five_byte_channels(), 5, 10, list);

    let file = Mdf4File::from_bytes_with(b.finish(), strict())?;
    let sampler = file.channel_groups()[0].load_all()?;
    let (time, data) = expected_five_byte();
    assert_eq!(sampler.buffers()[0].data::<f64>().unwrap(), time.as_slice());
    assert_eq!(sampler.buffers()[1].data::<f64>().unwrap(), data.as_slice());

    let metrics = sampler.metrics();
    assert_eq!(metrics.blocks_decoded, 3);
    assert_eq!(metrics.bytes_inflated, 37);
    assert_eq!(metrics.bytes_transposed, 25);
    assert_eq!(metrics.raw_bytes_copied, 13);
    Ok(())
}

#[test]
fn transposed_block_with_partial_trailing_record() -> Result<()> {
    // 3 columns over 10 bytes leaves one byte outside the transposed matrix
    let records: Vec<u8> = (0..30).collect();
    let channels = [
        ChannelDef::new("a", dt::UINT_LE, 0, 8),
        ChannelDef::new("b", dt::UINT_LE, 1, 16),
    ];
    let mut b = MdfBuilder::new();
    let first = b.dz(&records[..10], Some(3));
    let second = b.dz(&records[10..], Some(3));
    let list = b.dl(0, &[first, second], &[10, 20]);
    b.group("odd", &channels, 3, 10, list);

    let file = Mdf4File::from_bytes_with(b.finish(), strict())?;
    let sampler = file.channel_groups()[0].load_all()?;
    let a = sampler.buffers()[0].data::<f64>().unwrap();
    let b = sampler.buffers()[1].data::<f64>().unwrap();
    for i in 0..10usize {
        assert_eq!(a[i], (3 * i) as f64);
        let lo = 3 * i + 1;
        assert_eq!(b[i], (lo + ((lo + 1) << 8)) as f64);
    }
    assert_eq!(sampler.metrics().gap_records, 1);
    Ok(())
}

#[test]
fn header_list_root() -> Result<()> {
    let records = five_byte_records();
    let mut b = MdfBuilder::new();
    let first = b.dz(&records[..20], Some(5));
    let second = b.dz(&records[20..], None);
    let list = b.dl(0, &[first, second], &[20, 30]);
    let root = b.hl(list);
    b.group("hl", &five_byte_channels(), 5, 10, root);

    let file = Mdf4File::from_bytes_with(b.finish(), strict())?;
    let group = &file.channel_groups()[0];
    assert_eq!(group.block_loading_infos()?.len(), 2);
    let sampler = group.load_all()?;
    let (time, _) = expected_five_byte();
    assert_eq!(sampler.buffers()[0].data::<f64>().unwrap(), time.as_slice());
    Ok(())
}

#[test]
fn chained_data_lists() -> Result<()> {
    let records = five_byte_records();
    let mut b = MdfBuilder::new();
    let tail_blocks = [b.dt(&records[27..40]), b.dz(&records[40..], Some(5))];
    let tail = b.dl_at(0, &tail_blocks, &[13, 10], 27);
    let head_blocks = [b.dt(&records[..8]), b.dz(&records[8..27], None)];
    let head = b.dl(tail, &head_blocks, &[8, 19]);
    b.group("chain", &five_byte_channels(), 5, 10, head);

    let file = Mdf4File::from_bytes_with(b.finish(), strict())?;
    let sampler = file.channel_groups()[0].load_all()?;
    let (time, data) = expected_five_byte();
    assert_eq!(sampler.buffers()[0].data::<f64>().unwrap(), time.as_slice());
    assert_eq!(sampler.buffers()[1].data::<f64>().unwrap(), data.as_slice());
    Ok(())
}

#[test]
fn tiled_detranspose_path() -> Result<()> {
    let records = common::patterned_records(300, 6);
    let channels = [
        ChannelDef::new("x", dt::UINT_LE, 0, 16),
        ChannelDef::new("y", dt::INT_LE, 2, 32),
    ];
    let build = |columns: Option<u32>| {
        let mut b = MdfBuilder::new();
        let first = b.dz(&records[..900], columns);
        let second = b.dz(&records[900..], columns);
        let list = b.dl(0, &[first, second], &[900, 900]);
        b.group("tiles", &channels, 6, 300, list);
        b.finish()
    };

    let plain = Mdf4File::from_bytes_with(build(None), strict())?;
    let tiled = Mdf4File::from_bytes_with(
        build(Some(6)),
        DecodeOptions {
            transpose_parallel_threshold: 1,
            transpose_tile_rows: 7,
            ..strict()
        },
    )?;
    let expected = plain.channel_groups()[0].load_all()?;
    let actual = tiled.channel_groups()[0].load_all()?;
    for (e, a) in expected.buffers().iter().zip(actual.buffers()) {
        assert_eq!(e.buffer().storage(), a.buffer().storage());
    }
    assert_eq!(actual.metrics().bytes_transposed, 1800);
    Ok(())
}

#[test]
fn damaged_deflate_stream_is_corrupt() {
    let records = five_byte_records();
    let mut b = MdfBuilder::new();
    let zipped = b.dz(&records, None);
    b.group("broken", &five_byte_channels(), 5, 10, zipped);
    let mut bytes = b.finish();
    // 0xFF opens a final block of the reserved type 3
    let sub_header = zipped as usize + 24;
    let compressed_len =
        u64::from_le_bytes(bytes[sub_header + 16..sub_header + 24].try_into().unwrap()) as usize;
    let stream = sub_header + 24;
    bytes[stream..stream + compressed_len].fill(0xFF);

    let file = Mdf4File::from_bytes(bytes).unwrap();
    let err = file.channel_groups()[0].load_all().unwrap_err();
    assert!(err.is_corrupt(), "{err}");
}

proptest! {
    #[test]
    fn detranspose_inverts_transpose(
        data in proptest::collection::vec(any::<u8>(), 0..400),
        columns in 1usize..17,
        tile_rows in 1usize..9,
    ) {
        let mut stored = vec![0; data.len()];
        decompress::transpose(&data, &mut stored, columns);

        let mut scalar = vec![0; data.len()];
        decompress::detranspose(&stored, &mut scalar, columns);
        prop_assert_eq!(&scalar, &data);

        let mut tiled = vec![0; data.len()];
        decompress::detranspose_tiled(&stored, &mut tiled, columns, tile_rows);
        prop_assert_eq!(&tiled, &data);
    }
}
