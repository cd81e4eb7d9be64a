mod common;

use common::{ChannelDef, MdfBuilder, dt, five_byte_channels, five_byte_records, write_temp};
use mdf4_decode::{
    AllocationStrategy, DecodeOptions, Mdf4File, Result, Sampler, UnsupportedPolicy,
};
use proptest::prelude::*;

fn single_block_file(records: &[u8], channels: &[ChannelDef], record_bytes: u32) -> Vec<u8> {
    let mut b = MdfBuilder::new();
    let data = b.dt(records);
    let cycles = records.len() as u64 / u64::from(record_bytes);
    b.group("reference", channels, record_bytes, cycles, data);
    b.finish()
}

fn split_file(records: &[u8], cuts: &[usize], channels: &[ChannelDef], record_bytes: u32) -> Vec<u8> {
    let mut b = MdfBuilder::new();
    let data = b.split_dt(records, cuts);
    let cycles = records.len() as u64 / u64::from(record_bytes);
    b.group("split", channels, record_bytes, cycles, data);
    b.finish()
}

fn strict() -> DecodeOptions {
    DecodeOptions {
        unsupported: UnsupportedPolicy::Strict,
        ..DecodeOptions::default()
    }
}

/// All numeric channels of the first group, fully decoded.
fn decode_all(bytes: Vec<u8>, options: DecodeOptions) -> Result<Vec<Vec<f64>>> {
    let file = Mdf4File::from_bytes_with(bytes, options)?;
    let group = &file.channel_groups()[0];
    let sampler = group.load_all()?;
    Ok(sampler
        .buffers()
        .iter()
        .map(|view| view.data::<f64>().map(<[f64]>::to_vec).unwrap_or_default())
        .collect())
}

#[test]
fn five_byte_records_split_mid_record() -> Result<()> {
    let records = five_byte_records();
    let bytes = split_file(&records, &[12, 25], &five_byte_channels(), 5);
    let tmp = write_temp(&bytes);

    let file = Mdf4File::open_with(tmp.path(), strict())?;
    let channels = file.channels();
    let views = Sampler::load_full(&channels)?;
    assert_eq!(views.len(), 2);

    let time = views[0].data::<f64>().unwrap();
    let data = views[1].data::<f64>().unwrap();
    let expected_time: Vec<f64> = (0..10).map(|i| f64::from(1000 + i * 10)).collect();
    let expected_data: Vec<f64> = (0..10).map(|i| f64::from(i * 3)).collect();
    assert_eq!(time, expected_time.as_slice());
    assert_eq!(data, expected_data.as_slice());
    assert!(time.windows(2).all(|w| w[0] < w[1]));

    let reference = decode_all(single_block_file(&records, &five_byte_channels(), 5), strict())?;
    assert_eq!(reference, vec![expected_time, expected_data]);
    Ok(())
}

#[test]
fn layout_accounts_for_every_record() -> Result<()> {
    let records = five_byte_records();
    let file = Mdf4File::from_bytes(split_file(&records, &[12, 25], &five_byte_channels(), 5))?;
    let group = &file.channel_groups()[0];
    let layout = group.layout()?;

    let aligned: u64 = layout.blocks().iter().map(|b| b.sample_count).sum();
    assert_eq!(aligned + layout.gap_record_count(), group.sample_count());
    assert_eq!(layout.gap_length() % group.record_length(), 0);
    assert_eq!(layout.gap_sample_indices(), &[2]);
    Ok(())
}

#[test]
fn sub_range_widens_to_whole_blocks() -> Result<()> {
    let records = five_byte_records();
    let file = Mdf4File::from_bytes_with(
        split_file(&records, &[12, 25], &five_byte_channels(), 5),
        strict(),
    )?;
    let group = &file.channel_groups()[0];

    // record 6 lies in the last block (records 5..10)
    let sampler = group.sample(6, 1)?;
    assert_eq!(sampler.sample_offset(), 5);
    assert_eq!(sampler.sample_count(), 5);
    let data = sampler.buffers()[1].data::<f64>().unwrap();
    assert_eq!(data, &[15.0, 18.0, 21.0, 24.0, 27.0]);

    // record 2 straddles blocks 0 and 1
    let sampler = group.sample(2, 1)?;
    assert_eq!(sampler.sample_offset(), 0);
    assert_eq!(sampler.sample_count(), 5);
    let data = sampler.buffers()[1].data::<f64>().unwrap();
    assert_eq!(data, &[0.0, 3.0, 6.0, 9.0, 12.0]);
    assert_eq!(sampler.metrics().gap_records, 1);
    Ok(())
}

#[test]
fn range_past_the_end_is_empty() -> Result<()> {
    let records = five_byte_records();
    let file = Mdf4File::from_bytes(single_block_file(&records, &five_byte_channels(), 5))?;
    let sampler = file.channel_groups()[0].sample(40, 5)?;
    assert_eq!(sampler.sample_count(), 0);
    assert!(sampler.buffers().iter().all(|view| view.is_empty()));
    Ok(())
}

#[test]
fn packed_and_big_endian_fields() -> Result<()> {
    // 4-byte records: u16 BE at 0, 4-bit field at bit 4 of byte 2, i8 at 3
    let mut records = Vec::new();
    for i in 0..20u16 {
        records.extend_from_slice(&(i * 300).to_be_bytes());
        records.push(((i % 16) as u8) << 4 | 0x0F);
        records.push((i as i8 - 10) as u8);
    }
    let channels = [
        ChannelDef::new("be", dt::UINT_BE, 0, 16),
        ChannelDef::new("nibble", dt::UINT_LE, 2, 4).bits_at(4),
        ChannelDef::new("signed", dt::INT_LE, 3, 8),
    ];
    let decoded = decode_all(split_file(&records, &[6, 7, 33, 60], &channels, 4), strict())?;
    for i in 0..20usize {
        assert_eq!(decoded[0][i], (i * 300) as f64);
        assert_eq!(decoded[1][i], (i % 16) as f64);
        assert_eq!(decoded[2][i], i as f64 - 10.0);
    }
    Ok(())
}

#[test]
fn string_and_byte_array_channels() -> Result<()> {
    let mut records = Vec::new();
    for i in 0..6u8 {
        records.extend_from_slice(format!("id{i}\0").as_bytes());
        records.extend_from_slice(&[i, i + 1]);
    }
    let channels = [
        ChannelDef::new("label", dt::STRING_LATIN1, 0, 32),
        ChannelDef::new("raw", dt::BYTE_ARRAY, 4, 16),
    ];
    let bytes = split_file(&records, &[9, 30], &channels, 6);
    let file = Mdf4File::from_bytes_with(bytes, strict())?;
    let sampler = file.channel_groups()[0].load_all()?;

    let labels = sampler.buffers()[0].data::<String>().unwrap();
    assert_eq!(labels[0], "id0");
    assert_eq!(labels[5], "id5");
    let raw = sampler.buffers()[1].data::<u8>().unwrap();
    assert_eq!(raw.len(), 12);
    assert_eq!(&raw[2..4], &[1, 2]);
    Ok(())
}

#[test]
fn intra_block_split_matches_serial_decode() -> Result<()> {
    let records = common::patterned_records(500, 8);
    let channels = [
        ChannelDef::new("a", dt::UINT_LE, 0, 16),
        ChannelDef::new("b", dt::UINT_LE, 2, 32),
        ChannelDef::new("c", dt::INT_LE, 6, 16),
    ];
    let bytes = split_file(&records, &[1203, 2000], &channels, 8);
    let serial = decode_all(bytes.clone(), strict())?;
    let split = decode_all(
        bytes,
        DecodeOptions {
            split_cost_threshold: 7,
            ..strict()
        },
    )?;
    assert_eq!(serial, split);
    assert_eq!(serial[0].len(), 500);
    Ok(())
}

#[test]
fn pooled_buffers_decode_the_same() -> Result<()> {
    let records = five_byte_records();
    let bytes = split_file(&records, &[3, 12, 25, 26], &five_byte_channels(), 5);
    let heap = decode_all(bytes.clone(), strict())?;
    let pooled = decode_all(
        bytes,
        DecodeOptions {
            allocation: AllocationStrategy::Pooled,
            ..strict()
        },
    )?;
    assert_eq!(heap, pooled);
    Ok(())
}

#[test]
fn load_full_spans_groups_in_request_order() -> Result<()> {
    let mut b = MdfBuilder::new();
    let first = b.dt(&five_byte_records());
    b.group("first", &five_byte_channels(), 5, 10, first);
    let second = b.dt(&[1, 2, 3, 4]);
    b.group("second", &[ChannelDef::new("x", dt::UINT_LE, 0, 8)], 1, 4, second);
    let file = Mdf4File::from_bytes_with(b.finish(), strict())?;

    let groups = file.channel_groups();
    let x = groups[1].channels()[0];
    let data = groups[0].channels()[1];
    let views = Sampler::load_full(&[x, data])?;
    assert_eq!(views[0].channel(), x);
    assert_eq!(views[0].data::<f64>().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(views[1].channel(), data);
    assert_eq!(views[1].len(), 10);

    let err = Sampler::create_for_group(&[x, data], 0, 4).unwrap_err();
    assert!(matches!(err, mdf4_decode::Error::InvalidArgument(_)));
    Ok(())
}

#[test]
fn metrics_follow_sampling_calls() -> Result<()> {
    let file = Mdf4File::from_bytes_with(
        split_file(&five_byte_records(), &[12, 25], &five_byte_channels(), 5),
        strict(),
    )?;
    let sampler = file.channel_groups()[0].load_all()?;
    let call = sampler.metrics();
    assert_eq!(call.blocks_decoded, 3);
    assert_eq!(call.raw_bytes_copied, 50);
    assert_eq!(call.gap_records, 1);
    assert_eq!(call.samples_decoded, 18);
    assert_eq!(file.metrics().blocks_decoded, 3);

    file.channel_groups()[0].load_all()?;
    assert_eq!(file.metrics().blocks_decoded, 6);
    assert_eq!(file.metrics().layouts_built, 1);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_block_splits_decode_identically(
        count in 1usize..60,
        raw_cuts in proptest::collection::btree_set(1usize..420, 0..8),
    ) {
        let width = 7;
        let records = common::patterned_records(count, width);
        let cuts: Vec<usize> = raw_cuts.into_iter().filter(|&c| c < records.len()).collect();
        let channels = [
            ChannelDef::new("u8", dt::UINT_LE, 0, 8),
            ChannelDef::new("u16", dt::UINT_LE, 1, 16),
            ChannelDef::new("i32", dt::INT_LE, 3, 32),
        ];

        let reference = decode_all(single_block_file(&records, &channels, width as u32), strict()).unwrap();
        let split = decode_all(split_file(&records, &cuts, &channels, width as u32), strict()).unwrap();
        prop_assert_eq!(reference, split);
    }

    #[test]
    fn sub_ranges_cover_the_request(
        count in 1usize..60,
        raw_cuts in proptest::collection::btree_set(1usize..420, 0..8),
        first in 0u64..70,
        len in 0u64..70,
    ) {
        let width = 7;
        let records = common::patterned_records(count, width);
        let cuts: Vec<usize> = raw_cuts.into_iter().filter(|&c| c < records.len()).collect();
        let channels = [
            ChannelDef::new("u8", dt::UINT_LE, 0, 8),
            ChannelDef::new("i32", dt::INT_LE, 3, 32),
        ];
        let total = count as u64;

        let reference = decode_all(single_block_file(&records, &channels, width as u32), strict()).unwrap();
        let file = Mdf4File::from_bytes_with(split_file(&records, &cuts, &channels, width as u32), strict()).unwrap();
        let sampler = file.channel_groups()[0].sample(first, len).unwrap();

        let offset = sampler.sample_offset();
        let covered = sampler.sample_count();
        prop_assert!(offset <= first.min(total));
        prop_assert!(offset + covered <= total);
        if first < total && len > 0 {
            prop_assert!(offset + covered >= (first + len).min(total));
        }

        let window = offset as usize..(offset + covered) as usize;
        for (view, expected) in sampler.buffers().iter().zip(&reference) {
            prop_assert_eq!(view.data::<f64>().unwrap(), &expected[window.clone()]);
        }
    }
}
