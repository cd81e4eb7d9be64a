mod common;

use common::{ChannelDef, MdfBuilder, dt, five_byte_channels, five_byte_records};
use mdf4_decode::{DecodeOptions, Error, Mdf4File, Result};

fn five_byte_file(builder: impl FnOnce(&mut MdfBuilder) -> u64) -> Vec<u8> {
    let mut b = MdfBuilder::new();
    let root = builder(&mut b);
    b.group("g", &five_byte_channels(), 5, 10, root);
    b.finish()
}

#[test]
fn rejects_foreign_identifier() {
    let bytes = MdfBuilder::with_id(b"NOTMDF  ", 410).finish();
    let err = Mdf4File::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, Error::FileIdentifierError(ref id) if id.starts_with("NOTMDF")));
}

#[test]
fn rejects_mdf3() {
    let bytes = MdfBuilder::with_id(b"MDF     ", 330).finish();
    let err = Mdf4File::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, Error::FileVersioningError(_)), "{err}");
}

#[test]
fn accepts_unfinalized_files() {
    let bytes = MdfBuilder::with_id(b"UnFinMF ", 410).finish();
    let file = Mdf4File::from_bytes(bytes).unwrap();
    assert!(!file.identification().is_finalized());
    assert!(file.channel_groups().is_empty());
}

#[test]
fn truncated_identification_block() {
    let err = Mdf4File::from_bytes(b"MDF     4.10".to_vec()).unwrap_err();
    assert!(err.is_corrupt(), "{err}");
}

#[test]
fn unknown_block_tag_is_corrupt() {
    let mut b = MdfBuilder::new();
    let bogus = b.block(b"##ZZ", &[], &[0; 8]);
    let mut bytes = b.finish();
    let at = common::HD_OFFSET as usize + 24;
    bytes[at..at + 8].copy_from_slice(&bogus.to_le_bytes());

    let err = Mdf4File::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, Error::CorruptFormat { offset, .. } if offset == bogus), "{err}");
}

#[test]
fn wrong_block_kind_in_chain() {
    let mut b = MdfBuilder::new();
    let text = b.text("not a data group");
    let mut bytes = b.finish();
    let at = common::HD_OFFSET as usize + 24;
    bytes[at..at + 8].copy_from_slice(&text.to_le_bytes());

    let err = Mdf4File::from_bytes(bytes).unwrap_err();
    assert!(matches!(err, Error::BlockIDError { .. }), "{err}");
}

#[test]
fn looping_group_chain_is_corrupt() {
    let mut b = MdfBuilder::new();
    let data = b.dt(&five_byte_records());
    let dg = b.group("loop", &five_byte_channels(), 5, 10, data);
    let mut bytes = b.finish();
    let at = dg as usize + 24;
    bytes[at..at + 8].copy_from_slice(&dg.to_le_bytes());

    let err = Mdf4File::from_bytes(bytes).unwrap_err();
    assert!(err.is_corrupt(), "{err}");
}

#[test]
fn link_past_end_of_file() {
    let mut b = MdfBuilder::new();
    let dg = b.data_group(0, 0);
    let mut bytes = b.finish();
    let at = dg as usize + 24 + 8;
    bytes[at..at + 8].copy_from_slice(&(1u64 << 40).to_le_bytes());

    let err = Mdf4File::from_bytes(bytes).unwrap_err();
    assert!(err.is_corrupt(), "{err}");
}

#[test]
fn data_list_offset_mismatch() {
    let records = five_byte_records();
    let bytes = five_byte_file(|b| {
        let first = b.dt(&records[..12]);
        let second = b.dt(&records[12..]);
        // declares the second block at byte 10 instead of 12
        b.dl(0, &[first, second], &[10, 38])
    });
    let file = Mdf4File::from_bytes(bytes).unwrap();
    let err = file.channel_groups()[0].load_all().unwrap_err();
    assert!(err.is_corrupt(), "{err}");
}

#[test]
fn partial_trailing_record_is_corrupt() {
    let records = five_byte_records();
    let bytes = five_byte_file(|b| b.dt(&records[..12]));
    let file = Mdf4File::from_bytes(bytes).unwrap();
    let err = file.channel_groups()[0].layout().unwrap_err();
    assert!(matches!(err, Error::CorruptFormat { .. }), "{err}");
}

#[test]
fn fewer_records_than_declared_is_corrupt() -> Result<()> {
    let mut b = MdfBuilder::new();
    let data = b.dt(&five_byte_records());
    // ten records on disk, twelve declared
    b.group("short", &five_byte_channels(), 5, 12, data);
    let file = Mdf4File::from_bytes(b.finish())?;
    let group = &file.channel_groups()[0];
    assert_eq!(group.sample_count(), 12);

    let err = group.load_all().unwrap_err();
    assert!(matches!(err, Error::CorruptFormat { .. }), "{err}");
    assert!(group.sample(8, 4).unwrap_err().is_corrupt());
    Ok(())
}

#[test]
fn non_data_block_as_data_root() {
    let bytes = five_byte_file(|b| b.text("records"));
    let file = Mdf4File::from_bytes(bytes).unwrap();
    let err = file.channel_groups()[0].load_all().unwrap_err();
    assert!(err.is_corrupt(), "{err}");
}

#[test]
fn unsorted_group_is_unsupported() {
    let mut b = MdfBuilder::new();
    let data = b.dt(&[1, 10, 2, 20, 1, 11]);
    let dg = b.data_group(1, data);
    let first = b.channel_group("a", &[ChannelDef::new("a", dt::UINT_LE, 0, 8)], 1, 2);
    let second = b.channel_group("b", &[ChannelDef::new("b", dt::UINT_LE, 0, 8)], 1, 1);
    b.patch_link(first, 0, second);
    b.patch_link(dg, 1, first);
    let file = Mdf4File::from_bytes(b.finish()).unwrap();

    let groups = file.channel_groups();
    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|g| !g.is_sorted()));
    assert_eq!(groups[0].record_id_size(), 1);
    let err = groups[0].load_all().unwrap_err();
    assert!(err.is_unsupported(), "{err}");
    assert_eq!(file.summary().unwrap().unsorted_groups, 2);
}

#[test]
fn invalid_options_rejected_at_open() {
    let bytes = five_byte_file(|b| b.dt(&five_byte_records()));
    let options = DecodeOptions {
        split_cost_threshold: 0,
        ..DecodeOptions::default()
    };
    let err = Mdf4File::from_bytes_with(bytes, options).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn missing_file() {
    let err = Mdf4File::open("/nonexistent/recording.mf4").unwrap_err();
    assert!(matches!(err, Error::IOError(_)));
}
